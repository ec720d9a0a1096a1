use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Shared storage for long-lived clients (chain data providers, HTTP clients).
///
/// Clients are indexed by a string key (a pair slug, or a retry policy fingerprint) and handed
/// out as `Arc`s. `T` may be a trait object.
pub struct ClientStorage<T: ?Sized> {
	pub clients: Arc<RwLock<HashMap<String, Arc<T>>>>,
}

impl<T: ?Sized> ClientStorage<T> {
	pub fn new() -> Self {
		Self {
			clients: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl<T: ?Sized> Default for ClientStorage<T> {
	fn default() -> Self {
		Self::new()
	}
}
