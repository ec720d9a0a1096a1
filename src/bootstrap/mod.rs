//! Bootstrap module for initializing services and creating pollers.
//!
//! This module loads the configuration into services, opens the persistent stores and builds one
//! [`ChainPoller`] per network that has active subscriptions.
//!
//! # Services
//! - `NetworkService`: pairs to listen on
//! - `ClientService`: webhook destinations
//! - `SubscriptionService`: watch criteria
//!
//! # Pollers
//! - `create_pollers`: wires provider, stores, tracker and dispatcher of every listened pair

use std::{collections::HashMap, error::Error, path::Path, sync::Arc};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::{
	models::{ChainPair, Client, Network, Subscription},
	repositories::{
		ClientRepositoryTrait, ClientService, NetworkRepositoryTrait, NetworkService,
		SubscriptionRepositoryTrait, SubscriptionService,
	},
	services::{
		blockchain::ProviderPoolTrait,
		listener::{ChainPoller, CursorStore, FileCursorStore},
		notification::{NotificationClientPool, WebhookDispatcher},
		tracker::{ActionItemStore, ConfirmationTracker, FileActionItemStore},
	},
};

/// Type alias for handling ServiceResult
pub type Result<T> = std::result::Result<T, Box<dyn Error>>;

type ServiceResult<S, N, C> = Result<(
	Vec<Subscription>,
	HashMap<String, Network>,
	HashMap<String, Client>,
	Arc<Mutex<SubscriptionService<S, N, C>>>,
	Arc<Mutex<NetworkService<N>>>,
	Arc<Mutex<ClientService<C>>>,
)>;

/// Initializes the configuration services of the listener.
///
/// Services that are not supplied are loaded from `config_dir` (`networks/`, `clients/` and
/// `subscriptions/` subdirectories), or from `config/` when no directory is given.
///
/// # Returns
/// Returns a tuple containing:
/// - `Vec<Subscription>`: active subscriptions, sorted by name
/// - `HashMap<String, Network>`: networks indexed by configuration name
/// - `HashMap<String, Client>`: clients indexed by client id
/// - the three services behind `Arc<Mutex<_>>`
/// # Errors
/// Returns an error if loading or validating any configuration fails
pub async fn initialize_services<S, N, C>(
	config_dir: Option<&Path>,
	subscription_service: Option<SubscriptionService<S, N, C>>,
	network_service: Option<NetworkService<N>>,
	client_service: Option<ClientService<C>>,
) -> ServiceResult<S, N, C>
where
	S: SubscriptionRepositoryTrait<N, C> + Send + Sync + 'static,
	N: NetworkRepositoryTrait + Send + Sync + 'static,
	C: ClientRepositoryTrait + Send + Sync + 'static,
{
	let networks_dir = config_dir.map(|dir| dir.join("networks"));
	let clients_dir = config_dir.map(|dir| dir.join("clients"));
	let subscriptions_dir = config_dir.map(|dir| dir.join("subscriptions"));

	let network_service = match network_service {
		Some(service) => service,
		None => {
			let repository = N::new(networks_dir.as_deref()).await?;
			NetworkService::<N>::new_with_repository(repository)?
		}
	};

	let client_service = match client_service {
		Some(service) => service,
		None => {
			let repository = C::new(clients_dir.as_deref()).await?;
			ClientService::<C>::new_with_repository(repository)?
		}
	};

	let subscription_service = match subscription_service {
		Some(service) => service,
		None => {
			let repository = S::new(
				subscriptions_dir.as_deref(),
				Some(network_service.clone()),
				Some(client_service.clone()),
			)
			.await?;
			SubscriptionService::<S, N, C>::new_with_repository(repository)?
		}
	};

	let active_subscriptions = filter_active_subscriptions(subscription_service.get_all());
	let networks = network_service.get_all();
	let clients = client_service.get_all();

	Ok((
		active_subscriptions,
		networks,
		clients,
		Arc::new(Mutex::new(subscription_service)),
		Arc::new(Mutex::new(network_service)),
		Arc::new(Mutex::new(client_service)),
	))
}

/// Subscriptions that are not paused, sorted by name
pub fn filter_active_subscriptions(
	subscriptions: HashMap<String, Subscription>,
) -> Vec<Subscription> {
	let mut active: Vec<Subscription> = subscriptions
		.into_values()
		.filter(|subscription| !subscription.paused)
		.collect();
	active.sort_by(|a, b| a.name.cmp(&b.name));
	active
}

/// Whether any of `subscriptions` is active on `pair`
pub fn has_active_subscriptions(subscriptions: &[Subscription], pair: &ChainPair) -> bool {
	subscriptions
		.iter()
		.any(|subscription| !subscription.paused && &subscription.pair() == pair)
}

/// Networks with at least one active subscription, sorted by pair
pub fn networks_to_listen(
	networks: &HashMap<String, Network>,
	subscriptions: &[Subscription],
) -> Vec<Network> {
	let mut listened: Vec<Network> = networks
		.values()
		.filter(|network| has_active_subscriptions(subscriptions, &network.pair()))
		.cloned()
		.collect();
	listened.sort_by_key(|network| network.pair().slug());
	listened
}

/// Persistent stores under `data_dir`: cursors and action items
pub fn create_stores(data_dir: &Path) -> (Arc<FileCursorStore>, Arc<FileActionItemStore>) {
	(
		Arc::new(FileCursorStore::new(data_dir.to_path_buf())),
		Arc::new(FileActionItemStore::new(data_dir.to_path_buf())),
	)
}

/// Creates one poller per network with active subscriptions.
///
/// A network whose provider cannot be created is reported and left out; the others still run.
pub async fn create_pollers<S, P>(
	networks: &HashMap<String, Network>,
	subscriptions: &[Subscription],
	clients: HashMap<String, Client>,
	provider_pool: &P,
	cursors: Arc<dyn CursorStore>,
	items: Arc<S>,
	notification_pool: Arc<NotificationClientPool>,
) -> Vec<Arc<ChainPoller<S>>>
where
	S: ActionItemStore + 'static,
	P: ProviderPoolTrait,
{
	let tracker = ConfirmationTracker::new(items.clone());
	let dispatcher = WebhookDispatcher::new(items, clients, notification_pool);

	let mut pollers = Vec::new();
	for network in networks_to_listen(networks, subscriptions) {
		let pair = network.pair();
		let provider = match provider_pool.get_provider(&network).await {
			Ok(provider) => provider,
			Err(e) => {
				error!("Failed to create provider for {}: {}", pair, e);
				continue;
			}
		};

		let pair_subscriptions: Vec<Subscription> = subscriptions
			.iter()
			.filter(|subscription| subscription.pair() == pair)
			.cloned()
			.collect();
		let subscription_count = pair_subscriptions.len();

		match ChainPoller::new(
			network,
			provider,
			cursors.clone(),
			tracker.clone(),
			dispatcher.clone(),
			pair_subscriptions,
		) {
			Ok(poller) => {
				info!(
					"Listening on {} with {} subscription(s)",
					pair, subscription_count
				);
				pollers.push(Arc::new(poller));
			}
			Err(e) => {
				error!("Failed to create poller for {}: {}", pair, e);
			}
		}
	}

	pollers
}
