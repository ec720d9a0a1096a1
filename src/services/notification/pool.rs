use crate::services::blockchain::TransientErrorRetryStrategy;
use crate::utils::client_storage::ClientStorage;
use crate::utils::{create_retryable_http_client, RetryConfig};
use reqwest::Client as ReqwestClient;
use reqwest_middleware::ClientWithMiddleware;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationPoolError {
	#[error("Failed to create HTTP client: {0}")]
	HttpClientBuildError(String),
}

/// Pool of HTTP clients used for webhook delivery.
///
/// Clients are keyed by retry policy, so that every webhook client sharing a policy also
/// shares one connection pool.
pub struct NotificationClientPool {
	http_clients: ClientStorage<ClientWithMiddleware>,
}

impl NotificationClientPool {
	pub fn new() -> Self {
		Self {
			http_clients: ClientStorage::new(),
		}
	}

	/// Returns the client stored under `key`, creating it with `create_fn` when absent.
	async fn get_or_create_client<T, F>(
		&self,
		key: &str,
		storage: &ClientStorage<T>,
		create_fn: F,
	) -> Result<Arc<T>, NotificationPoolError>
	where
		T: Send + Sync,
		F: FnOnce() -> Result<T, NotificationPoolError>,
	{
		if let Some(client) = storage.clients.read().await.get(key) {
			return Ok(client.clone());
		}

		let mut clients = storage.clients.write().await;
		// Another task may have created it while we waited for the write lock
		if let Some(client) = clients.get(key) {
			return Ok(client.clone());
		}

		let client = Arc::new(create_fn()?);
		clients.insert(key.to_string(), client.clone());

		Ok(client)
	}

	/// Get or create an HTTP client that retries transient failures per `retry_policy`.
	pub async fn get_or_create_http_client(
		&self,
		retry_policy: &RetryConfig,
	) -> Result<Arc<ClientWithMiddleware>, NotificationPoolError> {
		let key = format!("{:?}", retry_policy);
		self.get_or_create_client(&key, &self.http_clients, || {
			let base_client = ReqwestClient::builder()
				.pool_max_idle_per_host(10)
				.pool_idle_timeout(Some(Duration::from_secs(90)))
				.connect_timeout(Duration::from_secs(10))
				.build()
				.map_err(|e| NotificationPoolError::HttpClientBuildError(e.to_string()))?;

			Ok(create_retryable_http_client(
				retry_policy,
				base_client,
				Some(TransientErrorRetryStrategy),
			))
		})
		.await
	}

	/// Number of distinct HTTP clients created so far
	pub async fn get_active_http_client_count(&self) -> usize {
		self.http_clients.clients.read().await.len()
	}
}

impl Default for NotificationClientPool {
	fn default() -> Self {
		Self::new()
	}
}
