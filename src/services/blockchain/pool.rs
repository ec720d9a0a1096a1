//! Provider pool for chain data providers.
//!
//! Providers are created lazily on first use and cached per pair, so every cycle of a pair
//! reuses the same HTTP connection pool and endpoint failover state.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::{collections::HashMap, sync::Arc};

use crate::{
	models::Network,
	services::blockchain::{
		error::ProviderError, provider::ChainDataProvider, providers::EvmRpcProvider,
	},
	utils::client_storage::ClientStorage,
};

/// Trait for the provider pool
#[async_trait]
pub trait ProviderPoolTrait: Send + Sync {
	/// Gets or creates the provider of `network`'s pair
	async fn get_provider(
		&self,
		network: &Network,
	) -> Result<Arc<dyn ChainDataProvider>, ProviderError>;
}

type ProviderFactory =
	dyn Fn(&Network) -> BoxFuture<'static, Result<Box<dyn ChainDataProvider>, anyhow::Error>>
		+ Send
		+ Sync;

/// Caches one provider per pair slug
pub struct ProviderPool {
	storage: ClientStorage<dyn ChainDataProvider>,
	factory: Box<ProviderFactory>,
}

impl ProviderPool {
	/// Pool creating EVM JSON-RPC providers
	pub fn new() -> Self {
		Self::new_with_factory(|network| {
			let network = network.clone();
			Box::pin(async move {
				let provider = EvmRpcProvider::new(&network)?;
				Ok(Box::new(provider) as Box<dyn ChainDataProvider>)
			})
		})
	}

	/// Pool creating providers with `factory`
	pub fn new_with_factory<F>(factory: F) -> Self
	where
		F: Fn(&Network) -> BoxFuture<'static, Result<Box<dyn ChainDataProvider>, anyhow::Error>>
			+ Send
			+ Sync
			+ 'static,
	{
		Self {
			storage: ClientStorage::new(),
			factory: Box::new(factory),
		}
	}

	/// Number of cached providers
	pub async fn get_provider_count(&self) -> usize {
		self.storage.clients.read().await.len()
	}
}

impl Default for ProviderPool {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl ProviderPoolTrait for ProviderPool {
	async fn get_provider(
		&self,
		network: &Network,
	) -> Result<Arc<dyn ChainDataProvider>, ProviderError> {
		let slug = network.pair().slug();

		// Fast path: check if provider exists
		if let Some(provider) = self.storage.clients.read().await.get(&slug) {
			return Ok(provider.clone());
		}

		// Slow path: create under the write lock, re-checking first
		let mut providers = self.storage.clients.write().await;
		if let Some(provider) = providers.get(&slug) {
			return Ok(provider.clone());
		}

		let provider: Arc<dyn ChainDataProvider> =
			Arc::from((self.factory)(network).await.map_err(|e| {
				ProviderError::provider_pool_error(
					format!("Failed to create provider for {}", network.pair()),
					Some(e.into()),
					Some(HashMap::from([("network".to_string(), slug.clone())])),
				)
			})?);
		providers.insert(slug, provider.clone());
		Ok(provider)
	}
}
