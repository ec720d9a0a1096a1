//! Mock implementations of chain data providers.
//!
//! - [`MockChainDataProvider`] - Mock implementation of a chain data provider
//! - [`mainnet_provider`] - Chain data provider mock serving ethereum/mainnet
//! - [`MockProviderPool`] - Mock implementation of the provider pool

use std::sync::Arc;

use async_trait::async_trait;
use blockchain_listener::{
	models::{Block, Network},
	services::blockchain::{ChainDataProvider, ProviderError, ProviderPoolTrait},
};
use mockall::mock;

mock! {
	/// Mock implementation of a chain data provider.
	///
	/// `get_block_range` keeps its default implementation on top of the mocked `get_block`.
	pub ChainDataProvider {}

	#[async_trait]
	impl ChainDataProvider for ChainDataProvider {
		fn chain_id(&self) -> &str;
		fn network_id(&self) -> &str;
		async fn get_head_height(&self) -> Result<u64, anyhow::Error>;
		async fn get_block(&self, height: u64) -> Result<Option<Block>, anyhow::Error>;
	}
}

/// Provider mock serving `ethereum`/`mainnet`, with no other expectations set
pub fn mainnet_provider() -> MockChainDataProvider {
	let mut provider = MockChainDataProvider::new();
	provider.expect_chain_id().return_const("ethereum".to_string());
	provider.expect_network_id().return_const("mainnet".to_string());
	provider
}

mock! {
	pub ProviderPool {}

	#[async_trait]
	impl ProviderPoolTrait for ProviderPool {
		async fn get_provider(
			&self,
			network: &Network,
		) -> Result<Arc<dyn ChainDataProvider>, ProviderError>;
	}
}
