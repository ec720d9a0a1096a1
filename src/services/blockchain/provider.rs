//! Chain data provider interface.
//!
//! The listener only reads chains through [`ChainDataProvider`]; how blocks are fetched is up to
//! the implementation.

use async_trait::async_trait;

use crate::models::Block;

/// Read access to one (blockchain, network) pair
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
	/// Blockchain identifier served by this provider
	fn chain_id(&self) -> &str;

	/// Network identifier served by this provider
	fn network_id(&self) -> &str;

	/// Height of the latest block known to the provider
	async fn get_head_height(&self) -> Result<u64, anyhow::Error>;

	/// Block at `height`, or `None` when the provider does not have it (yet)
	async fn get_block(&self, height: u64) -> Result<Option<Block>, anyhow::Error>;

	/// Blocks `from..=to` in ascending order, stopping at the first missing height
	async fn get_block_range(&self, from: u64, to: u64) -> Result<Vec<Block>, anyhow::Error> {
		let mut blocks = Vec::new();
		for height in from..=to {
			match self.get_block(height).await? {
				Some(block) => blocks.push(block),
				None => break,
			}
		}
		Ok(blocks)
	}
}
