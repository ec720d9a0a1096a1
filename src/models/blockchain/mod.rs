//! Chain-agnostic blockchain models.
//!
//! - `ChainPair`: identity of a (blockchain, network) pair
//! - `Block`, `BlockTransaction`, `BlockLog`: block data returned by a chain data provider

use serde::{Deserialize, Serialize};
use std::fmt;

mod block;

pub use block::{Block, BlockLog, BlockTransaction};

/// Prefix of every scheduler job id
const JOB_ID_PREFIX: &str = "blockchain.listener";

/// A (blockchain, network) pair, e.g. `("ethereum", "mainnet")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainPair {
	pub blockchain_id: String,
	pub network_id: String,
}

impl ChainPair {
	pub fn new(blockchain_id: impl Into<String>, network_id: impl Into<String>) -> Self {
		Self {
			blockchain_id: blockchain_id.into(),
			network_id: network_id.into(),
		}
	}

	/// Stable scheduler job identity: `blockchain.listener.<blockchain_id>.<network_id>`
	pub fn job_id(&self) -> String {
		format!(
			"{}.{}.{}",
			JOB_ID_PREFIX, self.blockchain_id, self.network_id
		)
	}

	/// `<blockchain_id>_<network_id>`, used for file names
	pub fn slug(&self) -> String {
		format!("{}_{}", self.blockchain_id, self.network_id)
	}

	/// Label values in `[blockchain_id, network_id]` order
	pub fn labels(&self) -> [&str; 2] {
		[self.blockchain_id.as_str(), self.network_id.as_str()]
	}

	/// Whether `blockchain_id`/`network_id` refer to this pair
	pub fn matches(&self, blockchain_id: &str, network_id: &str) -> bool {
		self.blockchain_id == blockchain_id && self.network_id == network_id
	}
}

impl fmt::Display for ChainPair {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.blockchain_id, self.network_id)
	}
}
