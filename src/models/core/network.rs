use serde::{Deserialize, Serialize};

use crate::{
	models::{ChainPair, SecretValue},
	utils::RetryConfig,
};

fn default_cycle_timeout_ms() -> u64 {
	60_000
}

/// Listener configuration for one (blockchain, network) pair.
///
/// `max_batch_size` and `max_reorg_depth` have no defaults.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Network {
	/// Human-readable name of the network
	pub name: String,

	/// Blockchain identifier, e.g. "ethereum"
	pub blockchain_id: String,

	/// Network identifier within the blockchain, e.g. "mainnet"
	pub network_id: String,

	/// List of RPC endpoints with their weights for failover ordering
	pub rpc_urls: Vec<RpcUrl>,

	/// Cron expression (seconds resolution) for how often a cycle runs
	pub cron_schedule: String,

	/// Maximum number of blocks scanned in one cycle
	pub max_batch_size: u64,

	/// Maximum number of blocks the reorg walk may go back
	pub max_reorg_depth: u64,

	/// Upper bound on a single cycle's duration
	#[serde(default = "default_cycle_timeout_ms")]
	pub cycle_timeout_ms: u64,

	/// First height to scan when no cursor exists yet (defaults to the head)
	#[serde(default)]
	pub start_height: Option<u64>,

	/// Terminal action items this many blocks below the cursor are pruned
	#[serde(default)]
	pub terminal_retention_blocks: Option<u64>,

	/// Retry policy for RPC requests
	#[serde(default)]
	pub retry_policy: RetryConfig,
}

/// RPC endpoint configuration with failover weight
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RpcUrl {
	/// Type of RPC endpoint (e.g. "rpc")
	pub type_: String,

	/// URL of the RPC endpoint (can be a secret value)
	pub url: SecretValue,

	/// Weight for endpoint ordering (0-100, 0 disables the endpoint)
	pub weight: u32,
}

impl Network {
	pub fn pair(&self) -> ChainPair {
		ChainPair::new(&self.blockchain_id, &self.network_id)
	}
}
