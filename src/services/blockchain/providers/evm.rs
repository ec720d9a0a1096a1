//! EVM JSON-RPC chain data provider.
//!
//! Blocks come from `eth_getBlockByNumber` with full transactions; logs are fetched with
//! `eth_getLogs` filtered by block hash, so both always describe the same block.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::{
	models::{Block, BlockLog, BlockTransaction, ChainPair, Network},
	services::blockchain::{
		provider::ChainDataProvider,
		transports::{BlockchainTransport, HttpTransportClient},
	},
	utils::{parse_hex_quantity, to_hex_quantity},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlock {
	number: String,
	hash: String,
	parent_hash: String,
	timestamp: String,
	#[serde(default)]
	transactions: Vec<RpcTransaction>,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
	hash: String,
	#[serde(default)]
	from: Option<String>,
	#[serde(default)]
	to: Option<String>,
	#[serde(default)]
	value: Option<String>,
	#[serde(default)]
	input: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
	address: String,
	#[serde(default)]
	topics: Vec<String>,
	#[serde(default)]
	data: String,
	#[serde(default)]
	transaction_hash: Option<String>,
	#[serde(default)]
	log_index: Option<String>,
	#[serde(default)]
	removed: bool,
}

impl TryFrom<RpcLog> for BlockLog {
	type Error = anyhow::Error;

	fn try_from(log: RpcLog) -> Result<Self, Self::Error> {
		let log_index = log
			.log_index
			.as_deref()
			.map(parse_hex_quantity)
			.transpose()
			.map_err(|e| anyhow::anyhow!("Invalid logIndex: {}", e))?;
		Ok(BlockLog {
			address: log.address,
			topics: log.topics,
			data: log.data,
			transaction_hash: log.transaction_hash,
			log_index,
		})
	}
}

/// [`ChainDataProvider`] over an EVM JSON-RPC transport
#[derive(Clone)]
pub struct EvmRpcProvider<T: BlockchainTransport> {
	pair: ChainPair,
	transport: T,
}

impl<T: BlockchainTransport> EvmRpcProvider<T> {
	/// Creates a provider for `pair` with a specific transport
	pub fn new_with_transport(pair: ChainPair, transport: T) -> Self {
		Self { pair, transport }
	}

	async fn get_block_logs(&self, block_hash: &str) -> Result<Vec<BlockLog>, anyhow::Error> {
		let response = self
			.transport
			.send_raw_request("eth_getLogs", json!([{ "blockHash": block_hash }]))
			.await
			.with_context(|| format!("Failed to get logs for block {}", block_hash))?;

		let logs: Vec<RpcLog> =
			serde_json::from_value(response).with_context(|| "Failed to parse logs")?;

		logs.into_iter()
			.filter(|log| !log.removed)
			.map(BlockLog::try_from)
			.collect()
	}
}

impl EvmRpcProvider<HttpTransportClient> {
	/// Creates a provider for `network` over HTTP
	pub fn new(network: &Network) -> Result<Self, anyhow::Error> {
		let transport = HttpTransportClient::new(network)?;
		Ok(Self::new_with_transport(network.pair(), transport))
	}
}

#[async_trait]
impl<T: BlockchainTransport> ChainDataProvider for EvmRpcProvider<T> {
	fn chain_id(&self) -> &str {
		&self.pair.blockchain_id
	}

	fn network_id(&self) -> &str {
		&self.pair.network_id
	}

	#[instrument(skip(self), fields(pair = %self.pair))]
	async fn get_head_height(&self) -> Result<u64, anyhow::Error> {
		let response = self
			.transport
			.send_raw_request("eth_blockNumber", json!([]))
			.await
			.with_context(|| "Failed to get latest block number")?;

		let quantity = response
			.as_str()
			.with_context(|| "Invalid 'result' field")?;
		parse_hex_quantity(quantity).map_err(|e| anyhow::anyhow!("Invalid block number: {}", e))
	}

	#[instrument(skip(self), fields(pair = %self.pair))]
	async fn get_block(&self, height: u64) -> Result<Option<Block>, anyhow::Error> {
		let response = self
			.transport
			.send_raw_request(
				"eth_getBlockByNumber",
				json!([to_hex_quantity(height), true]),
			)
			.await
			.with_context(|| format!("Failed to get block {}", height))?;

		if response.is_null() {
			return Ok(None);
		}

		let block: RpcBlock = serde_json::from_value(response)
			.with_context(|| format!("Failed to parse block {}", height))?;

		let number = parse_hex_quantity(&block.number)
			.map_err(|e| anyhow::anyhow!("Invalid block number: {}", e))?;
		if number != height {
			anyhow::bail!("Requested block {} but provider returned {}", height, number);
		}
		let timestamp = parse_hex_quantity(&block.timestamp)
			.map_err(|e| anyhow::anyhow!("Invalid block timestamp: {}", e))?;

		let logs = self.get_block_logs(&block.hash).await?;

		Ok(Some(Block {
			height: number,
			hash: block.hash,
			parent_hash: block.parent_hash,
			timestamp,
			transactions: block
				.transactions
				.into_iter()
				.map(|tx| BlockTransaction {
					hash: tx.hash,
					from: tx.from,
					to: tx.to,
					value: tx.value,
					input: tx.input,
				})
				.collect(),
			logs,
		}))
	}
}
