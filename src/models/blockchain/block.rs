use serde::{Deserialize, Serialize};

/// A block as returned by a chain data provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
	pub height: u64,
	pub hash: String,
	pub parent_hash: String,
	/// Block time in epoch seconds
	pub timestamp: u64,
	#[serde(default)]
	pub transactions: Vec<BlockTransaction>,
	#[serde(default)]
	pub logs: Vec<BlockLog>,
}

/// A transaction included in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTransaction {
	pub hash: String,
	#[serde(default)]
	pub from: Option<String>,
	#[serde(default)]
	pub to: Option<String>,
	#[serde(default)]
	pub value: Option<String>,
	#[serde(default)]
	pub input: Option<String>,
}

/// A log (contract event) emitted in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockLog {
	pub address: String,
	#[serde(default)]
	pub topics: Vec<String>,
	#[serde(default)]
	pub data: String,
	#[serde(default)]
	pub transaction_hash: Option<String>,
	#[serde(default)]
	pub log_index: Option<u64>,
}

impl Block {
	/// Whether this block builds on a block with hash `hash`
	pub fn links_to(&self, hash: &str) -> bool {
		crate::utils::hex_eq(&self.parent_hash, hash)
	}
}

impl BlockLog {
	/// Event signature (first topic), if any
	pub fn event_id(&self) -> Option<&str> {
		self.topics.first().map(String::as_str)
	}
}
