use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Block, ChainPair};

/// Progress marker of a pair: the last block whose scanning completed.
///
/// `recent_hashes` keeps the hashes of the last committed blocks (including `last_height`)
/// so that a reorg can be walked backward without asking the provider for history it may
/// already have replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCursor {
	pub blockchain_id: String,
	pub network_id: String,
	pub last_height: u64,
	pub last_hash: String,
	#[serde(default)]
	pub recent_hashes: BTreeMap<u64, String>,
}

impl ChainCursor {
	/// Cursor pointing at `block`.
	///
	/// The parent hash is remembered as well, so a reorg of `block` alone has a fork point.
	pub fn at_block(pair: &ChainPair, block: &Block) -> Self {
		let mut recent_hashes = BTreeMap::from([(block.height, block.hash.clone())]);
		if block.height > 0 && !block.parent_hash.is_empty() {
			recent_hashes.insert(block.height - 1, block.parent_hash.clone());
		}

		Self {
			blockchain_id: pair.blockchain_id.clone(),
			network_id: pair.network_id.clone(),
			last_height: block.height,
			last_hash: block.hash.clone(),
			recent_hashes,
		}
	}

	pub fn pair(&self) -> ChainPair {
		ChainPair::new(&self.blockchain_id, &self.network_id)
	}

	/// Locally recorded hash at `height`
	pub fn hash_at(&self, height: u64) -> Option<&str> {
		if height == self.last_height {
			return Some(self.last_hash.as_str());
		}
		self.recent_hashes.get(&height).map(String::as_str)
	}

	/// Lowest height still covered by the retained history
	pub fn oldest_retained(&self) -> u64 {
		self.recent_hashes
			.keys()
			.next()
			.copied()
			.unwrap_or(self.last_height)
	}

	/// Returns the cursor moved forward to `block`, keeping at most `history` hashes
	pub fn advanced(&self, block: &Block, history: usize) -> Self {
		let mut recent_hashes = self.recent_hashes.clone();
		recent_hashes.insert(self.last_height, self.last_hash.clone());
		recent_hashes.insert(block.height, block.hash.clone());
		while recent_hashes.len() > history.max(1) {
			recent_hashes.pop_first();
		}

		Self {
			blockchain_id: self.blockchain_id.clone(),
			network_id: self.network_id.clone(),
			last_height: block.height,
			last_hash: block.hash.clone(),
			recent_hashes,
		}
	}

	/// Returns the cursor rolled back to `height`, discarding history above it.
	///
	/// `None` when `height` is not covered by the retained history.
	pub fn rolled_back_to(&self, height: u64) -> Option<Self> {
		let hash = self.hash_at(height)?.to_string();
		let recent_hashes = self
			.recent_hashes
			.range(..=height)
			.map(|(h, v)| (*h, v.clone()))
			.collect();

		Some(Self {
			blockchain_id: self.blockchain_id.clone(),
			network_id: self.network_id.clone(),
			last_height: height,
			last_hash: hash,
			recent_hashes,
		})
	}
}
