//! Reorganization detection.
//!
//! The cursor remembers the hashes of the last committed blocks. When the provider disagrees
//! with the cursor tip, the walk goes backward one height at a time until both sides agree;
//! that height is the fork point the listener rolls back to. A walk that outruns the retained
//! history while still within the allowed depth stops at the edge of that history instead.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::{
	models::ChainCursor,
	services::{blockchain::ChainDataProvider, listener::error::ListenerError},
	utils::hex_eq,
};

/// Outcome of comparing the cursor with the provider's chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainComparison {
	/// The provider still has the committed blocks
	Consistent,
	/// The provider's head is below anything the cursor remembers; nothing can be compared
	HeadBehind,
	/// The chain diverged above `common_height`
	Diverged { common_height: u64 },
	/// The chain diverged at or below the oldest retained hash, within the allowed depth.
	///
	/// Nothing local is left to compare, so the cursor restarts from the provider's block at
	/// `rollback_height`.
	BeyondHistory { rollback_height: u64 },
}

/// A reorg handled during a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorgReport {
	/// Cursor height when the reorg was detected
	pub detected_at: u64,
	/// Height the cursor was rolled back to: the fork point, or the edge of the retained
	/// history when the fork point lies below it
	pub common_height: u64,
	/// Pending action items discarded by the rollback
	pub discarded: usize,
}

impl ReorgReport {
	/// Number of committed blocks that were rolled back
	pub fn depth(&self) -> u64 {
		self.detected_at - self.common_height
	}
}

fn walk_metadata(cursor: &ChainCursor, height: u64) -> HashMap<String, String> {
	HashMap::from([
		("blockchain_id".to_string(), cursor.blockchain_id.clone()),
		("network_id".to_string(), cursor.network_id.clone()),
		("cursor_height".to_string(), cursor.last_height.to_string()),
		("height".to_string(), height.to_string()),
	])
}

/// Hash of the provider's block at `height`.
///
/// A block missing below the head means the provider cannot serve the walk.
async fn provider_hash(
	provider: &dyn ChainDataProvider,
	cursor: &ChainCursor,
	height: u64,
) -> Result<Option<String>, ListenerError> {
	provider
		.get_block(height)
		.await
		.map(|block| block.map(|b| b.hash))
		.map_err(|e| {
			ListenerError::provider_unavailable(
				format!("Failed to fetch block {}", height),
				Some(e.into()),
				Some(walk_metadata(cursor, height)),
			)
		})
}

/// Compares the cursor with the provider's chain as of `head`.
///
/// The check is made at the cursor tip, or at `head` when the provider is behind the cursor.
/// On disagreement the walk goes down at most `max_reorg_depth` blocks below the cursor tip;
/// a fork point deeper than that or below genesis is a `ReorgTooDeep` error. Running out of
/// retained hashes within that depth yields `BeyondHistory`.
pub async fn compare_with_chain(
	provider: &dyn ChainDataProvider,
	cursor: &ChainCursor,
	head: u64,
	max_reorg_depth: u64,
) -> Result<ChainComparison, ListenerError> {
	let check_height = cursor.last_height.min(head);
	let Some(local) = cursor.hash_at(check_height) else {
		warn!(
			"Provider head {} is below the retained history of cursor at {}",
			head, cursor.last_height
		);
		return Ok(ChainComparison::HeadBehind);
	};

	let remote = provider_hash(provider, cursor, check_height).await?;
	if remote.as_deref().is_some_and(|remote| hex_eq(remote, local)) {
		return Ok(ChainComparison::Consistent);
	}

	debug!(
		"Hash mismatch at {} (local {}, provider {:?}), walking back",
		check_height, local, remote
	);

	let lowest_allowed = cursor.last_height.saturating_sub(max_reorg_depth);
	let mut height = check_height;
	loop {
		if height == 0 {
			return Err(ListenerError::reorg_too_deep(
				"Chain diverged down to genesis",
				None,
				Some(walk_metadata(cursor, height)),
			));
		}
		height -= 1;

		if height < lowest_allowed {
			let mut metadata = walk_metadata(cursor, height);
			metadata.insert("max_reorg_depth".to_string(), max_reorg_depth.to_string());
			return Err(ListenerError::reorg_too_deep(
				format!("No common block within {} blocks", max_reorg_depth),
				None,
				Some(metadata),
			));
		}

		let Some(local) = cursor.hash_at(height) else {
			debug!(
				"Reorg walk ran past the retained history of cursor at {}, rolling back to {}",
				cursor.last_height, height
			);
			return Ok(ChainComparison::BeyondHistory {
				rollback_height: height,
			});
		};

		match provider_hash(provider, cursor, height).await? {
			Some(remote) if hex_eq(&remote, local) => {
				return Ok(ChainComparison::Diverged {
					common_height: height,
				});
			}
			Some(_) => continue,
			None => {
				return Err(ListenerError::provider_unavailable(
					format!("Provider has no block at {} below its head {}", height, head),
					None,
					Some(walk_metadata(cursor, height)),
				));
			}
		}
	}
}
