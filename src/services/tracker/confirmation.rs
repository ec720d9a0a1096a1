//! Confirmation tracking.
//!
//! Every candidate match becomes a pending action item. Items fire exactly once, the first time
//! their confirmations reach the subscription's requirement; items whose block is reorganized
//! away before firing are discarded.

use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

use crate::{
	models::{confirmations_at, ActionItem, ActionItemStatus, CandidateMatch, ChainPair},
	services::tracker::{
		error::TrackerError,
		store::{ActionItemStore, UpsertOutcome},
	},
};

/// Tracks action items of every pair in one store
pub struct ConfirmationTracker<S: ActionItemStore> {
	store: Arc<S>,
}

impl<S: ActionItemStore> Clone for ConfirmationTracker<S> {
	fn clone(&self) -> Self {
		Self {
			store: self.store.clone(),
		}
	}
}

impl<S: ActionItemStore> ConfirmationTracker<S> {
	pub fn new(store: Arc<S>) -> Self {
		Self { store }
	}

	pub fn store(&self) -> Arc<S> {
		self.store.clone()
	}

	/// Records `candidate` seen with chain head `head`
	pub async fn upsert(
		&self,
		candidate: CandidateMatch,
		head: u64,
	) -> Result<UpsertOutcome, TrackerError> {
		let item = ActionItem::from_candidate(candidate, head, Utc::now().timestamp_millis());
		self.store.upsert(item).await
	}

	/// Recomputes confirmations of the pending items of `pair` and fires those that reached
	/// their requirement.
	///
	/// Items are visited in ascending `(block_height, key)` order; only the items fired by this
	/// call are returned.
	#[instrument(skip(self), fields(pair = %pair))]
	pub async fn evaluate_all(
		&self,
		pair: &ChainPair,
		head: u64,
	) -> Result<Vec<ActionItem>, TrackerError> {
		let mut pending: Vec<ActionItem> = self
			.store
			.list(pair)
			.await?
			.into_iter()
			.filter(|item| item.status == ActionItemStatus::Pending)
			.collect();
		pending.sort_by_cached_key(|item| (item.block_height, item.key()));

		let now = Utc::now().timestamp_millis();
		let mut fired = Vec::new();

		for item in pending {
			let confirmations = confirmations_at(item.block_height, head);
			let mut next = item.clone();
			next.confirmations = confirmations;

			if next.is_confirmed() {
				next.status = ActionItemStatus::Fired;
				next.fired_at = Some(now);
			} else if confirmations == item.confirmations {
				continue;
			}

			match self.store.compare_and_set(&item, next.clone()).await {
				Ok(()) if next.status == ActionItemStatus::Fired => {
					tracing::debug!(
						key = %next.key(),
						confirmations,
						"Action item fired"
					);
					fired.push(next);
				}
				Ok(()) => {}
				Err(TrackerError::PersistenceConflict(ctx)) => {
					tracing::debug!("Skipping action item changed concurrently: {}", ctx);
				}
				Err(e) => return Err(e),
			}
		}

		Ok(fired)
	}

	/// Discards pending items of `pair` whose block is above `height`
	#[instrument(skip(self), fields(pair = %pair))]
	pub async fn discard_above(&self, pair: &ChainPair, height: u64) -> Result<usize, TrackerError> {
		let mut discarded = 0;

		for item in self.store.list(pair).await? {
			if item.status != ActionItemStatus::Pending || item.block_height <= height {
				continue;
			}

			let mut next = item.clone();
			next.status = ActionItemStatus::Discarded;
			match self.store.compare_and_set(&item, next).await {
				Ok(()) => discarded += 1,
				Err(TrackerError::PersistenceConflict(_)) => {}
				Err(e) => return Err(e),
			}
		}

		if discarded > 0 {
			tracing::info!(
				"Discarded {} pending action item(s) above height {}",
				discarded,
				height
			);
		}
		Ok(discarded)
	}

	/// Fired items of `pair` awaiting delivery, in ascending block height order
	pub async fn undelivered(&self, pair: &ChainPair) -> Result<Vec<ActionItem>, TrackerError> {
		let mut items: Vec<ActionItem> = self
			.store
			.list(pair)
			.await?
			.into_iter()
			.filter(|item| item.status == ActionItemStatus::Fired)
			.collect();
		items.sort_by_cached_key(|item| (item.block_height, item.key()));
		Ok(items)
	}

	/// Removes terminal items of `pair` whose block is below `height`
	pub async fn prune_terminal_below(
		&self,
		pair: &ChainPair,
		height: u64,
	) -> Result<usize, TrackerError> {
		let keys: Vec<_> = self
			.store
			.list(pair)
			.await?
			.iter()
			.filter(|item| item.status.is_terminal() && item.block_height < height)
			.map(ActionItem::key)
			.collect();

		if keys.is_empty() {
			return Ok(0);
		}
		self.store.remove(pair, &keys).await
	}
}
