//! Mock implementations of the listener stores.
//!
//! - [`MockActionItemStore`] - Mock implementation of action item storage

use async_trait::async_trait;
use blockchain_listener::{
	models::{ActionItem, ActionItemKey, ChainPair},
	services::tracker::{ActionItemStore, TrackerError, UpsertOutcome},
};
use mockall::mock;

mock! {
	pub ActionItemStore {}

	#[async_trait]
	impl ActionItemStore for ActionItemStore {
		async fn upsert(&self, item: ActionItem) -> Result<UpsertOutcome, TrackerError>;
		async fn compare_and_set(
			&self,
			expected: &ActionItem,
			new: ActionItem,
		) -> Result<(), TrackerError>;
		async fn get(&self, key: &ActionItemKey) -> Result<Option<ActionItem>, TrackerError>;
		async fn list(&self, pair: &ChainPair) -> Result<Vec<ActionItem>, TrackerError>;
		async fn remove(
			&self,
			pair: &ChainPair,
			keys: &[ActionItemKey],
		) -> Result<usize, TrackerError>;
	}
}
