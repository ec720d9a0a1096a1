//! Action item storage.
//!
//! Stores guard every operation with a `tokio::sync::Mutex`, so each call is atomic with
//! respect to other calls on the same store. Items are grouped per pair.

use async_trait::async_trait;
use std::{
	collections::{BTreeMap, HashMap},
	path::PathBuf,
};
use tokio::sync::Mutex;

use crate::{
	models::{ActionItem, ActionItemKey, ActionItemStatus, ChainPair},
	services::tracker::error::TrackerError,
	utils::json_file::{read_json_state, write_json_state},
};

/// Result of storing a freshly scanned item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
	/// No item had this key
	Inserted,
	/// A pending item had this key; its confirmations were refreshed
	Updated,
	/// The existing item was left as it was
	Unchanged,
}

/// Persistence of action items
#[async_trait]
pub trait ActionItemStore: Send + Sync {
	/// Inserts `item` if its key is absent; refreshes the confirmations of a pending item.
	///
	/// Fired and terminal items are never modified.
	async fn upsert(&self, item: ActionItem) -> Result<UpsertOutcome, TrackerError>;

	/// Replaces the stored item with `new` if it still equals `expected`.
	///
	/// Fails with `PersistenceConflict` otherwise.
	async fn compare_and_set(
		&self,
		expected: &ActionItem,
		new: ActionItem,
	) -> Result<(), TrackerError>;

	async fn get(&self, key: &ActionItemKey) -> Result<Option<ActionItem>, TrackerError>;

	/// All items of `pair`, ordered by key
	async fn list(&self, pair: &ChainPair) -> Result<Vec<ActionItem>, TrackerError>;

	/// Removes the given items of `pair`, returning how many existed
	async fn remove(&self, pair: &ChainPair, keys: &[ActionItemKey])
		-> Result<usize, TrackerError>;
}

type PairItems = BTreeMap<ActionItemKey, ActionItem>;

fn upsert_into(items: &mut PairItems, item: ActionItem) -> UpsertOutcome {
	let key = item.key();
	match items.get_mut(&key) {
		None => {
			items.insert(key, item);
			UpsertOutcome::Inserted
		}
		Some(existing)
			if existing.status == ActionItemStatus::Pending
				&& existing.confirmations != item.confirmations =>
		{
			existing.confirmations = item.confirmations;
			UpsertOutcome::Updated
		}
		Some(_) => UpsertOutcome::Unchanged,
	}
}

fn compare_and_set_into(
	items: &mut PairItems,
	expected: &ActionItem,
	new: ActionItem,
) -> Result<(), TrackerError> {
	let key = expected.key();
	if new.key() != key {
		return Err(TrackerError::persistence_conflict(
			"Replacement item has a different key",
			None,
			Some(HashMap::from([("key".to_string(), key.to_string())])),
		));
	}

	match items.get_mut(&key) {
		Some(current) if current == expected => {
			*current = new;
			Ok(())
		}
		_ => Err(TrackerError::persistence_conflict(
			"Stored action item changed",
			None,
			Some(HashMap::from([("key".to_string(), key.to_string())])),
		)),
	}
}

fn remove_from(items: &mut PairItems, keys: &[ActionItemKey]) -> usize {
	keys.iter().filter(|key| items.remove(key).is_some()).count()
}

fn key_pair(key: &ActionItemKey) -> ChainPair {
	ChainPair::new(&key.blockchain_id, &key.network_id)
}

/// Action items held in memory only
#[derive(Default)]
pub struct InMemoryActionItemStore {
	items: Mutex<HashMap<ChainPair, PairItems>>,
}

impl InMemoryActionItemStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl ActionItemStore for InMemoryActionItemStore {
	async fn upsert(&self, item: ActionItem) -> Result<UpsertOutcome, TrackerError> {
		let mut items = self.items.lock().await;
		Ok(upsert_into(items.entry(item.pair()).or_default(), item))
	}

	async fn compare_and_set(
		&self,
		expected: &ActionItem,
		new: ActionItem,
	) -> Result<(), TrackerError> {
		let mut items = self.items.lock().await;
		compare_and_set_into(items.entry(expected.pair()).or_default(), expected, new)
	}

	async fn get(&self, key: &ActionItemKey) -> Result<Option<ActionItem>, TrackerError> {
		let items = self.items.lock().await;
		Ok(items
			.get(&key_pair(key))
			.and_then(|pair_items| pair_items.get(key))
			.cloned())
	}

	async fn list(&self, pair: &ChainPair) -> Result<Vec<ActionItem>, TrackerError> {
		let items = self.items.lock().await;
		Ok(items
			.get(pair)
			.map(|pair_items| pair_items.values().cloned().collect())
			.unwrap_or_default())
	}

	async fn remove(
		&self,
		pair: &ChainPair,
		keys: &[ActionItemKey],
	) -> Result<usize, TrackerError> {
		let mut items = self.items.lock().await;
		Ok(items
			.get_mut(pair)
			.map(|pair_items| remove_from(pair_items, keys))
			.unwrap_or(0))
	}
}

/// Action items persisted as one JSON file per pair: `<dir>/<slug>_action_items.json`.
///
/// Files are loaded on first access and rewritten atomically after every change.
pub struct FileActionItemStore {
	storage_path: PathBuf,
	items: Mutex<HashMap<ChainPair, PairItems>>,
}

impl FileActionItemStore {
	pub fn new(storage_path: PathBuf) -> Self {
		Self {
			storage_path,
			items: Mutex::new(HashMap::new()),
		}
	}

	fn file_path(&self, pair: &ChainPair) -> PathBuf {
		self.storage_path
			.join(format!("{}_action_items.json", pair.slug()))
	}

	/// Loads the items of `pair` into `cache` unless already present
	async fn ensure_loaded<'a>(
		&self,
		cache: &'a mut HashMap<ChainPair, PairItems>,
		pair: &ChainPair,
	) -> Result<&'a mut PairItems, TrackerError> {
		if !cache.contains_key(pair) {
			let path = self.file_path(pair);
			let stored: Vec<ActionItem> = read_json_state(&path)
				.await
				.map_err(|e| {
					TrackerError::storage_error(
						"Failed to load action items",
						Some(e.into()),
						Some(HashMap::from([(
							"path".to_string(),
							path.display().to_string(),
						)])),
					)
				})?
				.unwrap_or_default();
			cache.insert(
				pair.clone(),
				stored.into_iter().map(|item| (item.key(), item)).collect(),
			);
		}
		Ok(cache.entry(pair.clone()).or_default())
	}

	async fn persist(&self, pair: &ChainPair, items: &PairItems) -> Result<(), TrackerError> {
		let path = self.file_path(pair);
		let records: Vec<&ActionItem> = items.values().collect();
		write_json_state(&path, &records).await.map_err(|e| {
			TrackerError::storage_error(
				"Failed to persist action items",
				Some(e.into()),
				Some(HashMap::from([(
					"path".to_string(),
					path.display().to_string(),
				)])),
			)
		})
	}
}

#[async_trait]
impl ActionItemStore for FileActionItemStore {
	async fn upsert(&self, item: ActionItem) -> Result<UpsertOutcome, TrackerError> {
		let pair = item.pair();
		let mut cache = self.items.lock().await;
		let items = self.ensure_loaded(&mut cache, &pair).await?;

		let mut updated = items.clone();
		let outcome = upsert_into(&mut updated, item);
		if outcome != UpsertOutcome::Unchanged {
			self.persist(&pair, &updated).await?;
			*items = updated;
		}
		Ok(outcome)
	}

	async fn compare_and_set(
		&self,
		expected: &ActionItem,
		new: ActionItem,
	) -> Result<(), TrackerError> {
		let pair = expected.pair();
		let mut cache = self.items.lock().await;
		let items = self.ensure_loaded(&mut cache, &pair).await?;

		let mut updated = items.clone();
		compare_and_set_into(&mut updated, expected, new)?;
		self.persist(&pair, &updated).await?;
		*items = updated;
		Ok(())
	}

	async fn get(&self, key: &ActionItemKey) -> Result<Option<ActionItem>, TrackerError> {
		let mut cache = self.items.lock().await;
		let items = self.ensure_loaded(&mut cache, &key_pair(key)).await?;
		Ok(items.get(key).cloned())
	}

	async fn list(&self, pair: &ChainPair) -> Result<Vec<ActionItem>, TrackerError> {
		let mut cache = self.items.lock().await;
		let items = self.ensure_loaded(&mut cache, pair).await?;
		Ok(items.values().cloned().collect())
	}

	async fn remove(
		&self,
		pair: &ChainPair,
		keys: &[ActionItemKey],
	) -> Result<usize, TrackerError> {
		let mut cache = self.items.lock().await;
		let items = self.ensure_loaded(&mut cache, pair).await?;

		let mut updated = items.clone();
		let removed = remove_from(&mut updated, keys);
		if removed > 0 {
			self.persist(pair, &updated).await?;
			*items = updated;
		}
		Ok(removed)
	}
}
