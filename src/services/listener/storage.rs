//! Cursor storage implementations for the listener.
//!
//! A cursor is the per-pair progress marker. It is only ever replaced through
//! [`CursorStore::compare_and_set`], so a cycle that read a stale cursor cannot overwrite the
//! progress of another.

use async_trait::async_trait;
use std::{collections::HashMap, path::PathBuf};
use tokio::sync::Mutex;

use crate::{
	models::{ChainCursor, ChainPair},
	services::listener::error::ListenerError,
	utils::json_file::{read_json_state, write_json_state},
};

/// Interface for cursor storage implementations
#[async_trait]
pub trait CursorStore: Send + Sync {
	/// Current cursor of `pair`, `None` before the first committed block
	async fn get(&self, pair: &ChainPair) -> Result<Option<ChainCursor>, ListenerError>;

	/// Stores `new` if the stored cursor still equals `expected` (`None`: no cursor yet).
	///
	/// Fails with `CursorConflict` otherwise.
	async fn compare_and_set(
		&self,
		pair: &ChainPair,
		expected: Option<&ChainCursor>,
		new: ChainCursor,
	) -> Result<(), ListenerError>;
}

fn pair_metadata(pair: &ChainPair) -> HashMap<String, String> {
	HashMap::from([
		("blockchain_id".to_string(), pair.blockchain_id.clone()),
		("network_id".to_string(), pair.network_id.clone()),
	])
}

fn check_expected(
	pair: &ChainPair,
	current: Option<&ChainCursor>,
	expected: Option<&ChainCursor>,
	new: &ChainCursor,
) -> Result<(), ListenerError> {
	if &new.pair() != pair {
		return Err(ListenerError::cursor_conflict(
			format!("Cursor of {} cannot be stored under {}", new.pair(), pair),
			None,
			Some(pair_metadata(pair)),
		));
	}
	if current != expected {
		let mut metadata = pair_metadata(pair);
		metadata.insert(
			"stored_height".to_string(),
			current
				.map(|c| c.last_height.to_string())
				.unwrap_or_else(|| "none".to_string()),
		);
		return Err(ListenerError::cursor_conflict(
			"Stored cursor changed since it was read",
			None,
			Some(metadata),
		));
	}
	Ok(())
}

/// Cursors held in memory only
#[derive(Default)]
pub struct InMemoryCursorStore {
	cursors: Mutex<HashMap<ChainPair, ChainCursor>>,
}

impl InMemoryCursorStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
	async fn get(&self, pair: &ChainPair) -> Result<Option<ChainCursor>, ListenerError> {
		Ok(self.cursors.lock().await.get(pair).cloned())
	}

	async fn compare_and_set(
		&self,
		pair: &ChainPair,
		expected: Option<&ChainCursor>,
		new: ChainCursor,
	) -> Result<(), ListenerError> {
		let mut cursors = self.cursors.lock().await;
		check_expected(pair, cursors.get(pair), expected, &new)?;
		cursors.insert(pair.clone(), new);
		Ok(())
	}
}

/// File-based cursor storage: one `<dir>/<slug>_cursor.json` per pair.
///
/// The file is re-read under the lock on every compare-and-set, so several processes sharing
/// a directory still cannot silently overwrite each other.
pub struct FileCursorStore {
	/// Base path for all cursor files
	storage_path: PathBuf,
	lock: Mutex<()>,
}

impl FileCursorStore {
	pub fn new(storage_path: PathBuf) -> Self {
		Self {
			storage_path,
			lock: Mutex::new(()),
		}
	}

	fn file_path(&self, pair: &ChainPair) -> PathBuf {
		self.storage_path.join(format!("{}_cursor.json", pair.slug()))
	}

	async fn read(&self, pair: &ChainPair) -> Result<Option<ChainCursor>, ListenerError> {
		let path = self.file_path(pair);
		read_json_state(&path).await.map_err(|e| {
			let mut metadata = pair_metadata(pair);
			metadata.insert("path".to_string(), path.display().to_string());
			ListenerError::storage_error("Failed to read cursor", Some(e.into()), Some(metadata))
		})
	}
}

impl Default for FileCursorStore {
	/// Stores cursors under `data/`
	fn default() -> Self {
		FileCursorStore::new(PathBuf::from("data"))
	}
}

#[async_trait]
impl CursorStore for FileCursorStore {
	async fn get(&self, pair: &ChainPair) -> Result<Option<ChainCursor>, ListenerError> {
		let _guard = self.lock.lock().await;
		self.read(pair).await
	}

	async fn compare_and_set(
		&self,
		pair: &ChainPair,
		expected: Option<&ChainCursor>,
		new: ChainCursor,
	) -> Result<(), ListenerError> {
		let _guard = self.lock.lock().await;
		let current = self.read(pair).await?;
		check_expected(pair, current.as_ref(), expected, &new)?;

		let path = self.file_path(pair);
		write_json_state(&path, &new).await.map_err(|e| {
			let mut metadata = pair_metadata(pair);
			metadata.insert("path".to_string(), path.display().to_string());
			ListenerError::storage_error("Failed to write cursor", Some(e.into()), Some(metadata))
		})
	}
}
