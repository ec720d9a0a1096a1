//! JSON state files written atomically.
//!
//! State is written to a sibling temporary file which is then renamed over the target, so a
//! crash leaves either the previous or the new content on disk, never a partial file.

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

fn temp_path(path: &Path) -> PathBuf {
	let mut name = path
		.file_name()
		.map(|n| n.to_os_string())
		.unwrap_or_default();
	name.push(".tmp");
	path.with_file_name(name)
}

/// Reads and parses `path`, `None` when it does not exist
pub async fn read_json_state<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, anyhow::Error> {
	let content = match tokio::fs::read(path).await {
		Ok(content) => content,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(e) => {
			return Err(e).with_context(|| format!("Failed to read {}", path.display()));
		}
	};

	let value = serde_json::from_slice(&content)
		.with_context(|| format!("Failed to parse {}", path.display()))?;
	Ok(Some(value))
}

/// Serializes `value` to `path` through a temporary file and a rename
pub async fn write_json_state<T: Serialize>(path: &Path, value: &T) -> Result<(), anyhow::Error> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		tokio::fs::create_dir_all(parent)
			.await
			.with_context(|| format!("Failed to create {}", parent.display()))?;
	}

	let json = serde_json::to_vec_pretty(value).context("Failed to serialize state")?;
	let temp = temp_path(path);
	tokio::fs::write(&temp, json)
		.await
		.with_context(|| format!("Failed to write {}", temp.display()))?;
	tokio::fs::rename(&temp, path)
		.await
		.with_context(|| format!("Failed to replace {}", path.display()))?;
	Ok(())
}
