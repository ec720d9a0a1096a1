//! Configuration loading and validation.
//!
//! Networks, clients and subscriptions are JSON files under `config/{networks,clients,
//! subscriptions}`. Each type implements [`ConfigLoader`].

#![allow(clippy::result_large_err)]

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::{collections::HashMap, path::Path};

mod client_config;
mod error;
mod network_config;
mod subscription_config;

pub use error::ConfigError;

/// Common interface for loading configuration files
#[async_trait]
pub trait ConfigLoader: Sized {
	/// Load all configuration files from a directory
	///
	/// If no path is provided, uses the default config directory.
	async fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>;

	/// Load configuration from a specific file path
	async fn load_from_path(path: &Path) -> Result<Self, ConfigError>;

	/// Validate the configuration
	fn validate(&self) -> Result<(), ConfigError>;

	/// Logs a warning for insecure endpoints
	fn validate_protocol(&self);

	/// Check if a file is a JSON file based on extension
	fn is_json_file(path: &Path) -> bool {
		path.extension()
			.map(|ext| ext.to_string_lossy().to_lowercase() == "json")
			.unwrap_or(false)
	}

	/// Resolve all secrets in the configuration
	async fn resolve_secrets(&self) -> Result<Self, ConfigError>;

	/// Rejects `current_instance` if it collides with one of `instances`
	///
	/// `file_path` is only used for error metadata.
	fn validate_uniqueness(
		instances: &[&Self],
		current_instance: &Self,
		file_path: &str,
	) -> Result<(), ConfigError>;
}

fn path_metadata(path: &Path) -> Option<HashMap<String, String>> {
	Some(HashMap::from([(
		"path".to_string(),
		path.display().to_string(),
	)]))
}

/// Parses one JSON configuration file
pub(crate) fn read_json_file<C: DeserializeOwned>(path: &Path, kind: &str) -> Result<C, ConfigError> {
	let file = std::fs::File::open(path).map_err(|e| {
		ConfigError::file_error(
			format!("failed to open {} config file: {}", kind, e),
			Some(Box::new(e)),
			path_metadata(path),
		)
	})?;
	serde_json::from_reader(file).map_err(|e| {
		ConfigError::parse_error(
			format!("failed to parse {} config: {}", kind, e),
			Some(Box::new(e)),
			path_metadata(path),
		)
	})
}

/// Loads every JSON file of `dir` through `C::load_from_path`, keyed by file stem, checking
/// uniqueness against the files loaded before it
pub(crate) async fn load_json_dir<C, T>(dir: &Path, kind: &str) -> Result<T, ConfigError>
where
	C: ConfigLoader,
	T: FromIterator<(String, C)>,
{
	if !dir.exists() {
		return Err(ConfigError::file_error(
			format!("{} directory not found", kind),
			None,
			path_metadata(dir),
		));
	}

	let entries = std::fs::read_dir(dir).map_err(|e| {
		ConfigError::file_error(
			format!("failed to read {} directory: {}", kind, e),
			Some(Box::new(e)),
			path_metadata(dir),
		)
	})?;

	let mut paths = Vec::new();
	for entry in entries {
		let entry = entry.map_err(|e| {
			ConfigError::file_error(
				format!("failed to read directory entry: {}", e),
				Some(Box::new(e)),
				path_metadata(dir),
			)
		})?;
		let path = entry.path();
		if C::is_json_file(&path) {
			paths.push(path);
		}
	}
	// Deterministic order so that duplicate errors always name the same file
	paths.sort();

	let mut pairs: Vec<(String, C)> = Vec::new();
	for path in paths {
		let name = path
			.file_stem()
			.and_then(|s| s.to_str())
			.unwrap_or("unknown")
			.to_string();

		let config = C::load_from_path(&path).await?;

		let existing: Vec<&C> = pairs.iter().map(|(_, c)| c).collect();
		C::validate_uniqueness(&existing, &config, &path.display().to_string())?;

		pairs.push((name, config));
	}

	Ok(T::from_iter(pairs))
}
