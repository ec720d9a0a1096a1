//! Network configuration loading and validation.

use async_trait::async_trait;
use std::{collections::HashMap, path::Path};

use crate::{
	models::{
		config::{error::ConfigError, load_json_dir, read_json_file},
		ConfigLoader, Network, SecretValue,
	},
	utils::{get_cron_interval_ms, normalize_string, validate_cron_schedule},
};

/// Identifiers end up in job ids, file names and metric labels
fn is_valid_identifier(value: &str) -> bool {
	!value.is_empty()
		&& value
			.chars()
			.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[async_trait]
impl ConfigLoader for Network {
	/// Resolve all secrets in the network configuration
	async fn resolve_secrets(&self) -> Result<Self, ConfigError> {
		dotenvy::dotenv().ok();
		let mut network = self.clone();

		for rpc_url in &mut network.rpc_urls {
			let resolved_url = rpc_url.url.resolve().map_err(|e| {
				ConfigError::parse_error(
					format!("failed to resolve RPC URL: {}", e),
					Some(e),
					None,
				)
			})?;
			rpc_url.url = SecretValue::Plain(resolved_url);
		}
		Ok(network)
	}

	/// Load all network configurations from a directory (default `config/networks`)
	async fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>,
	{
		load_json_dir::<Self, T>(path.unwrap_or(Path::new("config/networks")), "networks").await
	}

	/// Load, resolve and validate a network configuration file
	async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
		let config: Network = read_json_file(path, "network")?;
		let config = config.resolve_secrets().await?;
		config.validate()?;
		Ok(config)
	}

	/// Validate the network configuration
	///
	/// Ensures that:
	/// - Name is set and the pair identifiers are lowercase identifiers
	/// - At least one usable RPC URL is specified
	/// - The cron schedule parses
	/// - Batch size, reorg depth and cycle timeout are at least 1
	fn validate(&self) -> Result<(), ConfigError> {
		if self.name.trim().is_empty() {
			return Err(ConfigError::validation_error(
				"Network name is required",
				None,
				None,
			));
		}

		for (field, value) in [
			("blockchain_id", &self.blockchain_id),
			("network_id", &self.network_id),
		] {
			if !is_valid_identifier(value) {
				return Err(ConfigError::validation_error(
					format!(
						"{} must be non-empty and contain only lowercase letters, numbers, \
						 underscores and hyphens",
						field
					),
					None,
					Some(HashMap::from([(field.to_string(), value.to_string())])),
				));
			}
		}

		if self.rpc_urls.is_empty() {
			return Err(ConfigError::validation_error(
				"At least one RPC URL is required",
				None,
				None,
			));
		}

		let supported_types = ["rpc"];
		if !self
			.rpc_urls
			.iter()
			.all(|rpc_url| supported_types.contains(&rpc_url.type_.as_str()))
		{
			return Err(ConfigError::validation_error(
				format!(
					"RPC URL type must be one of: {}",
					supported_types.join(", ")
				),
				None,
				None,
			));
		}

		if !self.rpc_urls.iter().all(|rpc_url| {
			rpc_url.url.starts_with("http://") || rpc_url.url.starts_with("https://")
		}) {
			return Err(ConfigError::validation_error(
				"All RPC URLs must start with http:// or https://",
				None,
				None,
			));
		}

		if !self.rpc_urls.iter().all(|rpc_url| rpc_url.weight <= 100) {
			return Err(ConfigError::validation_error(
				"All RPC URL weights must be between 0 and 100",
				None,
				None,
			));
		}

		if self.cron_schedule.is_empty() {
			return Err(ConfigError::validation_error(
				"Cron schedule must be provided",
				None,
				None,
			));
		}
		validate_cron_schedule(&self.cron_schedule)
			.map_err(|e| ConfigError::validation_error(e, None, None))?;

		for (field, value) in [
			("max_batch_size", self.max_batch_size),
			("max_reorg_depth", self.max_reorg_depth),
			("cycle_timeout_ms", self.cycle_timeout_ms),
		] {
			if value == 0 {
				return Err(ConfigError::validation_error(
					format!("{} must be at least 1", field),
					None,
					Some(HashMap::from([(
						"network".to_string(),
						self.pair().to_string(),
					)])),
				));
			}
		}

		if let Some(interval_ms) = get_cron_interval_ms(&self.cron_schedule) {
			if self.cycle_timeout_ms as i64 > interval_ms {
				tracing::warn!(
					"Network '{}' cycle_timeout_ms ({}) exceeds the cron interval ({}ms); \
					 overlapping ticks will be skipped",
					self.name,
					self.cycle_timeout_ms,
					interval_ms
				);
			}
		}

		self.validate_protocol();

		Ok(())
	}

	/// Logs a warning for every plain-HTTP RPC endpoint
	fn validate_protocol(&self) {
		for rpc_url in &self.rpc_urls {
			if rpc_url.url.starts_with("http://") {
				tracing::warn!(
					"Network '{}' uses an insecure RPC URL: {}",
					self.name,
					rpc_url.url.as_str()
				);
			}
		}
	}

	fn validate_uniqueness(
		instances: &[&Self],
		current_instance: &Self,
		file_path: &str,
	) -> Result<(), ConfigError> {
		if let Some(existing) = instances
			.iter()
			.find(|n| normalize_string(&n.name) == normalize_string(&current_instance.name))
		{
			return Err(ConfigError::validation_error(
				format!("Duplicate network name found: '{}'", existing.name),
				None,
				Some(HashMap::from([
					("network_name".to_string(), current_instance.name.clone()),
					("path".to_string(), file_path.to_string()),
				])),
			));
		}

		if instances.iter().any(|n| n.pair() == current_instance.pair()) {
			return Err(ConfigError::validation_error(
				format!(
					"Duplicate network pair found: '{}'",
					current_instance.pair()
				),
				None,
				Some(HashMap::from([
					("network_pair".to_string(), current_instance.pair().to_string()),
					("path".to_string(), file_path.to_string()),
				])),
			));
		}

		Ok(())
	}
}
