//! Subscription configuration loading and validation.

use async_trait::async_trait;
use std::{collections::HashMap, path::Path};

use crate::{
	models::{
		config::{error::ConfigError, load_json_dir, read_json_file},
		ConfigLoader, Subscription, WatchCriteria,
	},
	utils::normalize_string,
};

fn is_blank_or_spaced(value: &str) -> bool {
	value.trim().is_empty() || value.trim().contains(char::is_whitespace)
}

#[async_trait]
impl ConfigLoader for Subscription {
	/// Subscriptions hold no secrets
	async fn resolve_secrets(&self) -> Result<Self, ConfigError> {
		Ok(self.clone())
	}

	/// Load all subscriptions from a directory (default `config/subscriptions`)
	async fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>,
	{
		load_json_dir::<Self, T>(
			path.unwrap_or(Path::new("config/subscriptions")),
			"subscriptions",
		)
		.await
	}

	async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
		let config: Subscription = read_json_file(path, "subscription")?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		let metadata = Some(HashMap::from([(
			"subscription".to_string(),
			self.name.clone(),
		)]));

		if self.name.trim().is_empty() {
			return Err(ConfigError::validation_error(
				"Subscription name is required",
				None,
				None,
			));
		}

		for (field, value) in [
			("client_id", &self.client_id),
			("blockchain_id", &self.blockchain_id),
			("network_id", &self.network_id),
		] {
			if value.trim().is_empty() {
				return Err(ConfigError::validation_error(
					format!("{} is required", field),
					None,
					metadata,
				));
			}
		}

		let watched = match &self.watch {
			WatchCriteria::Transaction { hash } => vec![("hash", Some(hash))],
			WatchCriteria::Address { address } => vec![("address", Some(address))],
			WatchCriteria::ContractEvent { address, event_id } => {
				vec![("address", Some(address)), ("event_id", event_id.as_ref())]
			}
		};
		for (field, value) in watched {
			if let Some(value) = value {
				if is_blank_or_spaced(value) {
					return Err(ConfigError::validation_error(
						format!("watch.{} must be a non-empty identifier", field),
						None,
						metadata,
					));
				}
			}
		}

		Ok(())
	}

	/// Subscriptions carry no endpoints
	fn validate_protocol(&self) {}

	fn validate_uniqueness(
		instances: &[&Self],
		current_instance: &Self,
		file_path: &str,
	) -> Result<(), ConfigError> {
		if instances
			.iter()
			.any(|existing| normalize_string(&existing.name) == normalize_string(&current_instance.name))
		{
			return Err(ConfigError::validation_error(
				format!("Duplicate subscription name found: '{}'", current_instance.name),
				None,
				Some(HashMap::from([
					("subscription".to_string(), current_instance.name.clone()),
					("path".to_string(), file_path.to_string()),
				])),
			));
		}
		Ok(())
	}
}
