//! Client configuration loading and validation.

use async_trait::async_trait;
use std::{collections::HashMap, path::Path};

use crate::{
	models::{
		config::{error::ConfigError, load_json_dir, read_json_file},
		Client, ConfigLoader, SecretValue,
	},
	utils::normalize_string,
};

const SUPPORTED_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

#[async_trait]
impl ConfigLoader for Client {
	/// Resolve the webhook URL and signing secret
	async fn resolve_secrets(&self) -> Result<Self, ConfigError> {
		dotenvy::dotenv().ok();
		let mut client = self.clone();

		let url = client.webhook.url.resolve().map_err(|e| {
			ConfigError::parse_error(
				format!("failed to resolve webhook URL: {}", e),
				Some(e),
				None,
			)
		})?;
		client.webhook.url = SecretValue::Plain(url);

		if let Some(secret) = &client.webhook.secret {
			let resolved = secret.resolve().map_err(|e| {
				ConfigError::parse_error(
					format!("failed to resolve webhook secret: {}", e),
					Some(e),
					None,
				)
			})?;
			client.webhook.secret = Some(SecretValue::Plain(resolved));
		}

		Ok(client)
	}

	/// Load all client configurations from a directory (default `config/clients`)
	async fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>,
	{
		load_json_dir::<Self, T>(path.unwrap_or(Path::new("config/clients")), "clients").await
	}

	async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
		let config: Client = read_json_file(path, "client")?;
		let config = config.resolve_secrets().await?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		let metadata = Some(HashMap::from([(
			"client_id".to_string(),
			self.client_id.clone(),
		)]));

		if self.client_id.trim().is_empty() {
			return Err(ConfigError::validation_error(
				"client_id is required",
				None,
				None,
			));
		}

		if self.name.trim().is_empty() {
			return Err(ConfigError::validation_error(
				"Client name is required",
				None,
				metadata,
			));
		}

		let url = &self.webhook.url;
		if url.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
			return Err(ConfigError::validation_error(
				"Webhook URL must start with http:// or https://",
				None,
				metadata,
			));
		}

		if let Some(method) = &self.webhook.method {
			if !SUPPORTED_METHODS.contains(&method.to_uppercase().as_str()) {
				return Err(ConfigError::validation_error(
					format!(
						"Webhook method must be one of: {}",
						SUPPORTED_METHODS.join(", ")
					),
					None,
					metadata,
				));
			}
		}

		if self.webhook.secret.as_ref().is_some_and(|s| s.is_empty()) {
			return Err(ConfigError::validation_error(
				"Webhook secret must not be empty when set",
				None,
				metadata,
			));
		}

		let delivery = &self.delivery;
		if delivery.max_attempts == 0 {
			return Err(ConfigError::validation_error(
				"delivery.max_attempts must be at least 1",
				None,
				metadata,
			));
		}
		if delivery.attempt_timeout_ms == 0 {
			return Err(ConfigError::validation_error(
				"delivery.attempt_timeout_ms must be at least 1",
				None,
				metadata,
			));
		}
		if delivery.initial_backoff_ms > delivery.max_backoff_ms {
			return Err(ConfigError::validation_error(
				"delivery.initial_backoff_ms must not exceed delivery.max_backoff_ms",
				None,
				metadata,
			));
		}

		self.validate_protocol();

		Ok(())
	}

	fn validate_protocol(&self) {
		if self.webhook.url.starts_with("http://") {
			tracing::warn!("Client '{}' uses an insecure webhook URL", self.client_id);
		}
		if self.webhook.secret.is_none() {
			tracing::warn!(
				"Client '{}' has no webhook secret; payloads will not be signed",
				self.client_id
			);
		}
	}

	fn validate_uniqueness(
		instances: &[&Self],
		current_instance: &Self,
		file_path: &str,
	) -> Result<(), ConfigError> {
		if instances.iter().any(|existing| {
			normalize_string(&existing.client_id) == normalize_string(&current_instance.client_id)
		}) {
			return Err(ConfigError::validation_error(
				format!(
					"Duplicate client_id found: '{}'",
					current_instance.client_id
				),
				None,
				Some(HashMap::from([
					("client_id".to_string(), current_instance.client_id.clone()),
					("path".to_string(), file_path.to_string()),
				])),
			));
		}
		Ok(())
	}
}
