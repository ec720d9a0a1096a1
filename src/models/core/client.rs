use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

use crate::{models::SecretValue, utils::RetryConfig};

/// A downstream consumer of notifications
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Client {
	/// Identifier referenced by subscriptions and action items
	pub client_id: String,

	/// Human-readable name
	pub name: String,

	/// Where notifications are sent
	pub webhook: WebhookConfig,

	/// Retries of transient transport failures within one delivery attempt
	#[serde(default)]
	pub retry_policy: RetryConfig,

	/// Attempts across cycles
	#[serde(default)]
	pub delivery: DeliveryPolicy,
}

/// Webhook destination of a client
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
	pub url: SecretValue,
	/// HTTP method, POST when unset
	#[serde(default)]
	pub method: Option<String>,
	/// Key for the HMAC-SHA256 payload signature
	#[serde(default)]
	pub secret: Option<SecretValue>,
	#[serde(default)]
	pub headers: Option<HashMap<String, String>>,
}

fn default_max_attempts() -> u32 {
	5
}

fn default_initial_backoff_ms() -> u64 {
	1_000
}

fn default_max_backoff_ms() -> u64 {
	300_000
}

fn default_attempt_timeout_ms() -> u64 {
	10_000
}

/// How often, and how far apart, a fired item is offered to the webhook
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeliveryPolicy {
	/// Total attempts before an item is exhausted
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	#[serde(default = "default_initial_backoff_ms")]
	pub initial_backoff_ms: u64,
	#[serde(default = "default_max_backoff_ms")]
	pub max_backoff_ms: u64,
	/// Upper bound on one attempt, including transport retries
	#[serde(default = "default_attempt_timeout_ms")]
	pub attempt_timeout_ms: u64,
}

impl Default for DeliveryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: default_max_attempts(),
			initial_backoff_ms: default_initial_backoff_ms(),
			max_backoff_ms: default_max_backoff_ms(),
			attempt_timeout_ms: default_attempt_timeout_ms(),
		}
	}
}

impl DeliveryPolicy {
	pub fn initial_backoff(&self) -> Duration {
		Duration::from_millis(self.initial_backoff_ms)
	}

	pub fn max_backoff(&self) -> Duration {
		Duration::from_millis(self.max_backoff_ms)
	}

	pub fn attempt_timeout(&self) -> Duration {
		Duration::from_millis(self.attempt_timeout_ms)
	}
}
