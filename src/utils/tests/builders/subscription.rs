//! Test helper utilities for Subscription configuration
//!
//! - `SubscriptionBuilder`: Builder for creating test Subscription instances

use serde_json::{Map, Value};

use crate::models::{Subscription, WatchCriteria};

/// Builder for creating test Subscription instances
pub struct SubscriptionBuilder {
	name: String,
	client_id: String,
	project_id: Option<String>,
	blockchain_id: String,
	network_id: String,
	min_confirmations: u64,
	paused: bool,
	params: Map<String, Value>,
	watch: WatchCriteria,
}

impl Default for SubscriptionBuilder {
	fn default() -> Self {
		Self {
			name: "treasury".to_string(),
			client_id: "acme".to_string(),
			project_id: None,
			blockchain_id: "ethereum".to_string(),
			network_id: "mainnet".to_string(),
			min_confirmations: 1,
			paused: false,
			params: Map::new(),
			watch: WatchCriteria::Address {
				address: "0x00000000000000000000000000000000000000aa".to_string(),
			},
		}
	}
}

impl SubscriptionBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn name(mut self, name: &str) -> Self {
		self.name = name.to_string();
		self
	}

	pub fn client_id(mut self, client_id: &str) -> Self {
		self.client_id = client_id.to_string();
		self
	}

	pub fn project_id(mut self, project_id: &str) -> Self {
		self.project_id = Some(project_id.to_string());
		self
	}

	pub fn pair(mut self, blockchain_id: &str, network_id: &str) -> Self {
		self.blockchain_id = blockchain_id.to_string();
		self.network_id = network_id.to_string();
		self
	}

	pub fn min_confirmations(mut self, confirmations: u64) -> Self {
		self.min_confirmations = confirmations;
		self
	}

	pub fn paused(mut self, paused: bool) -> Self {
		self.paused = paused;
		self
	}

	pub fn param(mut self, key: &str, value: Value) -> Self {
		self.params.insert(key.to_string(), value);
		self
	}

	pub fn transaction(mut self, hash: &str) -> Self {
		self.watch = WatchCriteria::Transaction {
			hash: hash.to_string(),
		};
		self
	}

	pub fn address(mut self, address: &str) -> Self {
		self.watch = WatchCriteria::Address {
			address: address.to_string(),
		};
		self
	}

	pub fn contract_event(mut self, address: &str, event_id: Option<&str>) -> Self {
		self.watch = WatchCriteria::ContractEvent {
			address: address.to_string(),
			event_id: event_id.map(str::to_string),
		};
		self
	}

	pub fn build(self) -> Subscription {
		Subscription {
			name: self.name,
			client_id: self.client_id,
			project_id: self.project_id,
			blockchain_id: self.blockchain_id,
			network_id: self.network_id,
			min_confirmations: self.min_confirmations,
			paused: self.paused,
			params: self.params,
			watch: self.watch,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::ActionItemKind;
	use serde_json::json;

	#[test]
	fn test_default_subscription() {
		let subscription = SubscriptionBuilder::new().build();
		assert_eq!(subscription.name, "treasury");
		assert_eq!(subscription.pair().to_string(), "ethereum/mainnet");
		assert_eq!(subscription.watch.kind(), ActionItemKind::Address);
		assert!(!subscription.paused);
	}

	#[test]
	fn test_watch_and_params() {
		let subscription = SubscriptionBuilder::new()
			.contract_event("0x02", Some("0xddf2"))
			.param("label", json!("usdc"))
			.project_id("wallet")
			.build();
		assert_eq!(subscription.watch.kind(), ActionItemKind::ContractEvent);
		assert_eq!(subscription.params.get("label"), Some(&json!("usdc")));
		assert_eq!(subscription.project_id.as_deref(), Some("wallet"));
	}
}
