//! Test helper utilities for action items
//!
//! - `ActionItemBuilder`: Builder for creating test ActionItem instances, fired by default

use serde_json::{Map, Value};

use crate::{
	models::{ActionItem, ActionItemKind, ActionItemStatus},
	utils::tests::builders::block::block_hash,
};

/// Builder for creating test ActionItem instances
pub struct ActionItemBuilder {
	item: ActionItem,
}

impl Default for ActionItemBuilder {
	fn default() -> Self {
		Self {
			item: ActionItem {
				client_id: "acme".to_string(),
				project_id: None,
				blockchain_id: "ethereum".to_string(),
				network_id: "mainnet".to_string(),
				block_hash: block_hash(100, 0),
				block_height: 100,
				block_time: 1_700_000_000,
				min_confirmations: 1,
				confirmations: 1,
				kind: ActionItemKind::Transaction,
				ref_id: "0xt100".to_string(),
				event_id: None,
				tx_hash: Some("0xt100".to_string()),
				address: None,
				params: Map::new(),
				subscription: "treasury".to_string(),
				status: ActionItemStatus::Fired,
				delivery_attempts: 0,
				next_delivery_at: None,
				created_at: 0,
				fired_at: Some(0),
			},
		}
	}
}

impl ActionItemBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn client_id(mut self, client_id: &str) -> Self {
		self.item.client_id = client_id.to_string();
		self
	}

	pub fn pair(mut self, blockchain_id: &str, network_id: &str) -> Self {
		self.item.blockchain_id = blockchain_id.to_string();
		self.item.network_id = network_id.to_string();
		self
	}

	/// Places the item in block `height` of fork 0
	pub fn height(mut self, height: u64) -> Self {
		self.item.block_height = height;
		self.item.block_hash = block_hash(height, 0);
		self
	}

	pub fn ref_id(mut self, ref_id: &str) -> Self {
		self.item.ref_id = ref_id.to_string();
		self.item.tx_hash = Some(ref_id.to_string());
		self
	}

	pub fn kind(mut self, kind: ActionItemKind) -> Self {
		self.item.kind = kind;
		self
	}

	pub fn status(mut self, status: ActionItemStatus) -> Self {
		self.item.status = status;
		self
	}

	pub fn confirmations(mut self, confirmations: u64, min_confirmations: u64) -> Self {
		self.item.confirmations = confirmations;
		self.item.min_confirmations = min_confirmations;
		self
	}

	pub fn delivery_attempts(mut self, attempts: u32) -> Self {
		self.item.delivery_attempts = attempts;
		self
	}

	pub fn next_delivery_at(mut self, at: i64) -> Self {
		self.item.next_delivery_at = Some(at);
		self
	}

	pub fn param(mut self, key: &str, value: Value) -> Self {
		self.item.params.insert(key.to_string(), value);
		self
	}

	pub fn build(self) -> ActionItem {
		self.item
	}
}
