use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{ActionItemKind, ChainPair};

/// Watch criteria registered by a client for one pair
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Subscription {
	/// Unique name of the subscription
	pub name: String,

	/// Client that receives the notifications
	pub client_id: String,

	#[serde(default)]
	pub project_id: Option<String>,

	pub blockchain_id: String,

	pub network_id: String,

	/// Confirmations required before a match fires (0 fires immediately)
	pub min_confirmations: u64,

	/// Whether the subscription is paused
	#[serde(default)]
	pub paused: bool,

	/// Opaque payload copied onto every match
	#[serde(default)]
	pub params: Map<String, Value>,

	/// What to look for
	pub watch: WatchCriteria,
}

/// What a subscription matches on. Hex values are compared case-insensitively.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum WatchCriteria {
	/// A single transaction, by hash
	Transaction { hash: String },
	/// Any transaction sent from or to the address, and any log it emits
	Address { address: String },
	/// Logs emitted by a contract, optionally restricted to one event signature
	ContractEvent {
		address: String,
		#[serde(default)]
		event_id: Option<String>,
	},
}

impl WatchCriteria {
	pub fn kind(&self) -> ActionItemKind {
		match self {
			Self::Transaction { .. } => ActionItemKind::Transaction,
			Self::Address { .. } => ActionItemKind::Address,
			Self::ContractEvent { .. } => ActionItemKind::ContractEvent,
		}
	}
}

impl Subscription {
	pub fn pair(&self) -> ChainPair {
		ChainPair::new(&self.blockchain_id, &self.network_id)
	}

	/// Active subscription of `kind` on `pair`
	pub fn applies_to(&self, pair: &ChainPair, kind: ActionItemKind) -> bool {
		!self.paused && pair.matches(&self.blockchain_id, &self.network_id) && self.watch.kind() == kind
	}
}
