//! Action items: matches tracked from detection until notification.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::{models::ChainPair, utils::normalize_string};

/// What kind of activity produced an action item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionItemKind {
	Transaction,
	Address,
	ContractEvent,
}

impl fmt::Display for ActionItemKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Transaction => write!(f, "transaction"),
			Self::Address => write!(f, "address"),
			Self::ContractEvent => write!(f, "contract_event"),
		}
	}
}

/// Lifecycle of an action item.
///
/// `pending -> fired -> delivered | exhausted`, or `pending -> discarded` when the block is
/// reorganized away before the item fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionItemStatus {
	#[default]
	Pending,
	Fired,
	Delivered,
	Exhausted,
	Discarded,
}

impl ActionItemStatus {
	/// Delivered, exhausted and discarded items never change again
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Delivered | Self::Exhausted | Self::Discarded)
	}
}

/// Identity of an action item. Re-scanning the same block yields the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionItemKey {
	pub client_id: String,
	pub blockchain_id: String,
	pub network_id: String,
	pub kind: ActionItemKind,
	pub ref_id: String,
	pub event_id: Option<String>,
	pub block_hash: String,
}

impl ActionItemKey {
	/// Key with hex-like parts normalized so that casing never splits one item in two
	pub fn new(
		client_id: &str,
		blockchain_id: &str,
		network_id: &str,
		kind: ActionItemKind,
		ref_id: &str,
		event_id: Option<&str>,
		block_hash: &str,
	) -> Self {
		Self {
			client_id: client_id.to_string(),
			blockchain_id: blockchain_id.to_string(),
			network_id: network_id.to_string(),
			kind,
			ref_id: normalize_string(ref_id),
			event_id: event_id.map(normalize_string),
			block_hash: normalize_string(block_hash),
		}
	}
}

impl fmt::Display for ActionItemKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}:{}:{}:{}:{}:{}:{}",
			self.client_id,
			self.blockchain_id,
			self.network_id,
			self.kind,
			self.ref_id,
			self.event_id.as_deref().unwrap_or("-"),
			self.block_hash
		)
	}
}

/// A scanner's raw match, before it is tracked
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch {
	pub subscription: String,
	pub client_id: String,
	pub project_id: Option<String>,
	pub blockchain_id: String,
	pub network_id: String,
	pub block_hash: String,
	pub block_height: u64,
	pub block_time: u64,
	pub min_confirmations: u64,
	pub kind: ActionItemKind,
	pub ref_id: String,
	pub event_id: Option<String>,
	pub tx_hash: Option<String>,
	pub address: Option<String>,
	pub params: Map<String, Value>,
}

/// A tracked match. Serialized as-is into the webhook payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
	pub client_id: String,
	#[serde(default)]
	pub project_id: Option<String>,
	pub blockchain_id: String,
	pub network_id: String,
	pub block_hash: String,
	pub block_height: u64,
	pub block_time: u64,
	pub min_confirmations: u64,
	pub confirmations: u64,
	#[serde(rename = "type")]
	pub kind: ActionItemKind,
	pub ref_id: String,
	#[serde(default)]
	pub event_id: Option<String>,
	#[serde(default)]
	pub tx_hash: Option<String>,
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default)]
	pub params: Map<String, Value>,
	pub subscription: String,
	#[serde(default)]
	pub status: ActionItemStatus,
	#[serde(default)]
	pub delivery_attempts: u32,
	/// Epoch milliseconds before which no further delivery is attempted
	#[serde(default)]
	pub next_delivery_at: Option<i64>,
	/// Epoch milliseconds
	pub created_at: i64,
	#[serde(default)]
	pub fired_at: Option<i64>,
}

/// `max(0, head - height + 1)`
pub fn confirmations_at(block_height: u64, head: u64) -> u64 {
	if head < block_height {
		0
	} else {
		head - block_height + 1
	}
}

impl ActionItem {
	/// New pending item for `candidate`, with confirmations computed against `head`
	pub fn from_candidate(candidate: CandidateMatch, head: u64, now_ms: i64) -> Self {
		Self {
			confirmations: confirmations_at(candidate.block_height, head),
			client_id: candidate.client_id,
			project_id: candidate.project_id,
			blockchain_id: candidate.blockchain_id,
			network_id: candidate.network_id,
			block_hash: candidate.block_hash,
			block_height: candidate.block_height,
			block_time: candidate.block_time,
			min_confirmations: candidate.min_confirmations,
			kind: candidate.kind,
			ref_id: candidate.ref_id,
			event_id: candidate.event_id,
			tx_hash: candidate.tx_hash,
			address: candidate.address,
			params: candidate.params,
			subscription: candidate.subscription,
			status: ActionItemStatus::Pending,
			delivery_attempts: 0,
			next_delivery_at: None,
			created_at: now_ms,
			fired_at: None,
		}
	}

	pub fn key(&self) -> ActionItemKey {
		ActionItemKey::new(
			&self.client_id,
			&self.blockchain_id,
			&self.network_id,
			self.kind,
			&self.ref_id,
			self.event_id.as_deref(),
			&self.block_hash,
		)
	}

	pub fn pair(&self) -> ChainPair {
		ChainPair::new(&self.blockchain_id, &self.network_id)
	}

	/// Whether enough confirmations have accumulated to fire
	pub fn is_confirmed(&self) -> bool {
		self.confirmations >= self.min_confirmations
	}

	/// Whether a fired item may be attempted at `now_ms`
	pub fn is_due(&self, now_ms: i64) -> bool {
		self.next_delivery_at.is_none_or(|at| at <= now_ms)
	}
}

impl CandidateMatch {
	pub fn key(&self) -> ActionItemKey {
		ActionItemKey::new(
			&self.client_id,
			&self.blockchain_id,
			&self.network_id,
			self.kind,
			&self.ref_id,
			self.event_id.as_deref(),
			&self.block_hash,
		)
	}
}
