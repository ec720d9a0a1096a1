//! Block scanners.
//!
//! A scanner turns one block plus the active subscriptions of its pair into candidate matches.
//! Scanners are pure: they neither read nor write state.
//!
//! - `TransactionScanner`: transactions by hash
//! - `AddressScanner`: activity of a watched address
//! - `ContractEventScanner`: logs of a watched contract

mod address;
mod contract_event;
mod transaction;

pub use address::AddressScanner;
pub use contract_event::ContractEventScanner;
pub use transaction::TransactionScanner;

use serde_json::{Map, Value};

use crate::models::{ActionItemKind, Block, CandidateMatch, Subscription};

/// Extracts candidate matches of one kind from a block.
///
/// `criteria` holds the subscriptions of the block's pair; scanners skip paused subscriptions
/// and subscriptions of other kinds.
pub trait Scanner: Send + Sync {
	/// Kind of action item this scanner produces
	fn kind(&self) -> ActionItemKind;

	/// Candidate matches in `block`
	fn scan(&self, block: &Block, criteria: &[Subscription]) -> Vec<CandidateMatch>;
}

/// One scanner per supported kind
pub fn default_scanners() -> Vec<Box<dyn Scanner>> {
	vec![
		Box::new(TransactionScanner),
		Box::new(AddressScanner),
		Box::new(ContractEventScanner),
	]
}

/// Subscriptions a scanner of `kind` should consider
fn relevant<'a>(
	criteria: &'a [Subscription],
	kind: ActionItemKind,
) -> impl Iterator<Item = &'a Subscription> {
	criteria
		.iter()
		.filter(move |s| !s.paused && s.watch.kind() == kind)
}

/// Fields of a match that depend on what was found
struct MatchDetails {
	ref_id: String,
	event_id: Option<String>,
	tx_hash: Option<String>,
	address: Option<String>,
	extra: Map<String, Value>,
}

/// Builds a candidate; subscription params are copied first so scanner data wins on conflict
fn candidate(
	subscription: &Subscription,
	block: &Block,
	kind: ActionItemKind,
	details: MatchDetails,
) -> CandidateMatch {
	let mut params = subscription.params.clone();
	params.extend(details.extra);

	CandidateMatch {
		subscription: subscription.name.clone(),
		client_id: subscription.client_id.clone(),
		project_id: subscription.project_id.clone(),
		blockchain_id: subscription.blockchain_id.clone(),
		network_id: subscription.network_id.clone(),
		block_hash: block.hash.clone(),
		block_height: block.height,
		block_time: block.timestamp,
		min_confirmations: subscription.min_confirmations,
		kind,
		ref_id: details.ref_id,
		event_id: details.event_id,
		tx_hash: details.tx_hash,
		address: details.address,
		params,
	}
}
