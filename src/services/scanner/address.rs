use serde_json::{Map, Value};

use crate::{
	models::{ActionItemKind, Block, CandidateMatch, Subscription, WatchCriteria},
	services::scanner::{candidate, relevant, MatchDetails, Scanner},
	utils::hex_eq,
};

/// Matches transactions sent from or to a watched address, and logs it emits.
///
/// Produces at most one candidate per subscription and block.
pub struct AddressScanner;

/// Hashes of the transactions in `block` involving `address`, in block order, without duplicates
fn matching_transactions(block: &Block, address: &str) -> Vec<String> {
	let is_watched = |value: &Option<String>| value.as_deref().is_some_and(|v| hex_eq(v, address));

	let from_transactions = block
		.transactions
		.iter()
		.filter(|tx| is_watched(&tx.from) || is_watched(&tx.to))
		.map(|tx| tx.hash.clone());
	let from_logs = block
		.logs
		.iter()
		.filter(|log| hex_eq(&log.address, address))
		.filter_map(|log| log.transaction_hash.clone());

	let mut hashes: Vec<String> = Vec::new();
	for hash in from_transactions.chain(from_logs) {
		if !hashes.iter().any(|h| hex_eq(h, &hash)) {
			hashes.push(hash);
		}
	}
	hashes
}

impl Scanner for AddressScanner {
	fn kind(&self) -> ActionItemKind {
		ActionItemKind::Address
	}

	fn scan(&self, block: &Block, criteria: &[Subscription]) -> Vec<CandidateMatch> {
		let mut matches = Vec::new();

		for subscription in relevant(criteria, self.kind()) {
			let WatchCriteria::Address { address } = &subscription.watch else {
				continue;
			};

			let emitted_log = block.logs.iter().any(|log| hex_eq(&log.address, address));
			let hashes = matching_transactions(block, address);
			if hashes.is_empty() && !emitted_log {
				continue;
			}

			let mut extra = Map::new();
			extra.insert(
				"matched_transactions".to_string(),
				Value::from(hashes.clone()),
			);

			matches.push(candidate(
				subscription,
				block,
				self.kind(),
				MatchDetails {
					ref_id: address.clone(),
					event_id: None,
					tx_hash: hashes.into_iter().next(),
					address: Some(address.clone()),
					extra,
				},
			));
		}

		matches
	}
}
