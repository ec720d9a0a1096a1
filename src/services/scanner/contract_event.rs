use serde_json::{Map, Value};

use crate::{
	models::{ActionItemKind, Block, BlockLog, CandidateMatch, Subscription, WatchCriteria},
	services::scanner::{candidate, relevant, MatchDetails, Scanner},
	utils::hex_eq,
};

/// Matches logs emitted by a watched contract, optionally restricted to one event signature.
///
/// Produces at most one candidate per subscription and block.
pub struct ContractEventScanner;

fn log_matches(log: &BlockLog, address: &str, event_id: Option<&str>) -> bool {
	if !hex_eq(&log.address, address) {
		return false;
	}
	match event_id {
		Some(expected) => log.event_id().is_some_and(|topic| hex_eq(topic, expected)),
		None => true,
	}
}

impl Scanner for ContractEventScanner {
	fn kind(&self) -> ActionItemKind {
		ActionItemKind::ContractEvent
	}

	fn scan(&self, block: &Block, criteria: &[Subscription]) -> Vec<CandidateMatch> {
		let mut matches = Vec::new();

		for subscription in relevant(criteria, self.kind()) {
			let WatchCriteria::ContractEvent { address, event_id } = &subscription.watch else {
				continue;
			};

			let logs: Vec<&BlockLog> = block
				.logs
				.iter()
				.filter(|log| log_matches(log, address, event_id.as_deref()))
				.collect();
			let Some(first) = logs.first() else {
				continue;
			};

			let mut extra = Map::new();
			extra.insert(
				"matched_logs".to_string(),
				serde_json::to_value(&logs).unwrap_or(Value::Array(vec![])),
			);

			matches.push(candidate(
				subscription,
				block,
				self.kind(),
				MatchDetails {
					ref_id: address.clone(),
					event_id: event_id.clone(),
					tx_hash: first.transaction_hash.clone(),
					address: Some(address.clone()),
					extra,
				},
			));
		}

		matches
	}
}
