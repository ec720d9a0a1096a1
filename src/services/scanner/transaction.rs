use serde_json::{Map, Value};

use crate::{
	models::{ActionItemKind, Block, CandidateMatch, Subscription, WatchCriteria},
	services::scanner::{candidate, relevant, MatchDetails, Scanner},
	utils::hex_eq,
};

/// Matches block transactions by hash
pub struct TransactionScanner;

impl Scanner for TransactionScanner {
	fn kind(&self) -> ActionItemKind {
		ActionItemKind::Transaction
	}

	fn scan(&self, block: &Block, criteria: &[Subscription]) -> Vec<CandidateMatch> {
		let mut matches = Vec::new();

		for subscription in relevant(criteria, self.kind()) {
			let WatchCriteria::Transaction { hash } = &subscription.watch else {
				continue;
			};

			let Some(transaction) = block.transactions.iter().find(|tx| hex_eq(&tx.hash, hash))
			else {
				continue;
			};

			let mut extra = Map::new();
			if let Ok(value) = serde_json::to_value(transaction) {
				extra.insert("transaction".to_string(), value);
			}

			matches.push(candidate(
				subscription,
				block,
				self.kind(),
				MatchDetails {
					ref_id: transaction.hash.clone(),
					event_id: None,
					tx_hash: Some(transaction.hash.clone()),
					address: transaction.from.clone(),
					extra,
				},
			));
		}

		matches
	}
}
