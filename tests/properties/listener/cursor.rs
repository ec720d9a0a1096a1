use crate::properties::strategies::committed_cursor;

use blockchain_listener::utils::tests::builders::block::block_hash;
use proptest::{prelude::*, test_runner::Config};

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		..Config::default()
	})]

	#[test]
	fn test_history_is_bounded_and_contiguous(
		from in 0u64..1_000,
		length in 1u64..200,
		history in 1usize..64,
	) {
		let to = from + length;
		let cursor = committed_cursor(from, to, history);

		prop_assert_eq!(cursor.last_height, to);
		prop_assert_eq!(&cursor.last_hash, &block_hash(to, 0));
		prop_assert!(cursor.recent_hashes.len() <= history);

		// The first block's parent counts as history
		let expected_oldest = to.saturating_sub(history as u64 - 1).max(from.saturating_sub(1));
		prop_assert_eq!(cursor.oldest_retained(), expected_oldest);
		for height in expected_oldest..=to {
			let expected_hash = block_hash(height, 0);
			prop_assert_eq!(cursor.hash_at(height), Some(expected_hash.as_str()));
		}
		if expected_oldest > 0 {
			prop_assert_eq!(cursor.hash_at(expected_oldest - 1), None);
		}
	}

	#[test]
	fn test_rollback_within_history(
		to in 100u64..1_000,
		history in 1usize..64,
		back in 0u64..80,
	) {
		let cursor = committed_cursor(0, to, history);
		let target = to.saturating_sub(back);

		match cursor.rolled_back_to(target) {
			Some(rolled_back) => {
				prop_assert!(target >= cursor.oldest_retained());
				prop_assert_eq!(rolled_back.last_height, target);
				prop_assert_eq!(&rolled_back.last_hash, &block_hash(target, 0));
				prop_assert!(rolled_back.recent_hashes.keys().all(|h| *h <= target));
				prop_assert_eq!(rolled_back.oldest_retained(), cursor.oldest_retained());
			}
			None => prop_assert!(target < cursor.oldest_retained()),
		}
	}
}
