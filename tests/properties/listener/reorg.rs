use crate::properties::strategies::committed_cursor;

use blockchain_listener::{
	models::{ChainCursor, Network},
	services::{
		listener::{
			compare_with_chain, ChainComparison, ChainPoller, CursorStore, CycleOutcome,
			InMemoryCursorStore, ListenerError,
		},
		notification::{NotificationClientPool, WebhookDispatcher},
		tracker::{ConfirmationTracker, InMemoryActionItemStore},
	},
	utils::tests::{
		builders::{block::block_hash, network::NetworkBuilder},
		TestChain,
	},
};
use proptest::{prelude::*, test_runner::Config};
use std::{collections::HashMap, sync::Arc};
use tokio::runtime::Runtime;

const TIP: u64 = 200;

/// Chain `0..=TIP` with the top `depth` blocks replaced by a competing fork, and a cursor that
/// committed the original fork keeping `max_reorg_depth + 1` hashes
fn forked_chain(depth: u64, max_reorg_depth: u64) -> (TestChain, ChainCursor) {
	let test_chain = TestChain::with_tip(TIP);
	if depth > 0 {
		test_chain.reorg(TIP - depth + 1, TIP, 1);
	}
	let cursor = committed_cursor(0, TIP, max_reorg_depth as usize + 1);
	(test_chain, cursor)
}

/// Poller over `test_chain` with in-memory stores and no subscriptions
fn listening_poller(
	network: Network,
	test_chain: Arc<TestChain>,
) -> (ChainPoller<InMemoryActionItemStore>, Arc<InMemoryCursorStore>) {
	let cursors = Arc::new(InMemoryCursorStore::new());
	let store = Arc::new(InMemoryActionItemStore::new());
	let poller = ChainPoller::new(
		network,
		test_chain,
		cursors.clone(),
		ConfirmationTracker::new(store.clone()),
		WebhookDispatcher::new(store, HashMap::new(), Arc::new(NotificationClientPool::new())),
		vec![],
	)
	.unwrap();
	(poller, cursors)
}

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		cases: 64,
		..Config::default()
	})]

	#[test]
	fn test_fork_point_is_found_within_max_depth(
		max_reorg_depth in 1u64..64,
		depth_seed in any::<u64>(),
	) {
		let depth = depth_seed % (max_reorg_depth + 1);
		let (test_chain, cursor) = forked_chain(depth, max_reorg_depth);

		let comparison = Runtime::new()
			.unwrap()
			.block_on(compare_with_chain(&test_chain, &cursor, TIP, max_reorg_depth))
			.unwrap();

		if depth == 0 {
			prop_assert_eq!(comparison, ChainComparison::Consistent);
		} else {
			prop_assert_eq!(
				comparison,
				ChainComparison::Diverged { common_height: TIP - depth }
			);
		}
	}

	#[test]
	fn test_fork_deeper_than_max_depth_is_rejected(
		max_reorg_depth in 1u64..64,
		extra in 1u64..32,
	) {
		let (test_chain, cursor) = forked_chain(max_reorg_depth + extra, max_reorg_depth);

		let result = Runtime::new()
			.unwrap()
			.block_on(compare_with_chain(&test_chain, &cursor, TIP, max_reorg_depth));

		prop_assert!(matches!(result, Err(ListenerError::ReorgTooDeep(_))));
	}

	#[test]
	fn test_poller_recovers_from_forks_within_max_depth(
		committed in 1u64..=40,
		max_reorg_depth in 1u64..=40,
		depth_seed in any::<u64>(),
	) {
		let depth = 1 + depth_seed % max_reorg_depth;
		let test_chain = Arc::new(TestChain::with_tip(TIP));
		let network = NetworkBuilder::new()
			.start_height(TIP - committed + 1)
			.max_batch_size(100)
			.max_reorg_depth(max_reorg_depth)
			.build();
		let (poller, cursors) = listening_poller(network, test_chain.clone());
		let pair = poller.pair().clone();

		let (outcome, cursor) = Runtime::new().unwrap().block_on(async {
			poller.run_cycle().await.unwrap();
			test_chain.reorg(TIP - depth + 1, TIP + 1, 1);
			let outcome = poller.execute().await;
			(outcome, cursors.get(&pair).await.unwrap().unwrap())
		});

		let report = match outcome {
			Ok(CycleOutcome::Completed(report)) => report,
			other => {
				return Err(TestCaseError::fail(format!(
					"cycle did not complete: {:?}",
					other
				)))
			}
		};
		prop_assert!(!poller.is_halted());

		// The parent of the first committed block is remembered too
		let oldest_retained = (TIP - committed).max(TIP - max_reorg_depth);
		let expected_rollback = if TIP - depth >= oldest_retained {
			TIP - depth
		} else {
			oldest_retained - 1
		};
		let reorg = report.reorg.unwrap();
		prop_assert_eq!(reorg.detected_at, TIP);
		prop_assert_eq!(reorg.common_height, expected_rollback);

		prop_assert_eq!(cursor.last_height, TIP + 1);
		prop_assert_eq!(&cursor.last_hash, &block_hash(TIP + 1, 1));
		for (height, hash) in &cursor.recent_hashes {
			let served = test_chain.block(*height).map(|block| block.hash);
			prop_assert_eq!(served.as_deref(), Some(hash.as_str()));
		}
	}
}
