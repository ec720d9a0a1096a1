use async_trait::async_trait;
use mockall::predicate;
use std::sync::Arc;

use crate::integration::mocks::{
	create_test_poller, mainnet_provider, MockActionItemStore, WATCHED_ADDRESS,
};
use blockchain_listener::{
	models::{ActionItemStatus, ChainCursor, ChainPair},
	services::{
		listener::{CursorStore, InMemoryCursorStore, ListenerError},
		tracker::{ActionItemStore, InMemoryActionItemStore, TrackerError},
	},
	utils::{
		metrics::{ADDRESS_FOUND, CONTRACTS_FOUND, TRANSACTIONS_FOUND},
		tests::{
			builders::{
				block::{chain, BlockBuilder},
				network::NetworkBuilder,
				subscription::SubscriptionBuilder,
			},
			TestChain,
		},
	},
};

fn mainnet() -> ChainPair {
	ChainPair::new("ethereum", "mainnet")
}

/// Cursor that committed fork-0 blocks `from..=to`
fn committed_cursor(from: u64, to: u64) -> ChainCursor {
	let blocks = chain(from, to, 0);
	let mut cursor = ChainCursor::at_block(&mainnet(), &blocks[0]);
	for block in &blocks[1..] {
		cursor = cursor.advanced(block, blocks.len());
	}
	cursor
}

async fn seeded_cursors(cursor: ChainCursor) -> Arc<InMemoryCursorStore> {
	let cursors = Arc::new(InMemoryCursorStore::new());
	cursors
		.compare_and_set(&mainnet(), None, cursor)
		.await
		.unwrap();
	cursors
}

#[tokio::test]
async fn test_first_cycle_fetches_only_the_head_block() {
	let mut provider = mainnet_provider();
	provider
		.expect_get_head_height()
		.times(1)
		.returning(|| Ok(100));
	provider
		.expect_get_block()
		.with(predicate::eq(100))
		.times(1)
		.returning(|height| Ok(Some(BlockBuilder::new().height(height).build())));

	let cursors = Arc::new(InMemoryCursorStore::new());
	let poller = create_test_poller(
		NetworkBuilder::new().build(),
		Arc::new(provider),
		cursors.clone(),
		Arc::new(InMemoryActionItemStore::new()),
		vec![],
		vec![],
	);

	let report = poller.run_cycle().await.unwrap();
	assert_eq!(report.head, 100);
	assert_eq!(report.blocks_scanned, 1);
	assert!(report.reorg.is_none());

	let cursor = cursors.get(&mainnet()).await.unwrap().unwrap();
	assert_eq!(cursor.last_height, 100);
}

#[tokio::test]
async fn test_consistent_tip_is_checked_once_before_scanning() {
	let mut provider = mainnet_provider();
	provider.expect_get_head_height().returning(|| Ok(52));
	for height in 50..=52 {
		provider
			.expect_get_block()
			.with(predicate::eq(height))
			.times(1)
			.returning(|height| Ok(Some(BlockBuilder::new().height(height).build())));
	}

	let cursors = seeded_cursors(committed_cursor(45, 50)).await;
	let poller = create_test_poller(
		NetworkBuilder::new().build(),
		Arc::new(provider),
		cursors.clone(),
		Arc::new(InMemoryActionItemStore::new()),
		vec![],
		vec![],
	);

	let report = poller.run_cycle().await.unwrap();
	assert_eq!(report.scanned_from, Some(51));
	assert_eq!(report.scanned_to, Some(52));
	assert_eq!(
		cursors.get(&mainnet()).await.unwrap().unwrap().last_height,
		52
	);
}

#[tokio::test]
async fn test_lagging_provider_is_compared_at_its_head() {
	let mut provider = mainnet_provider();
	provider.expect_get_head_height().returning(|| Ok(48));
	provider
		.expect_get_block()
		.with(predicate::eq(48))
		.times(1)
		.returning(|height| Ok(Some(BlockBuilder::new().height(height).build())));

	let cursors = seeded_cursors(committed_cursor(45, 50)).await;
	let poller = create_test_poller(
		NetworkBuilder::new().build(),
		Arc::new(provider),
		cursors.clone(),
		Arc::new(InMemoryActionItemStore::new()),
		vec![],
		vec![],
	);

	let report = poller.run_cycle().await.unwrap();
	assert_eq!(report.blocks_scanned, 0);
	assert!(report.reorg.is_none());
	assert_eq!(
		cursors.get(&mainnet()).await.unwrap().unwrap().last_height,
		50
	);
}

#[tokio::test]
async fn test_head_below_retained_history_waits_without_requests() {
	let mut provider = mainnet_provider();
	provider.expect_get_head_height().returning(|| Ok(40));
	provider.expect_get_block().never();

	let cursors = seeded_cursors(committed_cursor(50, 50)).await;
	let poller = create_test_poller(
		NetworkBuilder::new().build(),
		Arc::new(provider),
		cursors.clone(),
		Arc::new(InMemoryActionItemStore::new()),
		vec![],
		vec![],
	);

	let report = poller.run_cycle().await.unwrap();
	assert_eq!(report.head, 40);
	assert_eq!(report.blocks_scanned, 0);
	assert!(!poller.is_halted());
}

#[tokio::test]
async fn test_unreadable_block_during_reorg_walk() {
	let mut provider = mainnet_provider();
	provider.expect_get_head_height().returning(|| Ok(50));
	provider
		.expect_get_block()
		.with(predicate::eq(50))
		.returning(|height| Ok(Some(BlockBuilder::new().height(height).fork(1).build())));
	provider
		.expect_get_block()
		.with(predicate::eq(49))
		.returning(|_| Err(anyhow::anyhow!("connection reset")));

	let cursors = seeded_cursors(committed_cursor(45, 50)).await;
	let poller = create_test_poller(
		NetworkBuilder::new().build(),
		Arc::new(provider),
		cursors.clone(),
		Arc::new(InMemoryActionItemStore::new()),
		vec![],
		vec![],
	);

	let error = poller.run_cycle().await.unwrap_err();
	assert!(matches!(error, ListenerError::ProviderUnavailable(_)));
	assert!(error.is_retryable());
	assert!(!poller.is_halted());
	assert_eq!(
		cursors.get(&mainnet()).await.unwrap().unwrap().last_height,
		50
	);
}

#[tokio::test]
async fn test_storage_failure_keeps_block_uncommitted() {
	let mut store = MockActionItemStore::new();
	store
		.expect_upsert()
		.times(1)
		.returning(|_| Err(TrackerError::storage_error("disk full", None, None)));
	store.expect_list().never();

	let test_chain = TestChain::with_tip(9);
	test_chain.insert(
		BlockBuilder::new()
			.height(10)
			.transaction("0xt10", Some(WATCHED_ADDRESS), None)
			.build(),
	);

	let cursors = Arc::new(InMemoryCursorStore::new());
	let poller = create_test_poller(
		NetworkBuilder::new().start_height(10).build(),
		Arc::new(test_chain),
		cursors.clone(),
		Arc::new(store),
		vec![],
		vec![SubscriptionBuilder::new().address(WATCHED_ADDRESS).build()],
	);

	let error = poller.run_cycle().await.unwrap_err();
	assert!(matches!(error, ListenerError::StorageError(_)));
	assert!(cursors.get(&mainnet()).await.unwrap().is_none());
}

/// Matches of every kind counted for `pair`
fn counted_matches(pair: &ChainPair) -> u64 {
	[&*TRANSACTIONS_FOUND, &*ADDRESS_FOUND, &*CONTRACTS_FOUND]
		.iter()
		.map(|counter| counter.with_label_values(&pair.labels()).get())
		.sum()
}

#[tokio::test]
async fn test_matches_are_counted_once_the_block_commits() {
	// Own network label: metrics are process-wide
	let pair = ChainPair::new("ethereum", "match-counting");
	let test_chain = Arc::new(TestChain::new(pair.clone()));
	test_chain.insert(
		BlockBuilder::new()
			.height(10)
			.transaction("0xt10", Some(WATCHED_ADDRESS), None)
			.build(),
	);
	let network = NetworkBuilder::new()
		.network_id("match-counting")
		.start_height(10)
		.build();
	let subscriptions = vec![SubscriptionBuilder::new()
		.pair("ethereum", "match-counting")
		.address(WATCHED_ADDRESS)
		.build()];

	let mut failing = MockActionItemStore::new();
	failing
		.expect_upsert()
		.returning(|_| Err(TrackerError::storage_error("disk full", None, None)));
	let poller = create_test_poller(
		network.clone(),
		test_chain.clone(),
		Arc::new(InMemoryCursorStore::new()),
		Arc::new(failing),
		vec![],
		subscriptions.clone(),
	);
	assert!(poller.run_cycle().await.is_err());
	assert_eq!(counted_matches(&pair), 0);

	let poller = create_test_poller(
		network,
		test_chain,
		Arc::new(InMemoryCursorStore::new()),
		Arc::new(InMemoryActionItemStore::new()),
		vec![],
		subscriptions,
	);
	let report = poller.run_cycle().await.unwrap();
	assert!(report.matches_found > 0);
	assert_eq!(counted_matches(&pair), report.matches_found as u64);
}

/// Cursor store that always loses the race against another writer
struct ContendedCursorStore {
	inner: InMemoryCursorStore,
}

#[async_trait]
impl CursorStore for ContendedCursorStore {
	async fn get(&self, pair: &ChainPair) -> Result<Option<ChainCursor>, ListenerError> {
		self.inner.get(pair).await
	}

	async fn compare_and_set(
		&self,
		_pair: &ChainPair,
		_expected: Option<&ChainCursor>,
		_new: ChainCursor,
	) -> Result<(), ListenerError> {
		Err(ListenerError::cursor_conflict(
			"Stored cursor changed since it was read",
			None,
			None,
		))
	}
}

#[tokio::test]
async fn test_cursor_conflict_aborts_cycle_before_tracking() {
	let store = Arc::new(InMemoryActionItemStore::new());
	let test_chain = TestChain::with_tip(4);
	test_chain.insert(
		BlockBuilder::new()
			.height(5)
			.transaction("0xt5", None, Some(WATCHED_ADDRESS))
			.build(),
	);

	let poller = create_test_poller(
		NetworkBuilder::new().start_height(5).build(),
		Arc::new(test_chain),
		Arc::new(ContendedCursorStore {
			inner: InMemoryCursorStore::new(),
		}),
		store.clone(),
		vec![],
		vec![SubscriptionBuilder::new()
			.address(WATCHED_ADDRESS)
			.min_confirmations(0)
			.build()],
	);

	let error = poller.run_cycle().await.unwrap_err();
	assert!(matches!(error, ListenerError::CursorConflict(_)));
	assert!(error.is_retryable());

	// The match was stored before the commit failed; it stays pending until re-scanned
	let items = store.list(&mainnet()).await.unwrap();
	assert_eq!(items.len(), 1);
	assert_eq!(items[0].status, ActionItemStatus::Pending);
}
