//! End-to-end listener scenarios over file-backed stores.
//!
//! Each test builds pollers the way the binary does (file stores in a data directory) and
//! rebuilds them from the same directory to simulate a restart.

use mockito::Matcher;
use serde_json::json;
use std::{path::Path, sync::Arc, time::Duration};
use tempfile::TempDir;

use crate::integration::mocks::{create_test_poller, WATCHED_ADDRESS};
use blockchain_listener::{
	models::{ActionItem, ActionItemStatus, Block, ChainPair, Client, Network, Subscription},
	services::{
		listener::{ChainPoller, CursorStore, FileCursorStore},
		tracker::{ActionItemStore, FileActionItemStore},
	},
	utils::{
		tests::{
			builders::{
				block::{block_hash, BlockBuilder},
				client::ClientBuilder,
				network::NetworkBuilder,
				subscription::SubscriptionBuilder,
			},
			TestChain,
		},
		RetryConfig,
	},
};

fn mainnet() -> ChainPair {
	ChainPair::new("ethereum", "mainnet")
}

/// Poller backed by fresh file stores rooted at `dir`
fn poller_at(
	dir: &Path,
	network: Network,
	test_chain: Arc<TestChain>,
	clients: Vec<Client>,
	subscriptions: Vec<Subscription>,
) -> ChainPoller<FileActionItemStore> {
	create_test_poller(
		network,
		test_chain,
		Arc::new(FileCursorStore::new(dir.to_path_buf())),
		Arc::new(FileActionItemStore::new(dir.to_path_buf())),
		clients,
		subscriptions,
	)
}

fn transfer_block(height: u64, fork: u8) -> Block {
	BlockBuilder::new()
		.height(height)
		.fork(fork)
		.parent_hash(&block_hash(height - 1, 0))
		.transaction(&format!("0xt{}", height), Some(WATCHED_ADDRESS), None)
		.build()
}

fn watching(min_confirmations: u64) -> Subscription {
	SubscriptionBuilder::new()
		.address(WATCHED_ADDRESS)
		.min_confirmations(min_confirmations)
		.build()
}

fn no_transport_retries() -> RetryConfig {
	RetryConfig {
		max_retries: 0,
		..RetryConfig::default()
	}
}

#[tokio::test]
async fn test_restart_resumes_from_persisted_cursor() {
	let dir = TempDir::new().unwrap();
	let test_chain = Arc::new(TestChain::with_tip(30));
	let network = NetworkBuilder::new()
		.start_height(10)
		.max_batch_size(5)
		.build();

	let first = poller_at(dir.path(), network.clone(), test_chain.clone(), vec![], vec![]);
	let report = first.run_cycle().await.unwrap();
	assert_eq!((report.scanned_from, report.scanned_to), (Some(10), Some(14)));
	drop(first);

	let restarted = poller_at(dir.path(), network, test_chain.clone(), vec![], vec![]);
	let report = restarted.run_cycle().await.unwrap();
	assert_eq!((report.scanned_from, report.scanned_to), (Some(15), Some(19)));

	let cursor = FileCursorStore::new(dir.path().to_path_buf())
		.get(&mainnet())
		.await
		.unwrap()
		.unwrap();
	assert_eq!(cursor.last_height, 19);
	assert_eq!(cursor.last_hash, block_hash(19, 0));
}

#[tokio::test]
async fn test_confirmed_match_is_delivered_once_across_restarts() {
	let dir = TempDir::new().unwrap();
	let mut server = mockito::Server::new_async().await;
	let mock = server
		.mock("POST", "/")
		.match_header("content-type", "application/json")
		.match_header("x-signature", Matcher::Regex("^[0-9a-f]{64}$".to_string()))
		.match_header("x-timestamp", Matcher::Regex("^[0-9]+$".to_string()))
		.match_body(Matcher::PartialJson(json!({
			"type": "address",
			"block_height": 10,
			"block_hash": block_hash(10, 0),
			"status": "fired",
			"client_id": "acme",
			"subscription": "treasury",
		})))
		.with_status(200)
		.expect(1)
		.create_async()
		.await;

	let test_chain = Arc::new(TestChain::with_tip(9));
	test_chain.insert(transfer_block(10, 0));
	test_chain.extend_to(11, 0);

	let network = NetworkBuilder::new().start_height(10).build();
	let client = ClientBuilder::new()
		.url(&server.url())
		.retry_policy(no_transport_retries())
		.build();

	// Two confirmations: tracked, not fired
	let first = poller_at(
		dir.path(),
		network.clone(),
		test_chain.clone(),
		vec![client.clone()],
		vec![watching(3)],
	);
	let report = first.run_cycle().await.unwrap();
	assert_eq!(report.matches_found, 1);
	assert_eq!(report.fired, 0);
	drop(first);

	test_chain.extend_to(12, 0);
	let second = poller_at(
		dir.path(),
		network.clone(),
		test_chain.clone(),
		vec![client.clone()],
		vec![watching(3)],
	);
	let report = second.run_cycle().await.unwrap();
	assert_eq!(report.matches_found, 0);
	assert_eq!(report.fired, 1);
	assert_eq!(report.delivered, 1);
	drop(second);

	test_chain.extend_to(14, 0);
	let third = poller_at(
		dir.path(),
		network,
		test_chain.clone(),
		vec![client],
		vec![watching(3)],
	);
	let report = third.run_cycle().await.unwrap();
	assert_eq!(report.fired, 0);
	assert_eq!(report.delivered, 0);

	mock.assert_async().await;

	let items = FileActionItemStore::new(dir.path().to_path_buf())
		.list(&mainnet())
		.await
		.unwrap();
	assert_eq!(items.len(), 1);
	assert_eq!(items[0].status, ActionItemStatus::Delivered);
	assert_eq!(items[0].delivery_attempts, 1);
	assert!(items[0].fired_at.is_some());
}

#[tokio::test]
async fn test_reorg_replaces_unconfirmed_match() {
	let dir = TempDir::new().unwrap();
	let mut server = mockito::Server::new_async().await;
	let mock = server
		.mock("POST", "/")
		.match_body(Matcher::PartialJson(json!({
			"block_height": 10,
			"block_hash": block_hash(10, 1),
			"tx_hash": "0xt10",
		})))
		.with_status(200)
		.expect(1)
		.create_async()
		.await;

	let test_chain = Arc::new(TestChain::with_tip(9));
	test_chain.insert(transfer_block(10, 0));
	test_chain.extend_to(12, 0);

	let poller = poller_at(
		dir.path(),
		NetworkBuilder::new().start_height(8).build(),
		test_chain.clone(),
		vec![ClientBuilder::new()
			.url(&server.url())
			.retry_policy(no_transport_retries())
			.build()],
		vec![watching(5)],
	);

	let report = poller.run_cycle().await.unwrap();
	assert_eq!(report.matches_found, 1);
	assert_eq!(report.fired, 0);

	// The transfer is re-included in the competing block 10
	test_chain.reorg(10, 12, 1);
	test_chain.insert(transfer_block(10, 1));

	let report = poller.run_cycle().await.unwrap();
	let reorg = report.reorg.unwrap();
	assert_eq!(reorg.common_height, 9);
	assert_eq!(reorg.discarded, 1);
	assert_eq!(report.scanned_from, Some(10));
	assert_eq!(report.matches_found, 1);
	assert_eq!(report.fired, 0);

	test_chain.extend_to(14, 1);
	let report = poller.run_cycle().await.unwrap();
	assert!(report.reorg.is_none());
	assert_eq!(report.fired, 1);
	assert_eq!(report.delivered, 1);
	mock.assert_async().await;

	let items = poller_items(dir.path()).await;
	assert_eq!(items.len(), 2);
	let discarded = items
		.iter()
		.find(|item| item.block_hash == block_hash(10, 0))
		.unwrap();
	assert_eq!(discarded.status, ActionItemStatus::Discarded);
	assert_eq!(discarded.fired_at, None);
	let delivered = items
		.iter()
		.find(|item| item.block_hash == block_hash(10, 1))
		.unwrap();
	assert_eq!(delivered.status, ActionItemStatus::Delivered);
}

#[tokio::test]
async fn test_failed_delivery_is_retried_by_a_later_cycle() {
	let dir = TempDir::new().unwrap();
	let mut server = mockito::Server::new_async().await;
	let failing = server
		.mock("POST", "/")
		.with_status(503)
		.expect(1)
		.create_async()
		.await;

	let test_chain = Arc::new(TestChain::with_tip(9));
	test_chain.insert(transfer_block(10, 0));

	let client = ClientBuilder::new()
		.url(&server.url())
		.retry_policy(no_transport_retries())
		.max_attempts(3)
		.backoff_ms(1, 5)
		.build();
	let poller = poller_at(
		dir.path(),
		NetworkBuilder::new().start_height(10).build(),
		test_chain.clone(),
		vec![client],
		vec![watching(1)],
	);

	let report = poller.run_cycle().await.unwrap();
	assert_eq!(report.fired, 1);
	assert_eq!(report.retrying, 1);
	failing.assert_async().await;
	failing.remove_async().await;

	let items = poller_items(dir.path()).await;
	assert_eq!(items[0].status, ActionItemStatus::Fired);
	assert_eq!(items[0].delivery_attempts, 1);
	assert!(items[0].next_delivery_at.is_some());

	let succeeding = server
		.mock("POST", "/")
		.with_status(200)
		.expect(1)
		.create_async()
		.await;
	tokio::time::sleep(Duration::from_millis(20)).await;

	// Nothing new to scan; the pending delivery alone is retried
	let report = poller.run_cycle().await.unwrap();
	assert_eq!(report.blocks_scanned, 0);
	assert_eq!(report.fired, 0);
	assert_eq!(report.delivered, 1);
	succeeding.assert_async().await;

	let items = poller_items(dir.path()).await;
	assert_eq!(items[0].status, ActionItemStatus::Delivered);
	assert_eq!(items[0].delivery_attempts, 2);
}

#[tokio::test]
async fn test_delivery_gives_up_after_max_attempts() {
	let dir = TempDir::new().unwrap();
	let mut server = mockito::Server::new_async().await;
	let mock = server
		.mock("POST", "/")
		.with_status(400)
		.expect(2)
		.create_async()
		.await;

	let test_chain = Arc::new(TestChain::with_tip(9));
	test_chain.insert(transfer_block(10, 0));

	let poller = poller_at(
		dir.path(),
		NetworkBuilder::new().start_height(10).build(),
		test_chain.clone(),
		vec![ClientBuilder::new()
			.url(&server.url())
			.max_attempts(2)
			.backoff_ms(1, 1)
			.build()],
		vec![watching(1)],
	);

	let report = poller.run_cycle().await.unwrap();
	assert_eq!(report.retrying, 1);
	tokio::time::sleep(Duration::from_millis(10)).await;

	let report = poller.run_cycle().await.unwrap();
	assert_eq!(report.exhausted, 1);
	tokio::time::sleep(Duration::from_millis(10)).await;

	// Exhausted items are not offered again
	let report = poller.run_cycle().await.unwrap();
	assert_eq!(report.exhausted, 0);
	assert_eq!(report.retrying, 0);
	mock.assert_async().await;

	let items = poller_items(dir.path()).await;
	assert_eq!(items[0].status, ActionItemStatus::Exhausted);
	assert_eq!(items[0].delivery_attempts, 2);
}

async fn poller_items(dir: &Path) -> Vec<ActionItem> {
	FileActionItemStore::new(dir.to_path_buf())
		.list(&mainnet())
		.await
		.unwrap()
}
