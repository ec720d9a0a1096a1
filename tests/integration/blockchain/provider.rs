use mockito::{Matcher, Server};
use serde_json::json;

use crate::integration::mocks::create_test_network;
use blockchain_listener::{
	models::Network,
	services::blockchain::{ChainDataProvider, EvmRpcProvider},
	utils::{tests::builders::network::NetworkBuilder, RetryConfig},
};

fn no_retries() -> RetryConfig {
	RetryConfig {
		max_retries: 0,
		..RetryConfig::default()
	}
}

fn single_endpoint(url: &str) -> Network {
	NetworkBuilder::new()
		.clear_rpc_urls()
		.add_rpc_url(url, "rpc", 100)
		.retry_policy(no_retries())
		.build()
}

fn rpc_result(result: serde_json::Value) -> String {
	json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string()
}

#[tokio::test]
async fn test_head_height() {
	let mut server = Server::new_async().await;
	let mock = server
		.mock("POST", "/")
		.match_body(Matcher::PartialJson(json!({ "method": "eth_blockNumber" })))
		.with_status(200)
		.with_body(rpc_result(json!("0x12d687")))
		.create_async()
		.await;

	let provider = EvmRpcProvider::new(&create_test_network(&server.url())).unwrap();
	assert_eq!(provider.get_head_height().await.unwrap(), 1_234_567);
	assert_eq!(provider.chain_id(), "ethereum");
	assert_eq!(provider.network_id(), "mainnet");
	mock.assert_async().await;
}

#[tokio::test]
async fn test_block_with_transactions_and_logs() {
	let mut server = Server::new_async().await;
	let block_mock = server
		.mock("POST", "/")
		.match_body(Matcher::PartialJson(json!({
			"method": "eth_getBlockByNumber",
			"params": ["0xa", true]
		})))
		.with_status(200)
		.with_body(rpc_result(json!({
			"number": "0xa",
			"hash": "0xb10c",
			"parentHash": "0xb109",
			"timestamp": "0x6553f100",
			"transactions": [{
				"hash": "0xt1",
				"from": "0x00000000000000000000000000000000000000aa",
				"to": null,
				"value": "0x0",
				"input": "0x60806040"
			}]
		})))
		.create_async()
		.await;
	let logs_mock = server
		.mock("POST", "/")
		.match_body(Matcher::PartialJson(json!({
			"method": "eth_getLogs",
			"params": [{ "blockHash": "0xb10c" }]
		})))
		.with_status(200)
		.with_body(rpc_result(json!([
			{
				"address": "0x00000000000000000000000000000000000000cc",
				"topics": ["0xddf252ad"],
				"data": "0x",
				"transactionHash": "0xt1",
				"logIndex": "0x0",
				"removed": false
			},
			{
				"address": "0x00000000000000000000000000000000000000cc",
				"topics": ["0xddf252ad"],
				"data": "0x",
				"transactionHash": "0xt0",
				"logIndex": "0x1",
				"removed": true
			}
		])))
		.create_async()
		.await;

	let provider = EvmRpcProvider::new(&single_endpoint(&server.url())).unwrap();
	let block = provider.get_block(10).await.unwrap().unwrap();

	assert_eq!(block.height, 10);
	assert_eq!(block.hash, "0xb10c");
	assert_eq!(block.parent_hash, "0xb109");
	assert_eq!(block.timestamp, 1_700_000_000);
	assert_eq!(block.transactions.len(), 1);
	assert_eq!(block.transactions[0].to, None);
	// Logs of the removed branch are dropped
	assert_eq!(block.logs.len(), 1);
	assert_eq!(block.logs[0].transaction_hash.as_deref(), Some("0xt1"));
	assert_eq!(block.logs[0].log_index, Some(0));

	block_mock.assert_async().await;
	logs_mock.assert_async().await;
}

#[tokio::test]
async fn test_unknown_block_is_none() {
	let mut server = Server::new_async().await;
	server
		.mock("POST", "/")
		.match_body(Matcher::PartialJson(json!({ "method": "eth_getBlockByNumber" })))
		.with_status(200)
		.with_body(rpc_result(json!(null)))
		.create_async()
		.await;
	let logs_mock = server
		.mock("POST", "/")
		.match_body(Matcher::PartialJson(json!({ "method": "eth_getLogs" })))
		.expect(0)
		.create_async()
		.await;

	let provider = EvmRpcProvider::new(&single_endpoint(&server.url())).unwrap();
	assert!(provider.get_block(99).await.unwrap().is_none());
	logs_mock.assert_async().await;
}

#[tokio::test]
async fn test_block_of_another_height_is_rejected() {
	let mut server = Server::new_async().await;
	server
		.mock("POST", "/")
		.with_status(200)
		.with_body(rpc_result(json!({
			"number": "0xb",
			"hash": "0xb11",
			"parentHash": "0xb10",
			"timestamp": "0x0"
		})))
		.create_async()
		.await;

	let provider = EvmRpcProvider::new(&single_endpoint(&server.url())).unwrap();
	let error = provider.get_block(10).await.unwrap_err();
	assert!(error.to_string().contains("Requested block 10"));
}

#[tokio::test]
async fn test_rpc_error_is_reported() {
	let mut server = Server::new_async().await;
	server
		.mock("POST", "/")
		.with_status(200)
		.with_body(
			json!({
				"jsonrpc": "2.0",
				"id": 1,
				"error": { "code": -32005, "message": "query returned more than 10000 results" }
			})
			.to_string(),
		)
		.create_async()
		.await;

	let provider = EvmRpcProvider::new(&single_endpoint(&server.url())).unwrap();
	assert!(provider.get_head_height().await.is_err());
}

#[tokio::test]
async fn test_rate_limited_endpoint_fails_over() {
	let mut primary = Server::new_async().await;
	let mut fallback = Server::new_async().await;

	let limited = primary
		.mock("POST", "/")
		.with_status(429)
		.expect(1)
		.create_async()
		.await;
	let served = fallback
		.mock("POST", "/")
		.match_body(Matcher::PartialJson(json!({ "method": "eth_blockNumber" })))
		.with_status(200)
		.with_body(rpc_result(json!("0x64")))
		.expect(2)
		.create_async()
		.await;

	let network = NetworkBuilder::new()
		.clear_rpc_urls()
		.add_rpc_url(&fallback.url(), "rpc", 50)
		.add_rpc_url(&primary.url(), "rpc", 100)
		.retry_policy(no_retries())
		.build();
	let provider = EvmRpcProvider::new(&network).unwrap();

	assert_eq!(provider.get_head_height().await.unwrap(), 100);
	// The fallback stays active for later requests
	assert_eq!(provider.get_head_height().await.unwrap(), 100);

	limited.assert_async().await;
	served.assert_async().await;
}

#[tokio::test]
async fn test_all_endpoints_failing() {
	let mut first = Server::new_async().await;
	let mut second = Server::new_async().await;
	let mut mocks = Vec::new();
	for server in [&mut first, &mut second] {
		mocks.push(
			server
				.mock("POST", "/")
				.with_status(503)
				.expect(1)
				.create_async()
				.await,
		);
	}

	let network = NetworkBuilder::new()
		.clear_rpc_urls()
		.add_rpc_url(&first.url(), "rpc", 100)
		.add_rpc_url(&second.url(), "rpc", 50)
		.retry_policy(no_retries())
		.build();
	let provider = EvmRpcProvider::new(&network).unwrap();

	assert!(provider.get_head_height().await.is_err());
	for mock in mocks {
		mock.assert_async().await;
	}
}
