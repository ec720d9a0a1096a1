//! Network transport implementations for chain data providers.
//!
//! - `HttpTransportClient`: JSON-RPC over HTTP with weighted endpoint failover

mod error;
mod http;

pub use error::TransportError;
pub use http::HttpTransportClient;

use async_trait::async_trait;
use reqwest_retry::{
	default_on_request_failure, default_on_request_success, Retryable, RetryableStrategy,
};
use serde_json::{json, Value};

/// Non-5xx statuses after which the next endpoint is tried. Server errors always rotate.
pub const ROTATE_ON_ERROR_CODES: [u16; 2] = [408, 429];

/// Request/response channel to a node
#[async_trait]
pub trait BlockchainTransport: Send + Sync {
	/// Get the current URL being used by the transport
	async fn get_current_url(&self) -> String;

	/// Sends a JSON-RPC request and returns its `result` (which may be `null`)
	async fn send_raw_request(&self, method: &str, params: Value) -> Result<Value, TransportError>;
}

/// Builds a JSON-RPC 2.0 request body
pub fn rpc_request(id: u64, method: &str, params: Value) -> Value {
	json!({
		"jsonrpc": "2.0",
		"id": id,
		"method": method,
		"params": params,
	})
}

/// Retries connection failures, timeouts, 429 and 5xx responses within one request
pub struct TransientErrorRetryStrategy;

impl RetryableStrategy for TransientErrorRetryStrategy {
	fn handle(
		&self,
		res: &Result<reqwest::Response, reqwest_middleware::Error>,
	) -> Option<Retryable> {
		match res {
			Ok(success) => default_on_request_success(success),
			Err(error) => default_on_request_failure(error),
		}
	}
}
