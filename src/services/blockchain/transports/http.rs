//! HTTP transport implementation for JSON-RPC providers.
//!
//! Endpoints are tried in descending weight order. Network errors, rate limiting and server
//! errors move the failing endpoint to the back of the list and retry on the next one, so
//! one request visits every endpoint at most once.

use anyhow::Context;
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
	time::Duration,
};
use tokio::sync::RwLock;
use url::Url;

use crate::{
	models::Network,
	services::blockchain::transports::{
		rpc_request, BlockchainTransport, TransientErrorRetryStrategy, TransportError,
	},
	utils::http::create_retryable_http_client,
};

/// JSON-RPC client over HTTP with endpoint failover
#[derive(Clone, Debug)]
pub struct HttpTransportClient {
	/// Retryable HTTP client for making requests
	client: ClientWithMiddleware,
	/// Endpoints in preference order; the first one is active
	endpoints: Arc<RwLock<Vec<String>>>,
	request_id: Arc<AtomicU64>,
}

impl HttpTransportClient {
	/// Creates a client for the network's `rpc` endpoints with a non-zero weight.
	///
	/// RPC URLs must already have their secrets resolved.
	pub fn new(network: &Network) -> Result<Self, anyhow::Error> {
		let mut rpc_urls: Vec<_> = network
			.rpc_urls
			.iter()
			.filter(|rpc_url| rpc_url.type_ == "rpc" && rpc_url.weight > 0)
			.collect();
		rpc_urls.sort_by(|a, b| b.weight.cmp(&a.weight));

		let endpoints: Vec<String> = rpc_urls
			.iter()
			.filter_map(|rpc_url| match Url::parse(rpc_url.url.as_str()) {
				Ok(_) => Some(rpc_url.url.as_str().trim_end_matches('/').to_string()),
				Err(e) => {
					tracing::warn!("Skipping invalid RPC URL for {}: {}", network.pair(), e);
					None
				}
			})
			.collect();
		if endpoints.is_empty() {
			anyhow::bail!("No usable RPC URLs configured for {}", network.pair());
		}

		let base_http_client = reqwest::ClientBuilder::new()
			.pool_idle_timeout(Duration::from_secs(90))
			.pool_max_idle_per_host(32)
			.timeout(Duration::from_secs(30))
			.connect_timeout(Duration::from_secs(20))
			.build()
			.context("Failed to create base HTTP client")?;

		let client = create_retryable_http_client(
			&network.retry_policy,
			base_http_client,
			Some(TransientErrorRetryStrategy),
		);

		Ok(Self::new_with_client(client, endpoints))
	}

	pub fn new_with_client(client: ClientWithMiddleware, endpoints: Vec<String>) -> Self {
		Self {
			client,
			endpoints: Arc::new(RwLock::new(endpoints)),
			request_id: Arc::new(AtomicU64::new(1)),
		}
	}

	/// Moves `failed` to the back of the endpoint list if it is still active
	async fn rotate_from(&self, failed: &str) {
		let mut endpoints = self.endpoints.write().await;
		if endpoints.len() > 1 && endpoints.first().is_some_and(|url| url == failed) {
			endpoints.rotate_left(1);
			tracing::debug!(
				"Rotated RPC endpoint from '{}' to '{}'",
				failed,
				endpoints[0]
			);
		}
	}

	async fn request_on_url(
		&self,
		url: &str,
		method: &str,
		params: &Value,
	) -> Result<Value, TransportError> {
		let id = self.request_id.fetch_add(1, Ordering::Relaxed);
		let metadata = Some(HashMap::from([
			("url".to_string(), url.to_string()),
			("method".to_string(), method.to_string()),
		]));

		let response = self
			.client
			.post(url)
			.json(&rpc_request(id, method, params.clone()))
			.send()
			.await
			.map_err(|e| {
				TransportError::network(
					format!("Request to {} failed", url),
					Some(Box::new(e)),
					metadata.clone(),
				)
			})?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(TransportError::http(
				status,
				url.to_string(),
				body,
				None,
				metadata,
			));
		}

		let mut envelope: Value = response.json().await.map_err(|e| {
			TransportError::response_parse(
				"Failed to parse JSON response",
				Some(Box::new(e)),
				metadata.clone(),
			)
		})?;

		if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
			let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
			let message = error
				.get("message")
				.and_then(Value::as_str)
				.unwrap_or("unknown error")
				.to_string();
			return Err(TransportError::rpc(code, message, metadata));
		}

		match envelope.get_mut("result") {
			Some(result) => Ok(result.take()),
			None => Err(TransportError::response_parse(
				"Missing 'result' field",
				None,
				metadata,
			)),
		}
	}
}

#[async_trait]
impl BlockchainTransport for HttpTransportClient {
	async fn get_current_url(&self) -> String {
		self.endpoints
			.read()
			.await
			.first()
			.cloned()
			.unwrap_or_default()
	}

	async fn send_raw_request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
		let attempts = self.endpoints.read().await.len();
		let mut last_error = None;

		for _ in 0..attempts {
			let url = self.get_current_url().await;
			match self.request_on_url(&url, method, &params).await {
				Ok(result) => return Ok(result),
				Err(e) if e.should_rotate() => {
					tracing::warn!("RPC request to {} failed, trying next endpoint: {}", url, e);
					self.rotate_from(&url).await;
					last_error = Some(e);
				}
				Err(e) => return Err(e),
			}
		}

		Err(TransportError::endpoints_exhausted(
			format!("'{}' failed on {} endpoint(s)", method, attempts),
			last_error.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
			None,
		))
	}
}
