//! Webhook notification implementation.
//!
//! Sends an action item as a JSON document to a client's webhook, optionally signed with
//! HMAC-SHA256 (`X-Signature` over the serialized payload followed by the `X-Timestamp`
//! value).

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{
	header::{HeaderMap, HeaderName, HeaderValue},
	Method,
};
use reqwest_middleware::ClientWithMiddleware;
use sha2::Sha256;
use std::{collections::HashMap, sync::Arc};

use crate::{
	models::{SecretString, WebhookConfig},
	services::notification::NotificationError,
};

/// HMAC SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Sends JSON payloads to one webhook destination
#[derive(Debug)]
pub struct WebhookNotifier {
	/// Webhook URL for payload delivery
	pub url: String,
	/// Configured HTTP client for webhook requests with retry capabilities
	pub client: Arc<ClientWithMiddleware>,
	pub method: Method,
	/// Key used to sign payloads
	pub secret: Option<SecretString>,
	/// Extra headers sent with every request
	pub headers: HashMap<String, String>,
}

impl WebhookNotifier {
	/// Creates a notifier from a client's (resolved) webhook configuration
	pub fn new(
		config: &WebhookConfig,
		http_client: Arc<ClientWithMiddleware>,
	) -> Result<Self, NotificationError> {
		let method = match &config.method {
			Some(m) => Method::from_bytes(m.to_uppercase().as_bytes()).map_err(|e| {
				NotificationError::config_error(
					format!("Invalid webhook method: {}", m),
					Some(e.into()),
					None,
				)
			})?,
			None => Method::POST,
		};

		Ok(Self {
			url: config.url.as_str().to_string(),
			client: http_client,
			method,
			secret: config
				.secret
				.as_ref()
				.map(|s| SecretString::new(s.as_str().to_string())),
			headers: config.headers.clone().unwrap_or_default(),
		})
	}

	/// Signs `payload` with `secret`, returning the hex signature and the millisecond
	/// timestamp that was signed along with it.
	pub fn sign_payload(
		&self,
		secret: &str,
		payload: &serde_json::Value,
	) -> Result<(String, String), NotificationError> {
		// `new_from_slice` accepts empty keys
		if secret.is_empty() {
			return Err(NotificationError::config_error(
				"Invalid secret: cannot be empty.",
				None,
				None,
			));
		}

		let timestamp = Utc::now().timestamp_millis();

		let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| {
			NotificationError::config_error(format!("Invalid secret: {}", e), None, None)
		})?;

		let serialized_payload = serde_json::to_string(payload).map_err(|e| {
			NotificationError::internal_error(
				format!("Failed to serialize payload: {}", e),
				Some(e.into()),
				None,
			)
		})?;
		mac.update(format!("{}{}", serialized_payload, timestamp).as_bytes());

		let signature = hex::encode(mac.finalize().into_bytes());

		Ok((signature, timestamp.to_string()))
	}

	fn build_headers(&self, payload: &serde_json::Value) -> Result<HeaderMap, NotificationError> {
		let mut headers = HeaderMap::new();
		headers.insert(
			HeaderName::from_static("content-type"),
			HeaderValue::from_static("application/json"),
		);

		if let Some(secret) = &self.secret {
			let (signature, timestamp) = self.sign_payload(secret.as_str(), payload)?;
			for (name, value) in [("x-signature", signature), ("x-timestamp", timestamp)] {
				let value = HeaderValue::from_str(&value).map_err(|e| {
					NotificationError::internal_error(
						format!("Invalid {} value", name),
						Some(e.into()),
						None,
					)
				})?;
				headers.insert(HeaderName::from_static(name), value);
			}
		}

		for (key, value) in &self.headers {
			let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
				NotificationError::config_error(
					format!("Invalid header name: {}", key),
					Some(e.into()),
					None,
				)
			})?;
			let header_value = HeaderValue::from_str(value).map_err(|e| {
				NotificationError::config_error(
					format!("Invalid header value for {}", key),
					Some(e.into()),
					None,
				)
			})?;
			headers.insert(header_name, header_value);
		}

		Ok(headers)
	}

	/// Sends a JSON payload to the webhook.
	///
	/// Any non-2xx response is a failure.
	pub async fn notify_json(&self, payload: &serde_json::Value) -> Result<(), NotificationError> {
		let headers = self.build_headers(payload)?;

		let response = self
			.client
			.request(self.method.clone(), self.url.as_str())
			.headers(headers)
			.json(payload)
			.send()
			.await
			.map_err(|e| {
				NotificationError::delivery_failed(
					format!("Failed to send webhook request: {}", e),
					Some(e.into()),
					None,
				)
			})?;

		let status = response.status();
		if !status.is_success() {
			return Err(NotificationError::delivery_failed(
				format!("Webhook request failed with status: {}", status),
				None,
				Some(HashMap::from([(
					"status".to_string(),
					status.as_u16().to_string(),
				)])),
			));
		}

		Ok(())
	}
}
