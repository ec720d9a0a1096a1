//! Webhook delivery of fired action items.
//!
//! One call to [`WebhookDispatcher::deliver`] makes at most one delivery attempt. Failed
//! attempts are rescheduled with exponential backoff and picked up again by a later cycle once
//! due; after the client's `max_attempts` the item is exhausted.

use backon::{BackoffBuilder, ExponentialBuilder};
use chrono::Utc;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{debug, error, info, instrument, warn};

use crate::{
	models::{ActionItem, ActionItemStatus, Client, DeliveryPolicy},
	services::{
		notification::{NotificationClientPool, NotificationError, WebhookNotifier},
		tracker::{ActionItemStore, TrackerError},
	},
	utils::{logging::error::TraceableError, metrics},
};

/// Result of offering an item to its webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
	Delivered,
	/// Failed or not yet due; another attempt will be made
	Retrying,
	Exhausted,
}

impl DeliveryOutcome {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Delivered => "delivered",
			Self::Retrying => "retrying",
			Self::Exhausted => "exhausted",
		}
	}
}

/// Delay before the next attempt once `attempts` attempts have failed
pub fn backoff_delay(policy: &DeliveryPolicy, attempts: u32) -> Duration {
	let attempts = attempts.max(1) as usize;
	ExponentialBuilder::default()
		.with_min_delay(policy.initial_backoff())
		.with_max_delay(policy.max_backoff())
		.with_factor(2.0)
		.with_max_times(attempts)
		.build()
		.nth(attempts - 1)
		.unwrap_or_else(|| policy.max_backoff())
}

/// Epoch milliseconds `delay` after `now_ms`, saturating at `i64::MAX`
fn retry_at(now_ms: i64, delay: Duration) -> i64 {
	now_ms.saturating_add(i64::try_from(delay.as_millis()).unwrap_or(i64::MAX))
}

/// Delivers fired action items to their clients' webhooks
pub struct WebhookDispatcher<S: ActionItemStore> {
	store: Arc<S>,
	clients: HashMap<String, Client>,
	pool: Arc<NotificationClientPool>,
}

impl<S: ActionItemStore> Clone for WebhookDispatcher<S> {
	fn clone(&self) -> Self {
		Self {
			store: self.store.clone(),
			clients: self.clients.clone(),
			pool: self.pool.clone(),
		}
	}
}

impl<S: ActionItemStore> WebhookDispatcher<S> {
	/// `clients` are keyed by client id and must have their secrets resolved
	pub fn new(
		store: Arc<S>,
		clients: HashMap<String, Client>,
		pool: Arc<NotificationClientPool>,
	) -> Self {
		Self {
			store,
			clients,
			pool,
		}
	}

	pub async fn deliver(&self, item: &ActionItem) -> Result<DeliveryOutcome, NotificationError> {
		self.deliver_at(item, Utc::now().timestamp_millis()).await
	}

	/// Delivers `item` as if the current time were `now_ms` (epoch milliseconds)
	#[instrument(skip_all, fields(key = %item.key()))]
	pub async fn deliver_at(
		&self,
		item: &ActionItem,
		now_ms: i64,
	) -> Result<DeliveryOutcome, NotificationError> {
		match item.status {
			ActionItemStatus::Fired => {}
			ActionItemStatus::Delivered => return Ok(DeliveryOutcome::Delivered),
			ActionItemStatus::Exhausted => return Ok(DeliveryOutcome::Exhausted),
			status => {
				return Err(NotificationError::internal_error(
					format!("Action item is {:?}, only fired items are delivered", status),
					None,
					Some(HashMap::from([("key".to_string(), item.key().to_string())])),
				))
			}
		}

		if !item.is_due(now_ms) {
			debug!("Delivery not due before {:?}", item.next_delivery_at);
			return Ok(DeliveryOutcome::Retrying);
		}

		let mut metadata = HashMap::from([
			("key".to_string(), item.key().to_string()),
			("client_id".to_string(), item.client_id.clone()),
		]);

		let Some(client) = self.clients.get(&item.client_id) else {
			let error = NotificationError::delivery_exhausted(
				format!("Unknown client '{}'", item.client_id),
				None,
				Some(metadata),
			);
			let mut next = item.clone();
			next.status = ActionItemStatus::Exhausted;
			next.next_delivery_at = None;
			let outcome = self.commit(item, next, DeliveryOutcome::Exhausted).await?;
			error!(trace_id = %error.trace_id(), "{}", error);
			return Ok(outcome);
		};

		let attempts = item.delivery_attempts + 1;
		let mut next = item.clone();
		next.delivery_attempts = attempts;

		match self.attempt(client, item).await {
			Ok(()) => {
				info!("Delivered to client '{}' after {} attempt(s)", client.client_id, attempts);
				next.status = ActionItemStatus::Delivered;
				next.next_delivery_at = None;
				self.commit(item, next, DeliveryOutcome::Delivered).await
			}
			Err(e) if attempts >= client.delivery.max_attempts => {
				metadata.insert("attempts".to_string(), attempts.to_string());
				let error = NotificationError::delivery_exhausted(
					format!("Giving up on client '{}'", client.client_id),
					Some(e.into()),
					Some(metadata),
				);
				next.status = ActionItemStatus::Exhausted;
				next.next_delivery_at = None;
				let outcome = self.commit(item, next, DeliveryOutcome::Exhausted).await?;
				error!(trace_id = %error.trace_id(), "{}", error);
				Ok(outcome)
			}
			Err(_) => {
				let delay = backoff_delay(&client.delivery, attempts);
				next.next_delivery_at = Some(retry_at(now_ms, delay));
				debug!("Attempt {} failed, next in {:?}", attempts, delay);
				self.commit(item, next, DeliveryOutcome::Retrying).await
			}
		}
	}

	/// One bounded attempt: transport retries of the HTTP client count against the timeout
	async fn attempt(&self, client: &Client, item: &ActionItem) -> Result<(), NotificationError> {
		let payload = serde_json::to_value(item).map_err(|e| {
			NotificationError::internal_error("Failed to serialize action item", Some(e.into()), None)
		})?;
		let http_client = self
			.pool
			.get_or_create_http_client(&client.retry_policy)
			.await
			.map_err(|e| {
				NotificationError::internal_error("Failed to get HTTP client", Some(e.into()), None)
			})?;
		let notifier = WebhookNotifier::new(&client.webhook, http_client)?;

		let timeout = client.delivery.attempt_timeout();
		match tokio::time::timeout(timeout, notifier.notify_json(&payload)).await {
			Ok(result) => result,
			Err(e) => Err(NotificationError::delivery_failed(
				format!("Webhook attempt timed out after {:?}", timeout),
				Some(e.into()),
				None,
			)),
		}
	}

	/// Stores `next` in place of `current` and reports `outcome`.
	///
	/// When the item changed underneath us the stored status decides the outcome.
	async fn commit(
		&self,
		current: &ActionItem,
		next: ActionItem,
		outcome: DeliveryOutcome,
	) -> Result<DeliveryOutcome, NotificationError> {
		let pair = current.pair();
		let outcome = match self.store.compare_and_set(current, next).await {
			Ok(()) => outcome,
			Err(TrackerError::PersistenceConflict(ctx)) => {
				warn!("Action item changed during delivery: {}", ctx);
				let stored = self.store.get(&current.key()).await.map_err(storage_error)?;
				match stored.map(|item| item.status) {
					Some(ActionItemStatus::Delivered) => DeliveryOutcome::Delivered,
					Some(ActionItemStatus::Exhausted) => DeliveryOutcome::Exhausted,
					_ => DeliveryOutcome::Retrying,
				}
			}
			Err(e) => return Err(storage_error(e)),
		};

		metrics::record_delivery(&pair, outcome.as_str());
		Ok(outcome)
	}
}

fn storage_error(e: TrackerError) -> NotificationError {
	NotificationError::internal_error("Failed to persist delivery state", Some(e.into()), None)
}
