//! Notification service implementation.
//!
//! Fired action items are delivered to the webhook of the client that owns them:
//!
//! - `dispatcher`: one delivery attempt per call, backoff and exhaustion
//! - `webhook`: HTTP request building and HMAC signing
//! - `pool`: shared HTTP clients keyed by retry policy

mod dispatcher;
mod error;
mod pool;
mod webhook;

pub use dispatcher::{backoff_delay, DeliveryOutcome, WebhookDispatcher};
pub use error::NotificationError;
pub use pool::{NotificationClientPool, NotificationPoolError};
pub use webhook::WebhookNotifier;
