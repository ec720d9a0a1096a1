//! Notification error types and handling.
//!
//! Provides error types for webhook delivery, including failed attempts, exhausted
//! retries and configuration problems.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;

/// Represents errors that can occur during notification operations
#[derive(ThisError, Debug)]
pub enum NotificationError {
	/// A single delivery attempt failed (transport error, timeout or non-2xx response)
	#[error("Delivery failed: {0}")]
	DeliveryFailed(Box<ErrorContext>),

	/// An action item ran out of delivery attempts.
	///
	/// Not logged on construction: the dispatcher logs it once the item is stored as exhausted.
	#[error("Delivery exhausted: {0}")]
	DeliveryExhausted(Box<ErrorContext>),

	/// Errors related to malformed webhook configuration
	#[error("Config error: {0}")]
	ConfigError(Box<ErrorContext>),

	/// Errors related to internal processing errors
	#[error("Internal error: {0}")]
	InternalError(Box<ErrorContext>),
}

impl NotificationError {
	// Delivery failed error
	pub fn delivery_failed(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::DeliveryFailed(Box::new(ErrorContext::new_with_log(msg, source, metadata)))
	}

	// Delivery exhausted error
	pub fn delivery_exhausted(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::DeliveryExhausted(Box::new(ErrorContext::new(msg, source, metadata)))
	}

	// Config error
	pub fn config_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ConfigError(Box::new(ErrorContext::new_with_log(msg, source, metadata)))
	}

	// Internal error
	pub fn internal_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::InternalError(Box::new(ErrorContext::new_with_log(msg, source, metadata)))
	}
}

impl TraceableError for NotificationError {
	fn trace_id(&self) -> String {
		match self {
			Self::DeliveryFailed(ctx) => ctx.trace_id.clone(),
			Self::DeliveryExhausted(ctx) => ctx.trace_id.clone(),
			Self::ConfigError(ctx) => ctx.trace_id.clone(),
			Self::InternalError(ctx) => ctx.trace_id.clone(),
		}
	}
}
