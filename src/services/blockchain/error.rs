//! Chain data provider error types.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

/// Errors raised while setting up or querying chain data providers
#[derive(ThisError, Debug)]
pub enum ProviderError {
	/// The network configuration cannot back a provider
	#[error("Configuration error: {0}")]
	ConfigError(ErrorContext),

	/// A provider response could not be interpreted
	#[error("Response error: {0}")]
	ResponseError(ErrorContext),

	/// Errors related to the provider pool
	#[error("Provider pool error: {0}")]
	ProviderPoolError(ErrorContext),

	/// Other errors that don't fit into the categories above
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl ProviderError {
	pub fn config_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ConfigError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn response_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ResponseError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn provider_pool_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ProviderPoolError(ErrorContext::new_with_log(msg, source, metadata))
	}
}

impl TraceableError for ProviderError {
	fn trace_id(&self) -> String {
		match self {
			Self::ConfigError(ctx) => ctx.trace_id.clone(),
			Self::ResponseError(ctx) => ctx.trace_id.clone(),
			Self::ProviderPoolError(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
