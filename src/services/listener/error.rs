//! Listener error types and handling.
//!
//! Errors of one polling cycle. Everything except `ReorgTooDeep` and `Halted` is retried by
//! the next scheduled cycle. `ProviderMismatch` is raised when a poller is built.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

/// Represents possible errors that can occur while listening on a pair
#[derive(ThisError, Debug)]
pub enum ListenerError {
	/// The chain data provider could not be reached or returned garbage
	#[error("Provider unavailable: {0}")]
	ProviderUnavailable(ErrorContext),

	/// The provider serves another pair than the one being listened on
	#[error("Provider mismatch: {0}")]
	ProviderMismatch(ErrorContext),

	/// The fork point lies deeper than the walk may go; the pair halts
	#[error("Reorg too deep: {0}")]
	ReorgTooDeep(ErrorContext),

	/// The cursor changed between read and write
	#[error("Cursor conflict: {0}")]
	CursorConflict(ErrorContext),

	/// Errors related to cursor or action item persistence
	#[error("Storage error: {0}")]
	StorageError(ErrorContext),

	/// The cycle did not finish within the configured timeout
	#[error("Cycle timeout: {0}")]
	CycleTimeout(ErrorContext),

	/// Errors related to job scheduling
	#[error("Scheduler error: {0}")]
	SchedulerError(ErrorContext),

	/// The pair is halted until resumed.
	///
	/// Not logged on construction: halted pairs report it on every tick.
	#[error("Halted: {0}")]
	Halted(ErrorContext),

	/// Other errors that don't fit into the categories above
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl ListenerError {
	pub fn provider_unavailable(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ProviderUnavailable(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn provider_mismatch(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ProviderMismatch(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn reorg_too_deep(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::ReorgTooDeep(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn cursor_conflict(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::CursorConflict(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn storage_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::StorageError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn cycle_timeout(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::CycleTimeout(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn scheduler_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::SchedulerError(ErrorContext::new_with_log(msg, source, metadata))
	}

	pub fn halted(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::Halted(ErrorContext::new(msg, source, metadata))
	}

	/// Whether the next scheduled cycle may succeed without operator action
	pub fn is_retryable(&self) -> bool {
		!matches!(
			self,
			Self::ProviderMismatch(_)
				| Self::ReorgTooDeep(_)
				| Self::Halted(_)
				| Self::SchedulerError(_)
		)
	}
}

impl TraceableError for ListenerError {
	fn trace_id(&self) -> String {
		match self {
			Self::ProviderUnavailable(ctx) => ctx.trace_id.clone(),
			Self::ProviderMismatch(ctx) => ctx.trace_id.clone(),
			Self::ReorgTooDeep(ctx) => ctx.trace_id.clone(),
			Self::CursorConflict(ctx) => ctx.trace_id.clone(),
			Self::StorageError(ctx) => ctx.trace_id.clone(),
			Self::CycleTimeout(ctx) => ctx.trace_id.clone(),
			Self::SchedulerError(ctx) => ctx.trace_id.clone(),
			Self::Halted(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
