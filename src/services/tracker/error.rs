//! Confirmation tracker error types.

use crate::utils::logging::error::{ErrorContext, TraceableError};
use std::collections::HashMap;
use thiserror::Error as ThisError;
use uuid::Uuid;

/// Errors raised by the confirmation tracker and its action item stores
#[derive(ThisError, Debug)]
pub enum TrackerError {
	/// The stored item no longer matches the expected one.
	///
	/// Not logged on construction: conflicts are expected and absorbed by callers.
	#[error("Persistence conflict: {0}")]
	PersistenceConflict(ErrorContext),

	/// Reading or writing persisted action items failed
	#[error("Storage error: {0}")]
	StorageError(ErrorContext),

	/// Other errors that don't fit into the categories above
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl TrackerError {
	pub fn persistence_conflict(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::PersistenceConflict(ErrorContext::new(msg, source, metadata))
	}

	pub fn storage_error(
		msg: impl Into<String>,
		source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
		metadata: Option<HashMap<String, String>>,
	) -> Self {
		Self::StorageError(ErrorContext::new_with_log(msg, source, metadata))
	}
}

impl TraceableError for TrackerError {
	fn trace_id(&self) -> String {
		match self {
			Self::PersistenceConflict(ctx) => ctx.trace_id.clone(),
			Self::StorageError(ctx) => ctx.trace_id.clone(),
			Self::Other(_) => Uuid::new_v4().to_string(),
		}
	}
}
