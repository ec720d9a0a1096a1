//! Utility modules for common functionality.
//!
//! This module provides various utility functions and types that are used across
//! the application. Currently includes:
//!
//! - client_storage: Shared map of lazily created clients
//! - cron_utils: Utilities for working with cron schedules and time intervals
//! - http: HTTP client utilities (i.e. creation retryable HTTP clients)
//! - json_file: Atomic JSON state files
//! - logging: Logging utilities
//! - macros: Macros for common functionality
//! - metrics: Metrics utilities
//! - parsing: Parsing utilities
//! - tests: Test utilities

mod cron_utils;

pub mod client_storage;
pub mod http;
pub mod json_file;
pub mod logging;
pub mod macros;
pub mod metrics;
pub mod parsing;
pub mod tests;

pub use client_storage::ClientStorage;
pub use cron_utils::*;
pub use http::*;
pub use macros::*;
pub use parsing::*;
