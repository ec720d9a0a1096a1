//! Test helper utilities
//!
//! This module contains test helper utilities for the application.
//!
//! - `builders`: Test helper utilities for creating test instances of models
//! - `chain`: In-memory chain data provider
//! - `http`: Test helper utilities for creating HTTP clients

pub mod builders {
	pub mod action_item;
	pub mod block;
	pub mod client;
	pub mod network;
	pub mod subscription;
}


pub use builders::*;
pub use chain::TestChain;
pub use http::*;
