//! Mock implementations for testing purposes.
//!
//! This module contains mock implementations of various traits used throughout
//! the application, primarily for testing. It includes mocks for:
//! - Chain data providers
//! - The action item store
//! - Repository interfaces
//! - The job scheduler
//!
//! The mocks are implemented using the `mockall` crate.

mod providers;
mod storage;
#[allow(unused_imports)]
pub use models::*;
#[allow(unused_imports)]
pub use providers::*;
#[allow(unused_imports)]
pub use repositories::*;
#[allow(unused_imports)]
pub use services::*;
#[allow(unused_imports)]
pub use storage::*;
