//! Security models
//!
//! - `error`: Error types for security operations
//! - `secret`: Secret values and zeroization

mod error;
mod secret;

pub use error::{SecurityError, SecurityResult};
pub use secret::{SecretString, SecretValue};
