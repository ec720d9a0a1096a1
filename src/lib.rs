//! Blockchain listener service.
//!
//! This library watches (blockchain, network) pairs for subscribed activity and delivers
//! confirmed matches to client webhooks. It includes:
//!
//! - Configuration management through JSON files
//! - Cursor-driven block polling with reorg detection
//! - Matching of transactions, addresses and contract events
//! - Confirmation tracking and signed webhook delivery
//!
//! # Module Structure
//!
//! - `bootstrap`: Bootstraps the application
//! - `models`: Data structures for configuration and blockchain data
//! - `repositories`: Configuration storage and management
//! - `services`: Core business logic and blockchain interaction
//! - `utils`: Common utilities and helper functions

pub mod bootstrap;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;
