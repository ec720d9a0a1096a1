//! Domain models and data structures for the listener.
//!
//! - `blockchain`: Chain-agnostic block data and pair identity
//! - `config`: Configuration loading and validation
//! - `core`: Core domain models (Network, Client, Subscription, ActionItem, ChainCursor)
//! - `security`: Security models (Secret)

mod blockchain;
mod config;
mod core;
mod security;

pub use blockchain::{Block, BlockLog, BlockTransaction, ChainPair};

pub use core::{
	confirmations_at, ActionItem, ActionItemKey, ActionItemKind, ActionItemStatus, CandidateMatch,
	ChainCursor, Client, DeliveryPolicy, Network, RpcUrl, Subscription, WatchCriteria,
	WebhookConfig,
};

pub use config::{ConfigError, ConfigLoader};

pub use security::{SecretString, SecretValue, SecurityError, SecurityResult};
