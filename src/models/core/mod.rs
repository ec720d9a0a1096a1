//! Core domain models.
//!
//! - Networks: pairs to listen on and how
//! - Clients: notification destinations
//! - Subscriptions: what to watch for on behalf of a client
//! - Action items: tracked matches
//! - Cursors: per-pair scanning progress

mod action_item;
mod client;
mod cursor;
mod network;
mod subscription;

pub use action_item::{
	confirmations_at, ActionItem, ActionItemKey, ActionItemKind, ActionItemStatus, CandidateMatch,
};
pub use client::{Client, DeliveryPolicy, WebhookConfig};
pub use cursor::ChainCursor;
pub use network::{Network, RpcUrl};
pub use subscription::{Subscription, WatchCriteria};
