//! Repository implementations for configuration management.
//!
//! Each repository loads one configuration type from JSON files and is accessed through a
//! service layer:
//!
//! - Network: pairs to listen on
//! - Client: notification destinations, keyed by client id
//! - Subscription: watch criteria, validated against known clients and networks

mod client;
mod error;
mod network;
mod subscription;

pub use client::{ClientRepository, ClientRepositoryTrait, ClientService};
pub use error::RepositoryError;
pub use network::{NetworkRepository, NetworkRepositoryTrait, NetworkService};
pub use subscription::{SubscriptionRepository, SubscriptionRepositoryTrait, SubscriptionService};
