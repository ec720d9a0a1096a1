//! Confirmation tracking of action items.
//!
//! - `ConfirmationTracker`: pending -> fired transitions, reorg discards, pruning
//! - `ActionItemStore`: persistence, with in-memory and file implementations

mod confirmation;
mod error;
mod store;

pub use confirmation::ConfirmationTracker;
pub use error::TrackerError;
pub use store::{ActionItemStore, FileActionItemStore, InMemoryActionItemStore, UpsertOutcome};
