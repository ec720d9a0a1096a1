//! Listener service implementation.
//!
//! Watches (blockchain, network) pairs for new blocks:
//! - `poller`: one polling cycle for one pair
//! - `reorg`: detection of reorganized blocks against the cursor
//! - `storage`: cursor persistence
//! - `service`: cron scheduling of the pollers

mod error;
mod poller;
mod reorg;
mod service;
mod storage;

pub use error::ListenerError;
pub use poller::{ChainPoller, CycleOutcome, CyclePhase, CycleReport};
pub use reorg::{compare_with_chain, ChainComparison, ReorgReport};
pub use service::{run_scheduled_cycle, JobSchedulerTrait, ListenerService, PairListener};
pub use storage::{CursorStore, FileCursorStore, InMemoryCursorStore};
