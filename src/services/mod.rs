//! Core services implementing the business logic.
//!
//! This module contains the main service implementations:
//! - `blockchain`: Chain data provider interface and implementations
//! - `listener`: Polling cycles, reorg handling and scheduling per pair
//! - `notification`: Webhook delivery of fired action items
//! - `scanner`: Extraction of candidate matches from blocks
//! - `tracker`: Confirmation tracking of action items

pub mod blockchain;
pub mod listener;
pub mod notification;
pub mod scanner;
pub mod tracker;
