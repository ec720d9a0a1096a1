//! Declarative macros shared across the crate

mod deserialization;
