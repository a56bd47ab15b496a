//! Pending-work store backends.

pub mod memory;

pub use memory::{InMemoryWorkStore, IngestionTotals, StoreSummary};
