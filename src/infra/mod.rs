//! Infrastructure adapters for the pending-work store and metric log.

pub mod metric_log;
pub mod store;

pub use metric_log::JsonlMetricLog;
pub use store::{InMemoryWorkStore, IngestionTotals, StoreSummary};
