//! Composition root and the API surface used by the HTTP façade.

pub mod api;
pub mod context;

pub use api::{
    database_stats, health, ingest_item, ingest_items, ingestion_stats, recent_batches,
    unprocessed_items, worker_status, BulkIngestSummary, DatabaseStats, Health, IngestRequest,
    IngestResponse, IngestionStats, PendingItems, WorkerStatus,
};
#[cfg(feature = "tokio-runtime")]
pub use api::stop_async;
pub use context::{AppContext, AppScheduler};
