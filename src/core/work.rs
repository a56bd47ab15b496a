//! Work items, batches, and the records derived from them.

use serde::{Deserialize, Serialize};

use crate::util::serde::{BatchId, ItemId, Priority};

/// Producer-supplied item before the store assigns an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkItem {
    /// Unique external key; the store ignores duplicates.
    pub key: String,
    /// Arrival time in milliseconds since epoch.
    pub arrived_at_ms: u128,
    /// Category label (e.g. `order`, `payment`).
    pub category: String,
    /// Data volume of the item.
    pub volume: f64,
    /// Priority label.
    pub priority: Priority,
}

/// A unit of ingested data awaiting or having completed batch processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Store-assigned identity.
    pub id: ItemId,
    /// Unique external key.
    pub key: String,
    /// Arrival time in milliseconds since epoch.
    pub arrived_at_ms: u128,
    /// Category label.
    pub category: String,
    /// Data volume of the item.
    pub volume: f64,
    /// Priority label.
    pub priority: Priority,
    /// Set once the item has been processed.
    pub processed: bool,
    /// Batch that processed the item.
    pub batch_id: Option<BatchId>,
}

impl WorkItem {
    /// Materialise a new item with the given identity, unprocessed.
    #[must_use]
    pub fn from_new(id: ItemId, item: NewWorkItem) -> Self {
        Self {
            id,
            key: item.key,
            arrived_at_ms: item.arrived_at_ms,
            category: item.category,
            volume: item.volume,
            priority: item.priority,
            processed: false,
            batch_id: None,
        }
    }
}

/// Lifecycle state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Opened at claim time.
    Processing,
    /// Finalized with duration and cost.
    Completed,
    /// Processing stage failed; never re-opened.
    Failed,
}

/// A group of items processed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Store-assigned identity.
    pub id: BatchId,
    /// Declared item count.
    pub size: usize,
    /// Total volume of the claimed items.
    pub total_volume: f64,
    /// Current status.
    pub status: BatchStatus,
    /// Open time in milliseconds since epoch.
    pub started_at_ms: u128,
    /// Completion time in milliseconds since epoch.
    pub completed_at_ms: Option<u128>,
    /// Processing duration in seconds, once finalized.
    pub processing_secs: Option<f64>,
    /// Computed cost, once finalized.
    pub cost: Option<f64>,
}

/// Append-only per-batch record consumed by the offline trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostMetricRecord {
    /// Batch the record describes.
    pub batch_id: BatchId,
    /// Items in the batch.
    pub batch_size: usize,
    /// Total volume of the batch.
    pub total_volume: f64,
    /// Processing duration in seconds.
    pub processing_secs: f64,
    /// Batch cost divided by size.
    pub cost_per_item: f64,
    /// Record time in milliseconds since epoch.
    pub recorded_at_ms: u128,
}

/// Aggregate over all unprocessed items. Volume fields are `None` when nothing is pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingAggregate {
    /// Number of unprocessed items.
    pub count: usize,
    /// Sum of their volumes.
    pub total_volume: Option<f64>,
    /// Mean of their volumes.
    pub avg_volume: Option<f64>,
}

/// The most recent completed batch, as seen by the size decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecentBatch {
    /// Batch identity.
    pub id: BatchId,
    /// Item count.
    pub size: usize,
    /// Total volume.
    pub total_volume: f64,
    /// Recorded duration in seconds, if any.
    pub processing_secs: Option<f64>,
}
