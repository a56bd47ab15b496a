//! Pending-work store abstraction consumed by the batch processor and scheduler.

use std::time::Duration;

use crate::core::work::{CostMetricRecord, PendingAggregate, RecentBatch, WorkItem};
use crate::core::SchedulerError;
use crate::util::serde::{BatchId, ItemId};

/// Persistent store of work items, batches, and cost metrics.
///
/// Every method is an independent atomic operation; no transaction spans the
/// claim-to-finalize sequence. Implementations are shared between the loop
/// thread and the façade, so they take `&self` and lock internally.
pub trait PendingWorkStore: Send + Sync {
    /// Up to `limit` unprocessed items, oldest first.
    fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<WorkItem>, SchedulerError>;

    /// Open a batch in `processing` state and return its identity.
    fn create_batch(&self, size: usize, total_volume: f64) -> Result<BatchId, SchedulerError>;

    /// Flag the given items processed and attribute them to `batch_id`.
    ///
    /// Returns how many rows were actually updated; items already processed are skipped.
    fn mark_processed(&self, item_ids: &[ItemId], batch_id: BatchId)
        -> Result<usize, SchedulerError>;

    /// Finalize a batch as completed with its duration and cost.
    fn update_batch(
        &self,
        batch_id: BatchId,
        processing_time: Duration,
        cost: f64,
    ) -> Result<(), SchedulerError>;

    /// Close a batch as failed. Its items stay unprocessed.
    fn fail_batch(&self, batch_id: BatchId) -> Result<(), SchedulerError>;

    /// Append a cost metric record.
    fn insert_cost_metric(&self, record: CostMetricRecord) -> Result<(), SchedulerError>;

    /// Number of unprocessed items.
    fn pending_count(&self) -> Result<usize, SchedulerError>;

    /// The completed batch with the highest identity, if any.
    fn latest_completed_batch(&self) -> Result<Option<RecentBatch>, SchedulerError>;

    /// Count and volume aggregates over unprocessed items.
    fn pending_aggregate(&self) -> Result<PendingAggregate, SchedulerError>;
}

impl<T: PendingWorkStore + ?Sized> PendingWorkStore for std::sync::Arc<T> {
    fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<WorkItem>, SchedulerError> {
        (**self).fetch_unprocessed(limit)
    }

    fn create_batch(&self, size: usize, total_volume: f64) -> Result<BatchId, SchedulerError> {
        (**self).create_batch(size, total_volume)
    }

    fn mark_processed(
        &self,
        item_ids: &[ItemId],
        batch_id: BatchId,
    ) -> Result<usize, SchedulerError> {
        (**self).mark_processed(item_ids, batch_id)
    }

    fn update_batch(
        &self,
        batch_id: BatchId,
        processing_time: Duration,
        cost: f64,
    ) -> Result<(), SchedulerError> {
        (**self).update_batch(batch_id, processing_time, cost)
    }

    fn fail_batch(&self, batch_id: BatchId) -> Result<(), SchedulerError> {
        (**self).fail_batch(batch_id)
    }

    fn insert_cost_metric(&self, record: CostMetricRecord) -> Result<(), SchedulerError> {
        (**self).insert_cost_metric(record)
    }

    fn pending_count(&self) -> Result<usize, SchedulerError> {
        (**self).pending_count()
    }

    fn latest_completed_batch(&self) -> Result<Option<RecentBatch>, SchedulerError> {
        (**self).latest_completed_batch()
    }

    fn pending_aggregate(&self) -> Result<PendingAggregate, SchedulerError> {
        (**self).pending_aggregate()
    }
}
