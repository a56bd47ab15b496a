//! One claim-process-score-persist cycle over the pending-work store.
//!
//! Each step commits on its own: a crash between opening a batch and
//! finalizing it leaves the batch in `processing`. Only one processor may be
//! live per store, because claiming is not isolated from concurrent readers.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::cost::CostModel;
use crate::core::stage::ProcessingStage;
use crate::core::store::PendingWorkStore;
use crate::core::work::{CostMetricRecord, WorkItem};
use crate::core::SchedulerError;
use crate::util::clock::now_ms;
use crate::util::serde::{BatchId, ItemId};

/// Aggregates computed over a claimed set of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetrics {
    /// Number of claimed items.
    pub size: usize,
    /// Sum of item volumes.
    pub total_volume: f64,
    /// Item count per category.
    pub categories: BTreeMap<String, usize>,
    /// `total_volume / size`, or 0 when empty.
    pub avg_volume_per_item: f64,
}

impl BatchMetrics {
    /// Compute metrics for a claimed set.
    #[must_use]
    pub fn from_items(items: &[WorkItem]) -> Self {
        let mut categories = BTreeMap::new();
        let mut total_volume = 0.0;
        for item in items {
            total_volume += item.volume;
            *categories.entry(item.category.clone()).or_insert(0) += 1;
        }
        #[allow(clippy::cast_precision_loss)]
        let avg_volume_per_item = if items.is_empty() {
            0.0
        } else {
            total_volume / items.len() as f64
        };
        Self {
            size: items.len(),
            total_volume,
            categories,
            avg_volume_per_item,
        }
    }
}

/// Result of one processed batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Identity of the finalized batch.
    pub batch_id: BatchId,
    /// Items claimed into the batch.
    pub items_processed: usize,
    /// Total volume of those items.
    pub total_volume: f64,
    /// Duration reported by the processing stage.
    pub processing_time: Duration,
    /// Batch cost.
    pub cost: f64,
    /// Cost divided by item count.
    pub cost_per_item: f64,
}

/// Claims pending items, drives them through a processing stage, and persists the results.
pub struct BatchProcessor<S, G> {
    store: S,
    stage: G,
    cost_model: CostModel,
}

impl<S, G> BatchProcessor<S, G>
where
    S: PendingWorkStore,
    G: ProcessingStage,
{
    /// Create a processor over a store and stage.
    pub const fn new(store: S, stage: G, cost_model: CostModel) -> Self {
        Self {
            store,
            stage,
            cost_model,
        }
    }

    /// Store this processor claims from.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Cost model used to score batches.
    pub const fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    /// Process up to `requested_size` of the oldest pending items as one batch.
    ///
    /// Returns `Ok(None)` without touching the store's batches when nothing is pending.
    ///
    /// # Errors
    ///
    /// Propagates store failures from any step and stage failures after the
    /// batch has been closed as failed.
    pub fn process_batch(
        &self,
        requested_size: usize,
    ) -> Result<Option<BatchOutcome>, SchedulerError> {
        if requested_size == 0 {
            return Ok(None);
        }

        let items = self.store.fetch_unprocessed(requested_size)?;
        if items.is_empty() {
            tracing::debug!(requested_size, "no unprocessed items");
            return Ok(None);
        }

        let metrics = BatchMetrics::from_items(&items);
        tracing::debug!(
            items = metrics.size,
            total_volume = metrics.total_volume,
            categories = ?metrics.categories,
            "claimed batch"
        );

        let batch_id = self.store.create_batch(metrics.size, metrics.total_volume)?;

        let processing_time = match self.stage.run(&metrics) {
            Ok(elapsed) => elapsed,
            Err(err) => {
                if let Err(close_err) = self.store.fail_batch(batch_id) {
                    tracing::error!(batch_id, error = %close_err, "failed to close batch as failed");
                }
                tracing::error!(batch_id, error = %err, "processing stage failed");
                return Err(err);
            }
        };

        let cost = self.cost_model.compute(metrics.size, processing_time);

        let ids: Vec<ItemId> = items.iter().map(|item| item.id).collect();
        let updated = self.store.mark_processed(&ids, batch_id)?;
        if updated < metrics.size {
            tracing::warn!(
                batch_id,
                claimed = metrics.size,
                updated,
                "partial update: fewer items marked processed than claimed"
            );
        }

        self.store.update_batch(batch_id, processing_time, cost.total)?;

        // Training data keeps full precision; only the outcome is rounded.
        #[allow(clippy::cast_precision_loss)]
        let recorded_per_item = cost.total / metrics.size as f64;
        self.store.insert_cost_metric(CostMetricRecord {
            batch_id,
            batch_size: metrics.size,
            total_volume: metrics.total_volume,
            processing_secs: processing_time.as_secs_f64(),
            cost_per_item: recorded_per_item,
            recorded_at_ms: now_ms(),
        })?;

        tracing::info!(
            batch_id,
            items = metrics.size,
            total_volume = metrics.total_volume,
            secs = processing_time.as_secs_f64(),
            cost = cost.total,
            cost_per_item = cost.per_item,
            "batch completed"
        );

        Ok(Some(BatchOutcome {
            batch_id,
            items_processed: metrics.size,
            total_volume: metrics.total_volume,
            processing_time,
            cost: cost.total,
            cost_per_item: cost.per_item,
        }))
    }
}
