//! In-memory pending-work store.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::work::{
    Batch, BatchStatus, CostMetricRecord, NewWorkItem, PendingAggregate, RecentBatch, WorkItem,
};
use crate::core::{PendingWorkStore, SchedulerError};
use crate::infra::metric_log::JsonlMetricLog;
use crate::util::clock::now_ms;
use crate::util::serde::{BatchId, ItemId};

/// Reporting aggregates over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    /// All items ever inserted.
    pub total_items: usize,
    /// Items flagged processed.
    pub processed_items: usize,
    /// Items still pending.
    pub unprocessed_items: usize,
    /// Batches in any status.
    pub total_batches: usize,
    /// Sum of recorded batch costs.
    pub total_cost: f64,
    /// Mean declared batch size, `None` without batches.
    pub avg_batch_size: Option<f64>,
    /// Mean recorded duration over batches that have one.
    pub avg_processing_secs: Option<f64>,
    /// Mean recorded cost over batches that have one.
    pub avg_cost: Option<f64>,
    /// `total_cost / processed_items`, 0 when nothing is processed.
    pub cost_per_processed_item: f64,
}

/// Everything ever ingested, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestionTotals {
    /// Items accepted by `insert`.
    pub total_items: usize,
    /// Sum of their volumes.
    pub total_volume: f64,
    /// Item count per category.
    pub items_per_category: BTreeMap<String, usize>,
}

#[derive(Default)]
struct Inner {
    items: BTreeMap<ItemId, WorkItem>,
    keys: HashSet<String>,
    batches: BTreeMap<BatchId, Batch>,
    metrics: Vec<CostMetricRecord>,
    next_item_id: ItemId,
    next_batch_id: BatchId,
}

/// Process-local store; every operation runs under one lock.
#[derive(Default)]
pub struct InMemoryWorkStore {
    inner: Mutex<Inner>,
    metric_log: Option<JsonlMetricLog>,
}

impl InMemoryWorkStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror every cost-metric record into a JSONL log.
    #[must_use]
    pub fn with_metric_log(mut self, log: JsonlMetricLog) -> Self {
        self.metric_log = Some(log);
        self
    }

    /// Insert an item. Returns `None` when its key is already present.
    pub fn insert(&self, item: NewWorkItem) -> Option<ItemId> {
        let mut inner = self.inner.lock();
        if !inner.keys.insert(item.key.clone()) {
            tracing::debug!(key = %item.key, "duplicate item ignored");
            return None;
        }
        inner.next_item_id += 1;
        let id = inner.next_item_id;
        inner.items.insert(id, WorkItem::from_new(id, item));
        Some(id)
    }

    /// Item by identity.
    pub fn item(&self, id: ItemId) -> Option<WorkItem> {
        self.inner.lock().items.get(&id).cloned()
    }

    /// Batch by identity.
    pub fn batch(&self, id: BatchId) -> Option<Batch> {
        self.inner.lock().batches.get(&id).cloned()
    }

    /// All cost-metric records in insertion order.
    pub fn cost_metrics(&self) -> Vec<CostMetricRecord> {
        self.inner.lock().metrics.clone()
    }

    /// The `limit` newest completed batches, oldest first.
    pub fn recent_batches(&self, limit: usize) -> Vec<Batch> {
        let inner = self.inner.lock();
        let mut batches: Vec<Batch> = inner
            .batches
            .values()
            .rev()
            .filter(|b| b.status == BatchStatus::Completed)
            .take(limit)
            .cloned()
            .collect();
        batches.reverse();
        batches
    }

    /// Totals over every accepted item, processed or not.
    pub fn ingestion_totals(&self) -> IngestionTotals {
        let inner = self.inner.lock();
        let mut totals = IngestionTotals::default();
        for item in inner.items.values() {
            totals.total_items += 1;
            totals.total_volume += item.volume;
            *totals
                .items_per_category
                .entry(item.category.clone())
                .or_insert(0) += 1;
        }
        totals
    }

    /// Aggregates for reporting.
    pub fn summary(&self) -> StoreSummary {
        let inner = self.inner.lock();
        let total_items = inner.items.len();
        let processed_items = inner.items.values().filter(|i| i.processed).count();
        let total_batches = inner.batches.len();
        let total_cost: f64 = inner.batches.values().filter_map(|b| b.cost).sum();

        #[allow(clippy::cast_precision_loss)]
        let mean = |values: Vec<f64>| {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };
        #[allow(clippy::cast_precision_loss)]
        let avg_batch_size = mean(inner.batches.values().map(|b| b.size as f64).collect());
        let avg_processing_secs = mean(
            inner
                .batches
                .values()
                .filter_map(|b| b.processing_secs)
                .collect(),
        );
        let avg_cost = mean(inner.batches.values().filter_map(|b| b.cost).collect());
        #[allow(clippy::cast_precision_loss)]
        let cost_per_processed_item = if processed_items == 0 {
            0.0
        } else {
            total_cost / processed_items as f64
        };

        StoreSummary {
            total_items,
            processed_items,
            unprocessed_items: total_items - processed_items,
            total_batches,
            total_cost,
            avg_batch_size,
            avg_processing_secs,
            avg_cost,
            cost_per_processed_item,
        }
    }
}

impl PendingWorkStore for InMemoryWorkStore {
    fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<WorkItem>, SchedulerError> {
        let inner = self.inner.lock();
        let mut pending: Vec<&WorkItem> = inner.items.values().filter(|i| !i.processed).collect();
        pending.sort_by_key(|i| (i.arrived_at_ms, i.id));
        Ok(pending.into_iter().take(limit).cloned().collect())
    }

    fn create_batch(&self, size: usize, total_volume: f64) -> Result<BatchId, SchedulerError> {
        let mut inner = self.inner.lock();
        inner.next_batch_id += 1;
        let id = inner.next_batch_id;
        inner.batches.insert(
            id,
            Batch {
                id,
                size,
                total_volume,
                status: BatchStatus::Processing,
                started_at_ms: now_ms(),
                completed_at_ms: None,
                processing_secs: None,
                cost: None,
            },
        );
        Ok(id)
    }

    fn mark_processed(
        &self,
        item_ids: &[ItemId],
        batch_id: BatchId,
    ) -> Result<usize, SchedulerError> {
        let mut inner = self.inner.lock();
        let mut updated = 0;
        for id in item_ids {
            if let Some(item) = inner.items.get_mut(id) {
                if !item.processed {
                    item.processed = true;
                    item.batch_id = Some(batch_id);
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    fn update_batch(
        &self,
        batch_id: BatchId,
        processing_time: Duration,
        cost: f64,
    ) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock();
        let batch = inner
            .batches
            .get_mut(&batch_id)
            .ok_or_else(|| SchedulerError::Store(format!("unknown batch {batch_id}")))?;
        batch.status = BatchStatus::Completed;
        batch.completed_at_ms = Some(now_ms());
        batch.processing_secs = Some(processing_time.as_secs_f64());
        batch.cost = Some(cost);
        Ok(())
    }

    fn fail_batch(&self, batch_id: BatchId) -> Result<(), SchedulerError> {
        let mut inner = self.inner.lock();
        let batch = inner
            .batches
            .get_mut(&batch_id)
            .ok_or_else(|| SchedulerError::Store(format!("unknown batch {batch_id}")))?;
        batch.status = BatchStatus::Failed;
        batch.completed_at_ms = Some(now_ms());
        Ok(())
    }

    fn insert_cost_metric(&self, record: CostMetricRecord) -> Result<(), SchedulerError> {
        if let Some(log) = &self.metric_log {
            log.append(&record)?;
        }
        self.inner.lock().metrics.push(record);
        Ok(())
    }

    fn pending_count(&self) -> Result<usize, SchedulerError> {
        Ok(self.inner.lock().items.values().filter(|i| !i.processed).count())
    }

    fn latest_completed_batch(&self) -> Result<Option<RecentBatch>, SchedulerError> {
        let inner = self.inner.lock();
        Ok(inner
            .batches
            .values()
            .rev()
            .find(|b| b.status == BatchStatus::Completed)
            .map(|b| RecentBatch {
                id: b.id,
                size: b.size,
                total_volume: b.total_volume,
                processing_secs: b.processing_secs,
            }))
    }

    fn pending_aggregate(&self) -> Result<PendingAggregate, SchedulerError> {
        let inner = self.inner.lock();
        let (count, total) = inner
            .items
            .values()
            .filter(|i| !i.processed)
            .fold((0usize, 0.0_f64), |(n, sum), i| (n + 1, sum + i.volume));
        if count == 0 {
            return Ok(PendingAggregate::default());
        }
        #[allow(clippy::cast_precision_loss)]
        let avg = total / count as f64;
        Ok(PendingAggregate {
            count,
            total_volume: Some(total),
            avg_volume: Some(avg),
        })
    }
}
