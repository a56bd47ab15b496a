//! Request/response models and helpers behind the HTTP façade.
//!
//! The HTTP server itself lives outside this crate; handlers call these
//! functions with the shared [`AppContext`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{NewWorkItem, PendingWorkStore, SchedulerError, StatsSnapshot, WorkItem};
use crate::runtime::context::AppContext;
use crate::util::clock::now_ms;
use crate::util::serde::Priority;

/// Service name reported by [`health`].
pub const SERVICE_NAME: &str = "adaptive_batcher";

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Always `"running"` while the process serves requests.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Crate version.
    pub version: String,
    /// Whether the loop thread is alive.
    pub worker_running: bool,
}

/// Scheduler statistics plus liveness and queue depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatus {
    /// Scheduler statistics.
    #[serde(flatten)]
    pub stats: StatsSnapshot,
    /// Whether the loop thread is alive.
    pub is_alive: bool,
    /// Items waiting to be processed.
    pub pending_items: usize,
}

/// Item submitted by a producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Unique external key.
    pub key: String,
    /// Arrival time, ms since epoch. Defaults to receive time.
    #[serde(default)]
    pub arrived_at_ms: Option<u128>,
    /// Category label.
    pub category: String,
    /// Data volume.
    pub volume: f64,
    /// Priority label.
    #[serde(default)]
    pub priority: Priority,
}

/// Result of a single ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    /// `false` for duplicates.
    pub success: bool,
    /// Echo of the submitted key.
    pub key: String,
    /// Human-readable outcome.
    pub message: String,
}

/// Tallies for a bulk ingest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIngestSummary {
    /// Items in the request.
    pub total_received: usize,
    /// Newly stored.
    pub successful: usize,
    /// Skipped as duplicates.
    pub duplicates: usize,
    /// Rejected.
    pub failed: usize,
}

/// Item counts for [`DatabaseStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCounts {
    /// All items.
    pub total: usize,
    /// Processed items.
    pub processed: usize,
    /// Pending items.
    pub unprocessed: usize,
    /// Processed share in percent, one decimal.
    pub processing_rate_pct: f64,
}

/// Batch aggregates for [`DatabaseStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAggregates {
    /// All batches.
    pub total: usize,
    /// Mean batch size, rounded to a whole item.
    pub avg_size: f64,
    /// Mean duration in seconds, two decimals.
    pub avg_processing_secs: f64,
    /// Mean batch cost, four decimals.
    pub avg_cost: f64,
}

/// Cost totals for [`DatabaseStats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostTotals {
    /// Total cost, three decimals.
    pub total: f64,
    /// Cost per processed item, four decimals.
    pub per_item: f64,
}

/// Store-wide reporting view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStats {
    /// Item counts.
    pub items: ItemCounts,
    /// Batch aggregates.
    pub batches: BatchAggregates,
    /// Cost totals.
    pub costs: CostTotals,
}

/// One row of the recent-batches view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchView {
    /// Batch identity.
    pub id: u64,
    /// Item count.
    pub size: usize,
    /// Batch cost.
    pub cost: Option<f64>,
    /// Duration in seconds.
    pub processing_secs: Option<f64>,
    /// Open time, ms since epoch.
    pub started_at_ms: u128,
}

/// Ingestion tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionStats {
    /// Items accepted so far.
    pub total_items: usize,
    /// Sum of accepted volumes, two decimals.
    pub total_volume: f64,
    /// Accepted items per category.
    pub items_per_category: BTreeMap<String, usize>,
    /// Items still waiting for a batch.
    pub unprocessed_items: usize,
}

/// Pending-item listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingItems {
    /// Items returned.
    pub count: usize,
    /// Oldest first.
    pub items: Vec<WorkItem>,
}

/// Health payload.
pub fn health(ctx: &AppContext) -> Health {
    Health {
        status: "running".into(),
        service: SERVICE_NAME.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        worker_running: ctx.scheduler().is_alive(),
    }
}

/// Scheduler statistics with liveness and queue depth.
///
/// # Errors
///
/// Returns store errors from the pending count.
pub fn worker_status(ctx: &AppContext) -> Result<WorkerStatus, SchedulerError> {
    Ok(WorkerStatus {
        stats: ctx.scheduler().stats(),
        is_alive: ctx.scheduler().is_alive(),
        pending_items: ctx.store().pending_count()?,
    })
}

/// Store one item. Duplicates succeed with `success: false`.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidItem` for an empty key or a negative or non-finite volume.
pub fn ingest_item(ctx: &AppContext, req: IngestRequest) -> Result<IngestResponse, SchedulerError> {
    if req.key.is_empty() {
        return Err(SchedulerError::InvalidItem("key must not be empty".into()));
    }
    if !req.volume.is_finite() || req.volume < 0.0 {
        return Err(SchedulerError::InvalidItem(format!(
            "volume must be a non-negative number, got {}",
            req.volume
        )));
    }

    let key = req.key.clone();
    let inserted = ctx.store().insert(NewWorkItem {
        key: req.key,
        arrived_at_ms: req.arrived_at_ms.unwrap_or_else(now_ms),
        category: req.category,
        volume: req.volume,
        priority: req.priority,
    });

    Ok(match inserted {
        Some(_) => IngestResponse {
            success: true,
            key,
            message: "item ingested".into(),
        },
        None => IngestResponse {
            success: false,
            key,
            message: "item already exists (duplicate)".into(),
        },
    })
}

/// Store many items, tallying outcomes. Individual failures do not abort the rest.
pub fn ingest_items(ctx: &AppContext, reqs: Vec<IngestRequest>) -> BulkIngestSummary {
    let mut summary = BulkIngestSummary {
        total_received: reqs.len(),
        ..BulkIngestSummary::default()
    };
    for req in reqs {
        let key = req.key.clone();
        match ingest_item(ctx, req) {
            Ok(resp) if resp.success => summary.successful += 1,
            Ok(_) => summary.duplicates += 1,
            Err(err) => {
                tracing::warn!(%key, error = %err, "failed to ingest item");
                summary.failed += 1;
            }
        }
    }
    summary
}

/// Store-wide counts, averages, and costs.
pub fn database_stats(ctx: &AppContext) -> DatabaseStats {
    let s = ctx.store().summary();
    #[allow(clippy::cast_precision_loss)]
    let processing_rate_pct = if s.total_items == 0 {
        0.0
    } else {
        round_to(s.processed_items as f64 / s.total_items as f64 * 100.0, 1)
    };
    DatabaseStats {
        items: ItemCounts {
            total: s.total_items,
            processed: s.processed_items,
            unprocessed: s.unprocessed_items,
            processing_rate_pct,
        },
        batches: BatchAggregates {
            total: s.total_batches,
            avg_size: round_to(s.avg_batch_size.unwrap_or(0.0), 0),
            avg_processing_secs: round_to(s.avg_processing_secs.unwrap_or(0.0), 2),
            avg_cost: round_to(s.avg_cost.unwrap_or(0.0), 4),
        },
        costs: CostTotals {
            total: round_to(s.total_cost, 3),
            per_item: round_to(s.cost_per_processed_item, 4),
        },
    }
}

/// Totals over everything ingested, with the current backlog.
///
/// # Errors
///
/// Returns store errors from the pending count.
pub fn ingestion_stats(ctx: &AppContext) -> Result<IngestionStats, SchedulerError> {
    let totals = ctx.store().ingestion_totals();
    Ok(IngestionStats {
        total_items: totals.total_items,
        total_volume: round_to(totals.total_volume, 2),
        items_per_category: totals.items_per_category,
        unprocessed_items: ctx.store().pending_count()?,
    })
}

/// Up to `limit` pending items, oldest first.
///
/// # Errors
///
/// Returns store errors from the fetch.
pub fn unprocessed_items(ctx: &AppContext, limit: usize) -> Result<PendingItems, SchedulerError> {
    let items = ctx.store().fetch_unprocessed(limit)?;
    Ok(PendingItems {
        count: items.len(),
        items,
    })
}

/// The `limit` newest completed batches, oldest first.
pub fn recent_batches(ctx: &AppContext, limit: usize) -> Vec<BatchView> {
    ctx.store()
        .recent_batches(limit)
        .into_iter()
        .map(|b| BatchView {
            id: b.id,
            size: b.size,
            cost: b.cost,
            processing_secs: b.processing_secs,
            started_at_ms: b.started_at_ms,
        })
        .collect()
}

/// Stop the scheduler from async code without blocking the runtime's workers.
///
/// # Errors
///
/// Returns `SchedulerError::Spawn` if the blocking task could not complete.
#[cfg(feature = "tokio-runtime")]
pub async fn stop_async(ctx: &AppContext) -> Result<crate::core::StopOutcome, SchedulerError> {
    let scheduler = std::sync::Arc::clone(ctx.scheduler());
    tokio::task::spawn_blocking(move || scheduler.stop())
        .await
        .map_err(|e| SchedulerError::Spawn(e.to_string()))
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round_ties_even() / factor
}
