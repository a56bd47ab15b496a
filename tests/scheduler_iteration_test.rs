//! Integration tests for single scheduler iterations driven through `run_once`.
//!
//! These cover:
//! - The idle path on an empty store
//! - Fallback to the default size while the predictor cannot be consulted
//! - Predictor-driven sizing once a batch has completed
//! - Transient store failures leaving statistics untouched

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adaptive_batcher::config::{SizingConfig, WorkerConfig};
use adaptive_batcher::core::{
    ArtifactPredictor, BatchMetrics, BatchProcessor, BatchSizePredictor, CostMetricRecord,
    CostModel, FixedSizePredictor, LinearArtifact, NewWorkItem, PendingAggregate,
    PendingWorkStore, ProcessingStage, RecentBatch, Scheduler, SchedulerError, SizeBounds,
    WorkItem,
};
use adaptive_batcher::infra::InMemoryWorkStore;
use adaptive_batcher::util::{BatchId, ItemId, Priority};

// ============================================================================
// HELPERS
// ============================================================================

struct InstantStage;

impl ProcessingStage for InstantStage {
    fn run(&self, metrics: &BatchMetrics) -> Result<Duration, SchedulerError> {
        Ok(Duration::from_secs_f64(0.5 + metrics.total_volume * 0.02))
    }
}

fn seed(store: &InMemoryWorkStore, count: usize, volume: f64) {
    let offset = store.summary().total_items;
    for i in 0..count {
        let n = offset + i;
        store.insert(NewWorkItem {
            key: format!("evt-{n}"),
            arrived_at_ms: 10_000 + n as u128,
            category: "click".into(),
            volume,
            priority: Priority::Low,
        });
    }
}

fn scheduler_with<S, P>(store: S, predictor: P) -> Scheduler<S, InstantStage, P>
where
    S: PendingWorkStore + 'static,
    P: BatchSizePredictor + 'static,
{
    Scheduler::new(
        BatchProcessor::new(store, InstantStage, CostModel::default()),
        predictor,
        SizingConfig::default(),
        &WorkerConfig::default(),
    )
}

/// Store whose first `failures` fetches return a store error.
struct FlakyStore {
    inner: InMemoryWorkStore,
    failures: AtomicUsize,
}

impl PendingWorkStore for FlakyStore {
    fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<WorkItem>, SchedulerError> {
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SchedulerError::Store("connection reset".into()));
        }
        self.inner.fetch_unprocessed(limit)
    }

    fn create_batch(&self, size: usize, total_volume: f64) -> Result<BatchId, SchedulerError> {
        self.inner.create_batch(size, total_volume)
    }

    fn mark_processed(&self, ids: &[ItemId], batch_id: BatchId) -> Result<usize, SchedulerError> {
        self.inner.mark_processed(ids, batch_id)
    }

    fn update_batch(&self, id: BatchId, t: Duration, cost: f64) -> Result<(), SchedulerError> {
        self.inner.update_batch(id, t, cost)
    }

    fn fail_batch(&self, id: BatchId) -> Result<(), SchedulerError> {
        self.inner.fail_batch(id)
    }

    fn insert_cost_metric(&self, record: CostMetricRecord) -> Result<(), SchedulerError> {
        self.inner.insert_cost_metric(record)
    }

    fn pending_count(&self) -> Result<usize, SchedulerError> {
        self.inner.pending_count()
    }

    fn latest_completed_batch(&self) -> Result<Option<RecentBatch>, SchedulerError> {
        self.inner.latest_completed_batch()
    }

    fn pending_aggregate(&self) -> Result<PendingAggregate, SchedulerError> {
        self.inner.pending_aggregate()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[test]
fn test_idle_iteration_changes_nothing() {
    let store = Arc::new(InMemoryWorkStore::new());
    let scheduler = scheduler_with(Arc::clone(&store), FixedSizePredictor::new(100));

    assert!(scheduler.run_once().unwrap().is_none());

    let stats = scheduler.stats();
    assert_eq!(stats.total_batches, 0);
    assert_eq!(stats.total_items, 0);
    assert_eq!(stats.predictions_used, 0);
    assert_eq!(stats.last_batch_at_ms, None);
    assert_eq!(store.summary().total_batches, 0);
}

#[test]
fn test_first_batch_uses_default_size() {
    let store = Arc::new(InMemoryWorkStore::new());
    seed(&store, 120, 10.0);
    let scheduler = scheduler_with(Arc::clone(&store), FixedSizePredictor::new(20));

    let outcome = scheduler.run_once().unwrap().unwrap();
    assert_eq!(outcome.items_processed, 50);
    assert_eq!(scheduler.stats().predictions_used, 0);
}

#[test]
fn test_not_ready_predictor_falls_back_to_default() {
    let store = Arc::new(InMemoryWorkStore::new());
    seed(&store, 200, 10.0);
    let scheduler = scheduler_with(Arc::clone(&store), FixedSizePredictor::not_ready(20));

    scheduler.run_once().unwrap();
    assert_eq!(scheduler.next_batch_size().unwrap(), 50);
    let outcome = scheduler.run_once().unwrap().unwrap();
    assert_eq!(outcome.items_processed, 50);
    assert_eq!(scheduler.stats().predictions_used, 0);
    assert!(!scheduler.stats().predictor_ready);
}

#[test]
fn test_ready_predictor_drives_size_after_first_batch() {
    let store = Arc::new(InMemoryWorkStore::new());
    seed(&store, 120, 10.0);
    let scheduler = scheduler_with(Arc::clone(&store), FixedSizePredictor::new(20));

    scheduler.run_once().unwrap();
    let outcome = scheduler.run_once().unwrap().unwrap();
    assert_eq!(outcome.items_processed, 20);

    let stats = scheduler.stats();
    assert_eq!(stats.total_batches, 2);
    assert_eq!(stats.total_items, 70);
    assert_eq!(stats.predictions_used, 1);
    assert!((stats.total_cost - (0.35 + 0.2)).abs() < 1e-9);
}

#[test]
fn test_artifact_prediction_is_normalized() {
    let artifact = LinearArtifact {
        feature_means: [0.0; 5],
        feature_scales: [1.0; 5],
        coefficients: [0.08, 0.0, 0.0, 0.0, 0.0],
        intercept: 0.0,
        training_samples: Some(12),
    };
    let predictor = ArtifactPredictor::from_artifact(artifact, SizeBounds::default()).unwrap();

    let store = Arc::new(InMemoryWorkStore::new());
    seed(&store, 100, 10.0);
    let scheduler = scheduler_with(Arc::clone(&store), predictor);

    scheduler.run_once().unwrap();
    // 50 pending items of volume 10: 500 * 0.08 = 40
    assert_eq!(scheduler.next_batch_size().unwrap(), 40);
    assert_eq!(scheduler.stats().predictions_used, 1);
}

#[test]
fn test_transient_store_failure_leaves_stats_untouched() {
    let store = FlakyStore {
        inner: InMemoryWorkStore::new(),
        failures: AtomicUsize::new(2),
    };
    seed(&store.inner, 10, 1.0);
    let scheduler = scheduler_with(store, FixedSizePredictor::not_ready(50));

    for _ in 0..2 {
        let err = scheduler.run_once().unwrap_err();
        assert!(matches!(err, SchedulerError::Store(_)));
        assert_eq!(scheduler.stats().total_batches, 0);
    }

    let outcome = scheduler.run_once().unwrap().unwrap();
    assert_eq!(outcome.items_processed, 10);
    assert_eq!(scheduler.stats().total_batches, 1);
    assert_eq!(scheduler.store().pending_count().unwrap(), 0);
}

#[test]
fn test_remaining_items_drain_across_iterations() {
    let store = Arc::new(InMemoryWorkStore::new());
    seed(&store, 123, 4.0);
    let scheduler = scheduler_with(Arc::clone(&store), FixedSizePredictor::not_ready(50));

    let mut sizes = Vec::new();
    while let Some(outcome) = scheduler.run_once().unwrap() {
        sizes.push(outcome.items_processed);
    }
    assert_eq!(sizes, vec![50, 50, 23]);
    assert_eq!(scheduler.stats().total_items, 123);
    assert_eq!(store.cost_metrics().len(), 3);
}
