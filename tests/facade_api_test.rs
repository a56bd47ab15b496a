//! Integration tests for the façade helpers over a bootstrapped `AppContext`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use adaptive_batcher::config::BatcherConfig;
use adaptive_batcher::core::{PendingWorkStore, SchedulerError, StopOutcome};
use adaptive_batcher::infra::{InMemoryWorkStore, JsonlMetricLog};
use adaptive_batcher::runtime::api::{self, IngestRequest};
use adaptive_batcher::runtime::AppContext;
use adaptive_batcher::util::Priority;

fn fast_config() -> BatcherConfig {
    let mut cfg = BatcherConfig::default();
    cfg.processing.simulate_delay = false;
    cfg.worker.interval_ms = 10;
    cfg.worker.join_timeout_ms = 2_000;
    cfg
}

fn request(key: &str, volume: f64) -> IngestRequest {
    IngestRequest {
        key: key.into(),
        arrived_at_ms: None,
        category: "purchase".into(),
        volume,
        priority: Priority::High,
    }
}

#[test]
fn test_ingest_reports_duplicates() {
    let ctx = AppContext::bootstrap(fast_config(), Arc::new(InMemoryWorkStore::new())).unwrap();

    let first = api::ingest_item(&ctx, request("evt-1", 12.5)).unwrap();
    assert!(first.success);
    let again = api::ingest_item(&ctx, request("evt-1", 12.5)).unwrap();
    assert!(!again.success);
    assert_eq!(again.key, "evt-1");

    let err = api::ingest_item(&ctx, request("evt-2", -1.0)).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidItem(_)));
}

#[test]
fn test_bulk_ingest_tallies() {
    let ctx = AppContext::bootstrap(fast_config(), Arc::new(InMemoryWorkStore::new())).unwrap();

    let summary = api::ingest_items(
        &ctx,
        vec![
            request("a", 1.0),
            request("b", 2.0),
            request("a", 1.0),
            request("c", f64::NAN),
            request("", 1.0),
        ],
    );
    assert_eq!(summary.total_received, 5);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(ctx.store().pending_count().unwrap(), 2);
}

#[test]
fn test_ingestion_tally_and_pending_listing() {
    let ctx = AppContext::bootstrap(fast_config(), Arc::new(InMemoryWorkStore::new())).unwrap();

    api::ingest_item(&ctx, request("p-1", 10.25)).unwrap();
    api::ingest_item(&ctx, request("p-2", 4.5)).unwrap();
    api::ingest_item(&ctx, request("p-2", 4.5)).unwrap();
    api::ingest_item(
        &ctx,
        IngestRequest {
            category: "refund".into(),
            arrived_at_ms: Some(1),
            ..request("r-1", 0.75)
        },
    )
    .unwrap();

    let tally = api::ingestion_stats(&ctx).unwrap();
    assert_eq!(tally.total_items, 3);
    assert_eq!(tally.total_volume, 15.5);
    assert_eq!(tally.items_per_category.get("purchase"), Some(&2));
    assert_eq!(tally.items_per_category.get("refund"), Some(&1));
    assert_eq!(tally.unprocessed_items, 3);

    let pending = api::unprocessed_items(&ctx, 2).unwrap();
    assert_eq!(pending.count, 2);
    assert_eq!(pending.items[0].key, "r-1");
    assert!(pending.items.iter().all(|i| !i.processed));

    assert_eq!(api::unprocessed_items(&ctx, 100).unwrap().count, 3);
}

#[test]
fn test_status_and_reports_after_processing() {
    let ctx = AppContext::bootstrap(fast_config(), Arc::new(InMemoryWorkStore::new())).unwrap();
    assert!(!api::health(&ctx).worker_running);

    let reqs = (0..60).map(|i| request(&format!("evt-{i}"), 10.0)).collect();
    api::ingest_items(&ctx, reqs);

    ctx.scheduler().run_once().unwrap();
    ctx.scheduler().run_once().unwrap();

    let status = api::worker_status(&ctx).unwrap();
    assert_eq!(status.stats.total_batches, 2);
    assert_eq!(status.stats.total_items, 60);
    assert_eq!(status.pending_items, 0);
    assert!(!status.is_alive);

    let stats = api::database_stats(&ctx);
    assert_eq!(stats.items.total, 60);
    assert_eq!(stats.items.processed, 60);
    assert_eq!(stats.items.processing_rate_pct, 100.0);
    assert_eq!(stats.batches.total, 2);
    assert_eq!(stats.batches.avg_size, 30.0);
    // 0.35 + 0.15
    assert_eq!(stats.costs.total, 0.5);
    assert_eq!(stats.costs.per_item, 0.0083);

    let recent = api::recent_batches(&ctx, 10);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].size, 50);
    assert_eq!(recent[1].size, 10);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["total_batches"], 2);
    assert_eq!(json["is_alive"], false);
}

#[test]
fn test_metric_log_mirrors_records() {
    let dir = std::env::temp_dir().join(format!("facade_{}", std::process::id()));
    let path = dir.join("cost_metrics.jsonl");
    let _ = std::fs::remove_file(&path);

    let log = JsonlMetricLog::open(&path).unwrap();
    let store = Arc::new(InMemoryWorkStore::new().with_metric_log(log));
    let ctx = AppContext::bootstrap(fast_config(), store).unwrap();
    api::ingest_items(&ctx, (0..5).map(|i| request(&format!("m-{i}"), 3.0)).collect());
    ctx.scheduler().run_once().unwrap();

    let records = JsonlMetricLog::open(&path).unwrap().read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].batch_size, 5);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_stop_async_joins_running_loop() {
    let ctx = AppContext::bootstrap(fast_config(), Arc::new(InMemoryWorkStore::new())).unwrap();
    api::ingest_items(&ctx, (0..25).map(|i| request(&format!("t-{i}"), 1.0)).collect());

    ctx.start().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while ctx.store().pending_count().unwrap() > 0 && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(api::health(&ctx).worker_running);

    assert_eq!(api::stop_async(&ctx).await.unwrap(), StopOutcome::Joined);
    assert_eq!(api::stop_async(&ctx).await.unwrap(), StopOutcome::NotRunning);
    assert_eq!(ctx.scheduler().stats().total_items, 25);
}
