//! Scheduler statistics.
//!
//! The loop iteration is the only writer. Readers never lock: they copy the
//! atomics into a [`StatsSnapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time copy of the scheduler statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Batches processed since construction.
    pub total_batches: u64,
    /// Items processed since construction.
    pub total_items: u64,
    /// Cost accumulated since construction.
    pub total_cost: f64,
    /// Size decisions taken from the predictor.
    pub predictions_used: u64,
    /// Start time of the current (or last) run, ms since epoch.
    pub started_at_ms: Option<u64>,
    /// Time of the last successful batch, ms since epoch.
    pub last_batch_at_ms: Option<u64>,
    /// Seconds since `started_at_ms`, only while running.
    pub runtime_seconds: Option<f64>,
    /// Whether the scheduler is marked running.
    pub is_running: bool,
    /// Whether the predictor reported ready at snapshot time.
    pub predictor_ready: bool,
    /// Identifier of the current (or last) run.
    pub run_id: Option<String>,
}

/// Cumulative counters owned by the scheduler loop.
#[derive(Debug, Default)]
pub struct WorkerStats {
    total_batches: AtomicU64,
    total_items: AtomicU64,
    // f64 bits
    total_cost: AtomicU64,
    predictions_used: AtomicU64,
    // 0 = unset
    started_at_ms: AtomicU64,
    last_batch_at_ms: AtomicU64,
}

impl WorkerStats {
    /// Fresh counters, all zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful batch.
    pub(crate) fn record_batch(&self, items: usize, cost: f64, at_ms: u128) {
        self.total_batches.fetch_add(1, Ordering::Relaxed);
        self.total_items
            .fetch_add(u64::try_from(items).unwrap_or(u64::MAX), Ordering::Relaxed);
        let total = f64::from_bits(self.total_cost.load(Ordering::Relaxed)) + cost;
        self.total_cost.store(total.to_bits(), Ordering::Relaxed);
        self.last_batch_at_ms.store(clamp_ms(at_ms), Ordering::Release);
    }

    /// Record a size decision taken from the predictor.
    pub(crate) fn record_prediction(&self) {
        self.predictions_used.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset the run start time. Cumulative counters are untouched.
    pub(crate) fn mark_started(&self, at_ms: u128) {
        self.started_at_ms.store(clamp_ms(at_ms), Ordering::Release);
    }

    /// Copy the counters. Run-state fields are left at their defaults.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_batches: self.total_batches.load(Ordering::Relaxed),
            total_items: self.total_items.load(Ordering::Relaxed),
            total_cost: f64::from_bits(self.total_cost.load(Ordering::Relaxed)),
            predictions_used: self.predictions_used.load(Ordering::Relaxed),
            started_at_ms: non_zero(self.started_at_ms.load(Ordering::Acquire)),
            last_batch_at_ms: non_zero(self.last_batch_at_ms.load(Ordering::Acquire)),
            ..StatsSnapshot::default()
        }
    }
}

fn clamp_ms(ms: u128) -> u64 {
    u64::try_from(ms).unwrap_or(u64::MAX).max(1)
}

const fn non_zero(value: u64) -> Option<u64> {
    if value == 0 {
        None
    } else {
        Some(value)
    }
}
