//! Background batch scheduler.
//!
//! A single dedicated OS thread runs the control loop: pick a batch size, run
//! one batch, update statistics, wait for the ticker, repeat. Failures inside
//! an iteration are logged and the loop carries on after the usual pause.
//!
//! # Lifecycle
//!
//! - `start()` is a no-op while running; otherwise it spawns a fresh loop
//!   thread with its own stop signal and run id.
//! - `stop()` sets the stop signal (waking a sleeping loop) and joins the
//!   thread with a bounded timeout. A loop stuck in a long batch is detached
//!   and `stop()` returns [`StopOutcome::TimedOut`].
//! - Iterations are serialized by an internal lock, so a detached loop and a
//!   restarted one never run batches concurrently.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{SizingConfig, WorkerConfig};
use crate::core::predictor::{BatchSizePredictor, PredictionContext};
use crate::core::processor::{BatchOutcome, BatchProcessor};
use crate::core::stage::ProcessingStage;
use crate::core::stats::{StatsSnapshot, WorkerStats};
use crate::core::store::PendingWorkStore;
use crate::core::ticker::{IntervalTicker, StopSignal, Ticker};
use crate::core::SchedulerError;
use crate::util::clock::{hour_of_day, now_ms};

/// Result of a `stop()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Scheduler was not running; nothing happened.
    NotRunning,
    /// Loop thread exited within the join timeout.
    Joined,
    /// Loop thread did not exit in time and was detached.
    TimedOut,
}

/// State shared between the scheduler handle and its loop thread.
struct Shared<S, G, P> {
    processor: BatchProcessor<S, G>,
    predictor: P,
    sizing: SizingConfig,
    stats: WorkerStats,
    iteration: Mutex<()>,
}

impl<S, G, P> Shared<S, G, P>
where
    S: PendingWorkStore,
    G: ProcessingStage,
    P: BatchSizePredictor,
{
    fn next_batch_size(&self) -> Result<usize, SchedulerError> {
        let fallback = self.sizing.default_batch_size;
        let store = self.processor.store();

        let pending = store.pending_count()?;
        if pending == 0 {
            return Ok(fallback);
        }
        let Some(recent) = store.latest_completed_batch()? else {
            return Ok(fallback);
        };
        if !self.predictor.is_ready() {
            return Ok(fallback);
        }

        let aggregate = store.pending_aggregate()?;
        let context = PredictionContext {
            total_pending_volume: aggregate.total_volume.unwrap_or(0.0),
            avg_volume_per_item: aggregate
                .avg_volume
                .unwrap_or(self.sizing.fallback_avg_volume),
            hour_of_day: hour_of_day(now_ms()),
            last_processing_secs: recent
                .processing_secs
                .unwrap_or(self.sizing.fallback_last_processing_secs),
            last_cost_per_item: self.sizing.fallback_cost_per_item,
        };

        match self.predictor.predict(&context) {
            Ok(size) => {
                self.stats.record_prediction();
                info!(
                    size,
                    pending,
                    total_pending_volume = context.total_pending_volume,
                    "predicted batch size"
                );
                Ok(size)
            }
            Err(err) => {
                warn!(error = %err, fallback, "predictor failed, using default batch size");
                Ok(fallback)
            }
        }
    }

    fn run_iteration(&self) -> Result<Option<BatchOutcome>, SchedulerError> {
        let _serial = self.iteration.lock();

        let size = self.next_batch_size()?;
        let outcome = self.processor.process_batch(size)?;

        match &outcome {
            Some(batch) => {
                self.stats
                    .record_batch(batch.items_processed, batch.cost, now_ms());
                let snap = self.stats.snapshot();
                info!(
                    batch_id = batch.batch_id,
                    requested_size = size,
                    items = batch.items_processed,
                    total_batches = snap.total_batches,
                    total_items = snap.total_items,
                    total_cost = snap.total_cost,
                    predictions_used = snap.predictions_used,
                    "scheduler stats"
                );
            }
            None => debug!(requested_size = size, "no items to process"),
        }
        Ok(outcome)
    }

    /// One loop iteration; nothing escapes it.
    fn run_guarded(&self) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run_iteration())) {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => error!(error = %err, "scheduler iteration failed, retrying after interval"),
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                error!(panic = %msg, "scheduler iteration panicked, retrying after interval");
            }
        }
    }
}

/// Handle to one spawned loop thread.
struct LoopHandle {
    run_id: Uuid,
    signal: Arc<StopSignal>,
    alive: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

/// Clears the alive flag when the loop thread exits, including by panic.
struct AliveGuard(Arc<AtomicBool>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Adaptive batch scheduler running on a dedicated background thread.
pub struct Scheduler<S, G, P> {
    shared: Arc<Shared<S, G, P>>,
    ticker: Arc<dyn Ticker>,
    join_timeout: Duration,
    running: AtomicBool,
    current: Mutex<Option<LoopHandle>>,
}

impl<S, G, P> Scheduler<S, G, P>
where
    S: PendingWorkStore + 'static,
    G: ProcessingStage + 'static,
    P: BatchSizePredictor + 'static,
{
    /// Create a stopped scheduler with zeroed statistics.
    pub fn new(
        processor: BatchProcessor<S, G>,
        predictor: P,
        sizing: SizingConfig,
        worker: &WorkerConfig,
    ) -> Self {
        info!(
            interval_ms = worker.interval_ms,
            default_batch_size = sizing.default_batch_size,
            predictor_ready = predictor.is_ready(),
            "scheduler initialized"
        );
        Self {
            shared: Arc::new(Shared {
                processor,
                predictor,
                sizing,
                stats: WorkerStats::new(),
                iteration: Mutex::new(()),
            }),
            ticker: Arc::new(IntervalTicker::new(worker.interval())),
            join_timeout: worker.join_timeout(),
            running: AtomicBool::new(false),
            current: Mutex::new(None),
        }
    }

    /// Replace the pacing strategy. Takes effect at the next `start()`.
    #[must_use]
    pub fn with_ticker(mut self, ticker: impl Ticker + 'static) -> Self {
        self.ticker = Arc::new(ticker);
        self
    }

    /// Spawn the loop thread. Does nothing if already running.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Spawn` if the OS refuses a new thread.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut current = self.current.lock();
        if self.running.load(Ordering::Acquire) {
            warn!("scheduler already running");
            return Ok(());
        }

        let run_id = Uuid::new_v4();
        let signal = Arc::new(StopSignal::new());
        let alive = Arc::new(AtomicBool::new(true));

        let join = {
            let shared = Arc::clone(&self.shared);
            let ticker = Arc::clone(&self.ticker);
            let signal = Arc::clone(&signal);
            let guard = AliveGuard(Arc::clone(&alive));
            thread::Builder::new()
                .name("batch-scheduler".into())
                .spawn(move || {
                    let _guard = guard;
                    run_loop(&*shared, &*ticker, &signal, run_id);
                })
                .map_err(|e| SchedulerError::Spawn(e.to_string()))?
        };

        self.shared.stats.mark_started(now_ms());
        *current = Some(LoopHandle {
            run_id,
            signal,
            alive,
            join: Some(join),
        });
        self.running.store(true, Ordering::Release);
        info!(%run_id, "scheduler started");
        Ok(())
    }

    /// Signal the loop to exit and wait up to the join timeout for it.
    pub fn stop(&self) -> StopOutcome {
        let (run_id, join) = {
            let mut current = self.current.lock();
            if !self.running.swap(false, Ordering::AcqRel) {
                info!("scheduler not running");
                return StopOutcome::NotRunning;
            }
            let Some(handle) = current.as_mut() else {
                return StopOutcome::NotRunning;
            };
            info!(run_id = %handle.run_id, "stopping scheduler");
            handle.signal.stop();
            (handle.run_id, handle.join.take())
        };

        let outcome = match join {
            Some(join) => join_with_timeout(join, self.join_timeout),
            None => StopOutcome::Joined,
        };
        info!(%run_id, ?outcome, "scheduler stopped");
        outcome
    }

    /// Run one iteration on the calling thread: size decision, batch, statistics.
    ///
    /// Shares the iteration lock with the loop, so it never overlaps a background batch.
    ///
    /// # Errors
    ///
    /// Returns store and stage errors instead of logging them. Predictor
    /// failures fall back to the default size and are not errors.
    pub fn run_once(&self) -> Result<Option<BatchOutcome>, SchedulerError> {
        self.shared.run_iteration()
    }

    /// Batch size the next iteration would request.
    ///
    /// Counts as a prediction when the predictor is consulted.
    ///
    /// # Errors
    ///
    /// Returns store errors from the queue and recent-batch reads.
    pub fn next_batch_size(&self) -> Result<usize, SchedulerError> {
        self.shared.next_batch_size()
    }

    /// Snapshot of statistics plus run state.
    pub fn stats(&self) -> StatsSnapshot {
        let mut snap = self.shared.stats.snapshot();
        let is_running = self.is_running();
        snap.is_running = is_running;
        snap.predictor_ready = self.shared.predictor.is_ready();
        snap.run_id = self
            .current
            .lock()
            .as_ref()
            .map(|h| h.run_id.to_string());
        if is_running {
            #[allow(clippy::cast_precision_loss)]
            let runtime = snap
                .started_at_ms
                .map(|started| now_ms().saturating_sub(u128::from(started)) as f64 / 1000.0);
            snap.runtime_seconds = runtime;
        }
        snap
    }

    /// Whether the scheduler is marked running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether the most recently started loop thread is still executing.
    pub fn is_alive(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|h| h.alive.load(Ordering::Acquire))
    }

    /// Store the scheduler claims from.
    pub fn store(&self) -> &S {
        self.shared.processor.store()
    }

    /// Predictor consulted for batch sizes.
    pub fn predictor(&self) -> &P {
        &self.shared.predictor
    }
}

impl<S, G, P> Drop for Scheduler<S, G, P> {
    fn drop(&mut self) {
        // Signal only; an explicit stop() is required to wait for the thread.
        if self.running.swap(false, Ordering::AcqRel) {
            if let Some(handle) = self.current.lock().as_ref() {
                handle.signal.stop();
            }
            debug!("scheduler dropped while running, loop thread detached");
        }
    }
}

fn run_loop<S, G, P>(
    shared: &Shared<S, G, P>,
    ticker: &dyn Ticker,
    signal: &StopSignal,
    run_id: Uuid,
) where
    S: PendingWorkStore,
    G: ProcessingStage,
    P: BatchSizePredictor,
{
    let span = tracing::info_span!("batch_scheduler", %run_id);
    let _entered = span.enter();
    info!("scheduler loop started");

    while !signal.is_stopped() {
        shared.run_guarded();
        if !ticker.wait(signal) {
            break;
        }
    }

    info!("scheduler loop exited");
}

fn join_with_timeout(join: JoinHandle<()>, timeout: Duration) -> StopOutcome {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let helper = thread::Builder::new()
        .name("batch-scheduler-join".into())
        .spawn(move || {
            let _ = tx.send(join.join().is_ok());
        });
    let helper = match helper {
        Ok(helper) => helper,
        Err(e) => {
            warn!(error = %e, "could not spawn join helper, detaching loop thread");
            return StopOutcome::TimedOut;
        }
    };

    match rx.recv_timeout(timeout) {
        Ok(clean) => {
            if !clean {
                warn!("scheduler loop thread panicked");
            }
            let _ = helper.join();
            StopOutcome::Joined
        }
        Err(_) => {
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            warn!(
                timeout_ms,
                "scheduler loop did not exit within timeout, detaching"
            );
            StopOutcome::TimedOut
        }
    }
}
