//! Iteration pacing.
//!
//! The loop asks a [`Ticker`] to wait between iterations. [`IntervalTicker`]
//! blocks on the run's [`StopSignal`], so `stop()` wakes a sleeping loop
//! instead of waiting out the interval.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// One-shot stop flag with Condvar notification.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    /// Unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter.
    pub fn stop(&self) {
        let mut stopped = self.stopped.lock();
        *stopped = true;
        drop(stopped);
        self.condvar.notify_all();
    }

    /// Whether `stop` has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Block until stopped or `timeout` elapses. Returns whether the signal is set.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.condvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

/// Paces loop iterations.
pub trait Ticker: Send + Sync {
    /// Wait before the next iteration. Returns `false` when the loop should exit.
    fn wait(&self, signal: &StopSignal) -> bool;
}

/// Fixed pause between iterations, cut short by the stop signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalTicker {
    interval: Duration,
}

impl IntervalTicker {
    /// Ticker with the given pause.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Configured pause.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl Ticker for IntervalTicker {
    fn wait(&self, signal: &StopSignal) -> bool {
        !signal.wait_for(self.interval)
    }
}
