//! Processing stage strategies.
//!
//! The processor hands each claimed batch to a [`ProcessingStage`] and only
//! cares about the elapsed duration it reports. Production deployments plug in
//! the real transformation; [`SimulatedStage`] models its timing.

use std::time::Duration;

use rand::Rng;

use crate::config::ProcessingConfig;
use crate::core::processor::BatchMetrics;
use crate::core::SchedulerError;

/// Work performed on a claimed batch.
pub trait ProcessingStage: Send + Sync {
    /// Process the batch described by `metrics` and return the elapsed duration.
    fn run(&self, metrics: &BatchMetrics) -> Result<Duration, SchedulerError>;
}

/// Timed placeholder: `volume * rate * jitter + overhead`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedStage {
    secs_per_volume_unit: f64,
    fixed_overhead_secs: f64,
    jitter_min: f64,
    jitter_max: f64,
    sleep: bool,
}

impl SimulatedStage {
    /// Create a stage from configuration.
    #[must_use]
    pub const fn from_config(cfg: &ProcessingConfig) -> Self {
        Self {
            secs_per_volume_unit: cfg.secs_per_volume_unit,
            fixed_overhead_secs: cfg.fixed_overhead_secs,
            jitter_min: cfg.jitter_min,
            jitter_max: cfg.jitter_max,
            sleep: cfg.simulate_delay,
        }
    }

    /// Same stage, but report the duration without blocking for it.
    #[must_use]
    pub const fn without_delay(mut self) -> Self {
        self.sleep = false;
        self
    }

    /// Duration the stage would take for `total_volume` with the given jitter factor.
    #[must_use]
    pub fn modeled_secs(&self, total_volume: f64, jitter: f64) -> f64 {
        (total_volume * self.secs_per_volume_unit).mul_add(jitter, self.fixed_overhead_secs)
    }

    fn jitter(&self) -> Result<f64, SchedulerError> {
        if !self.jitter_min.is_finite() || !self.jitter_max.is_finite() {
            return Err(SchedulerError::Stage(format!(
                "jitter bounds must be finite, got {}..={}",
                self.jitter_min, self.jitter_max
            )));
        }
        if self.jitter_max > self.jitter_min {
            Ok(rand::rng().random_range(self.jitter_min..=self.jitter_max))
        } else {
            Ok(self.jitter_min)
        }
    }
}

impl Default for SimulatedStage {
    fn default() -> Self {
        Self::from_config(&ProcessingConfig::default())
    }
}

impl ProcessingStage for SimulatedStage {
    fn run(&self, metrics: &BatchMetrics) -> Result<Duration, SchedulerError> {
        let secs = self.modeled_secs(metrics.total_volume, self.jitter()?);
        let duration = Duration::try_from_secs_f64(secs)
            .map_err(|e| SchedulerError::Stage(format!("invalid modeled duration {secs}: {e}")))?;

        tracing::debug!(
            items = metrics.size,
            total_volume = metrics.total_volume,
            secs,
            "processing batch"
        );
        if self.sleep {
            std::thread::sleep(duration);
        }
        Ok(duration)
    }
}
