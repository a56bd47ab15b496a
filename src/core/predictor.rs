//! Batch size prediction interface.
//!
//! The scheduler only sees [`BatchSizePredictor`]; whether a size comes from a
//! trained artifact or a constant is decided at composition time.

use serde::{Deserialize, Serialize};

use crate::config::SizingConfig;
use crate::core::SchedulerError;

/// Signals describing the queue and the most recent batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionContext {
    /// Total volume of all pending items.
    pub total_pending_volume: f64,
    /// Average volume of a pending item.
    pub avg_volume_per_item: f64,
    /// Current UTC hour (0-23).
    pub hour_of_day: u8,
    /// Duration of the most recent completed batch, in seconds.
    pub last_processing_secs: f64,
    /// Cost per item assumed for the most recent batch.
    pub last_cost_per_item: f64,
}

impl PredictionContext {
    /// Feature vector in model order.
    #[must_use]
    pub fn features(&self) -> [f64; 5] {
        [
            self.total_pending_volume,
            self.avg_volume_per_item,
            f64::from(self.hour_of_day),
            self.last_processing_secs,
            self.last_cost_per_item,
        ]
    }
}

/// Recommends how many items the next batch should claim.
///
/// Implementations must be deterministic for a fixed artifact and return a
/// size already normalised through [`SizeBounds`].
pub trait BatchSizePredictor: Send + Sync {
    /// Recommended size for the given context.
    fn predict(&self, context: &PredictionContext) -> Result<usize, SchedulerError>;

    /// Whether `predict` may be consulted. Callers fall back to the default size otherwise.
    fn is_ready(&self) -> bool;
}

impl<T: BatchSizePredictor + ?Sized> BatchSizePredictor for Box<T> {
    fn predict(&self, context: &PredictionContext) -> Result<usize, SchedulerError> {
        (**self).predict(context)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

/// Allowed range and granularity of predicted sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBounds {
    /// Smallest size.
    pub min: usize,
    /// Largest size.
    pub max: usize,
    /// Sizes are multiples of this step.
    pub step: usize,
}

impl SizeBounds {
    /// Bounds taken from sizing configuration.
    #[must_use]
    pub const fn from_config(cfg: &SizingConfig) -> Self {
        Self {
            min: cfg.min_batch_size,
            max: cfg.max_batch_size,
            step: cfg.size_step,
        }
    }

    /// Reject bounds that `normalize` cannot honour: a zero step, `min > max`,
    /// or limits off the step grid.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Predictor` describing the violated rule.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.step == 0 {
            return Err(SchedulerError::Predictor("size step must be greater than 0".into()));
        }
        if self.min > self.max {
            return Err(SchedulerError::Predictor(format!(
                "size bounds inverted: min {} > max {}",
                self.min, self.max
            )));
        }
        if self.min % self.step != 0 || self.max % self.step != 0 {
            return Err(SchedulerError::Predictor(format!(
                "size bounds {}..={} are not multiples of step {}",
                self.min, self.max, self.step
            )));
        }
        Ok(())
    }

    /// Round a raw model output to the nearest step (ties to even) and clamp it.
    ///
    /// Non-finite or negative outputs collapse to `min`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn normalize(&self, raw: f64) -> usize {
        if !raw.is_finite() || raw <= 0.0 {
            return self.min;
        }
        let step = self.step.max(1) as f64;
        let rounded = (raw / step).round_ties_even() * step;
        let capped = rounded.min(self.max as f64);
        // inverted bounds resolve to max
        (capped as usize).max(self.min).min(self.max)
    }
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self::from_config(&SizingConfig::default())
    }
}

/// Constant-size predictor for cold start and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizePredictor {
    size: usize,
    ready: bool,
}

impl FixedSizePredictor {
    /// Ready predictor that always recommends `size`.
    #[must_use]
    pub const fn new(size: usize) -> Self {
        Self { size, ready: true }
    }

    /// Predictor that reports not ready, so callers use their own default.
    #[must_use]
    pub const fn not_ready(size: usize) -> Self {
        Self { size, ready: false }
    }
}

impl BatchSizePredictor for FixedSizePredictor {
    fn predict(&self, _context: &PredictionContext) -> Result<usize, SchedulerError> {
        Ok(self.size)
    }

    fn is_ready(&self) -> bool {
        self.ready
    }
}
