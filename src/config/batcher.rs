//! Batcher configuration structures.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Linear cost model constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Cost charged once per batch.
    pub fixed_cost: f64,
    /// Cost charged per item in the batch.
    pub variable_cost_per_item: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            fixed_cost: 0.10,
            variable_cost_per_item: 0.005,
        }
    }
}

/// Simulated processing stage parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Seconds of work per volume unit.
    pub secs_per_volume_unit: f64,
    /// Seconds added to every batch.
    pub fixed_overhead_secs: f64,
    /// Lower bound of the multiplicative jitter.
    pub jitter_min: f64,
    /// Upper bound of the multiplicative jitter.
    pub jitter_max: f64,
    /// Whether the simulated stage actually blocks for the computed duration.
    pub simulate_delay: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            secs_per_volume_unit: 0.02,
            fixed_overhead_secs: 0.5,
            jitter_min: 0.8,
            jitter_max: 1.2,
            simulate_delay: true,
        }
    }
}

/// Batch sizing bounds and fallbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Size used whenever the predictor cannot be consulted.
    pub default_batch_size: usize,
    /// Smallest size a prediction may produce.
    pub min_batch_size: usize,
    /// Largest size a prediction may produce.
    pub max_batch_size: usize,
    /// Predictions are rounded to a multiple of this step.
    pub size_step: usize,
    /// Average volume per item assumed when the pending aggregate is null.
    pub fallback_avg_volume: f64,
    /// Cost per item fed to the predictor in place of a measured value.
    pub fallback_cost_per_item: f64,
    /// Processing time assumed when the recent batch has none recorded.
    pub fallback_last_processing_secs: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 50,
            min_batch_size: 20,
            max_batch_size: 200,
            size_step: 10,
            fallback_avg_volume: 15.0,
            fallback_cost_per_item: 0.007,
            fallback_last_processing_secs: 5.0,
        }
    }
}

/// Background loop pacing and lifecycle settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Pause between iterations in milliseconds.
    pub interval_ms: u64,
    /// How long `stop()` waits for the loop thread to exit.
    pub join_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            join_timeout_ms: 5_000,
        }
    }
}

impl WorkerConfig {
    /// Iteration interval as a `Duration`.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Join timeout as a `Duration`.
    #[must_use]
    pub const fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Predictor artifact location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Path to a trained artifact (JSON). `None` means cold start.
    pub artifact_path: Option<PathBuf>,
}

/// Root batcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// Cost model constants.
    pub cost: CostConfig,
    /// Processing stage parameters.
    pub processing: ProcessingConfig,
    /// Sizing bounds and fallbacks.
    pub sizing: SizingConfig,
    /// Loop pacing.
    pub worker: WorkerConfig,
    /// Predictor artifact.
    pub predictor: PredictorConfig,
}

impl CostConfig {
    /// Validate cost constants.
    pub fn validate(&self) -> Result<(), String> {
        if !non_negative(self.fixed_cost) {
            return Err("fixed_cost must be non-negative".into());
        }
        if !non_negative(self.variable_cost_per_item) {
            return Err("variable_cost_per_item must be non-negative".into());
        }
        Ok(())
    }
}

impl ProcessingConfig {
    /// Validate processing parameters.
    pub fn validate(&self) -> Result<(), String> {
        if !non_negative(self.secs_per_volume_unit) {
            return Err("secs_per_volume_unit must be non-negative".into());
        }
        if !non_negative(self.fixed_overhead_secs) {
            return Err("fixed_overhead_secs must be non-negative".into());
        }
        if !self.jitter_min.is_finite() || self.jitter_min <= 0.0 {
            return Err("jitter_min must be a finite number greater than 0".into());
        }
        if !self.jitter_max.is_finite() {
            return Err("jitter_max must be finite".into());
        }
        if self.jitter_min > self.jitter_max {
            return Err("jitter_min must not exceed jitter_max".into());
        }
        Ok(())
    }
}

impl SizingConfig {
    /// Validate sizing bounds and fallbacks.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_batch_size == 0 {
            return Err("min_batch_size must be greater than 0".into());
        }
        if self.min_batch_size > self.max_batch_size {
            return Err("min_batch_size must not exceed max_batch_size".into());
        }
        if self.size_step == 0 {
            return Err("size_step must be greater than 0".into());
        }
        if self.min_batch_size % self.size_step != 0 || self.max_batch_size % self.size_step != 0 {
            return Err(format!(
                "min_batch_size and max_batch_size must be multiples of size_step {}",
                self.size_step
            ));
        }
        if self.default_batch_size < self.min_batch_size
            || self.default_batch_size > self.max_batch_size
        {
            return Err(format!(
                "default_batch_size {} outside [{}, {}]",
                self.default_batch_size, self.min_batch_size, self.max_batch_size
            ));
        }
        if !non_negative(self.fallback_avg_volume)
            || !non_negative(self.fallback_cost_per_item)
            || !non_negative(self.fallback_last_processing_secs)
        {
            return Err("sizing fallbacks must be non-negative".into());
        }
        Ok(())
    }
}

impl WorkerConfig {
    /// Validate pacing values.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_ms == 0 {
            return Err("interval_ms must be greater than 0".into());
        }
        if self.join_timeout_ms == 0 {
            return Err("join_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }
}

impl BatcherConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.cost.validate().map_err(|e| format!("cost: {e}"))?;
        self.processing
            .validate()
            .map_err(|e| format!("processing: {e}"))?;
        self.sizing.validate().map_err(|e| format!("sizing: {e}"))?;
        self.worker.validate().map_err(|e| format!("worker: {e}"))?;
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields take defaults.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults, a `.env` file if present, and `BATCHER_*` variables.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from defaults overridden through `lookup`, then validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        override_from(&lookup, "BATCHER_FIXED_COST", &mut cfg.cost.fixed_cost)?;
        override_from(
            &lookup,
            "BATCHER_VARIABLE_COST",
            &mut cfg.cost.variable_cost_per_item,
        )?;
        override_from(
            &lookup,
            "BATCHER_SECS_PER_VOLUME_UNIT",
            &mut cfg.processing.secs_per_volume_unit,
        )?;
        override_from(
            &lookup,
            "BATCHER_FIXED_OVERHEAD_SECS",
            &mut cfg.processing.fixed_overhead_secs,
        )?;
        override_from(&lookup, "BATCHER_JITTER_MIN", &mut cfg.processing.jitter_min)?;
        override_from(&lookup, "BATCHER_JITTER_MAX", &mut cfg.processing.jitter_max)?;
        override_from(
            &lookup,
            "BATCHER_SIMULATE_DELAY",
            &mut cfg.processing.simulate_delay,
        )?;
        override_from(
            &lookup,
            "BATCHER_DEFAULT_BATCH_SIZE",
            &mut cfg.sizing.default_batch_size,
        )?;
        override_from(&lookup, "BATCHER_MIN_BATCH_SIZE", &mut cfg.sizing.min_batch_size)?;
        override_from(&lookup, "BATCHER_MAX_BATCH_SIZE", &mut cfg.sizing.max_batch_size)?;
        override_from(&lookup, "BATCHER_SIZE_STEP", &mut cfg.sizing.size_step)?;
        override_from(
            &lookup,
            "BATCHER_FALLBACK_AVG_VOLUME",
            &mut cfg.sizing.fallback_avg_volume,
        )?;
        override_from(
            &lookup,
            "BATCHER_FALLBACK_COST_PER_ITEM",
            &mut cfg.sizing.fallback_cost_per_item,
        )?;
        override_from(
            &lookup,
            "BATCHER_FALLBACK_LAST_PROCESSING_SECS",
            &mut cfg.sizing.fallback_last_processing_secs,
        )?;
        override_from(&lookup, "BATCHER_INTERVAL_MS", &mut cfg.worker.interval_ms)?;
        override_from(
            &lookup,
            "BATCHER_JOIN_TIMEOUT_MS",
            &mut cfg.worker.join_timeout_ms,
        )?;
        if let Some(path) = lookup("BATCHER_ARTIFACT_PATH").filter(|p| !p.is_empty()) {
            cfg.predictor.artifact_path = Some(PathBuf::from(path));
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

// NaN and infinities fail this check.
fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn override_from<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<(), String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| format!("{key}={raw:?} invalid: {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = BatcherConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.sizing.default_batch_size, 50);
        assert_eq!(cfg.worker.join_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BATCHER_FIXED_COST", "0.2"),
            ("BATCHER_INTERVAL_MS", " 250 "),
            ("BATCHER_SIMULATE_DELAY", "false"),
            ("BATCHER_ARTIFACT_PATH", "/tmp/model.json"),
        ]
        .into_iter()
        .collect();

        let cfg = BatcherConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string())).unwrap();
        assert!((cfg.cost.fixed_cost - 0.2).abs() < f64::EPSILON);
        assert_eq!(cfg.worker.interval_ms, 250);
        assert!(!cfg.processing.simulate_delay);
        assert_eq!(
            cfg.predictor.artifact_path,
            Some(PathBuf::from("/tmp/model.json"))
        );
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = BatcherConfig::from_lookup(|k| {
            (k == "BATCHER_DEFAULT_BATCH_SIZE").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.contains("BATCHER_DEFAULT_BATCH_SIZE"));
    }

    #[test]
    fn test_from_lookup_validates_result() {
        let err = BatcherConfig::from_lookup(|k| {
            (k == "BATCHER_DEFAULT_BATCH_SIZE").then(|| "500".to_string())
        })
        .unwrap_err();
        assert!(err.starts_with("sizing:"));
    }

    #[test]
    fn test_from_lookup_rejects_infinite_values() {
        for key in [
            "BATCHER_JITTER_MAX",
            "BATCHER_JITTER_MIN",
            "BATCHER_SECS_PER_VOLUME_UNIT",
            "BATCHER_FIXED_OVERHEAD_SECS",
            "BATCHER_FIXED_COST",
            "BATCHER_VARIABLE_COST",
            "BATCHER_FALLBACK_AVG_VOLUME",
            "BATCHER_FALLBACK_LAST_PROCESSING_SECS",
        ] {
            let result = BatcherConfig::from_lookup(|k| {
                if k == key {
                    Some("inf".to_string())
                } else if k == "BATCHER_SIMULATE_DELAY" {
                    Some("false".to_string())
                } else {
                    None
                }
            });
            assert!(result.is_err(), "{key}=inf was accepted");
        }
    }

    #[test]
    fn test_from_lookup_fallback_last_processing_secs() {
        let cfg = BatcherConfig::from_lookup(|k| {
            (k == "BATCHER_FALLBACK_LAST_PROCESSING_SECS").then(|| "7.5".to_string())
        })
        .unwrap();
        assert!((cfg.sizing.fallback_last_processing_secs - 7.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bounds_must_sit_on_step_grid() {
        let mut cfg = BatcherConfig::default();
        cfg.sizing.min_batch_size = 25;
        let err = cfg.validate().unwrap_err();
        assert!(err.starts_with("sizing:"));
        assert!(err.contains("size_step"));
    }
}
