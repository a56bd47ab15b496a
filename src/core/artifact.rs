//! Predictor adapter over a trained artifact.
//!
//! The offline trainer fits a standard-scaled linear regressor from the cost
//! metric records and exports it as JSON. This module only loads and applies it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::predictor::{BatchSizePredictor, PredictionContext, SizeBounds};
use crate::core::SchedulerError;

/// Number of context features the artifact is trained on.
pub const FEATURE_COUNT: usize = 5;

/// Trained, standard-scaled linear model over the prediction context features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearArtifact {
    /// Per-feature mean used for scaling.
    pub feature_means: [f64; FEATURE_COUNT],
    /// Per-feature standard deviation used for scaling.
    pub feature_scales: [f64; FEATURE_COUNT],
    /// Coefficients applied to scaled features.
    pub coefficients: [f64; FEATURE_COUNT],
    /// Model intercept.
    pub intercept: f64,
    /// Number of batches the trainer fitted on, informational.
    #[serde(default)]
    pub training_samples: Option<usize>,
}

impl LinearArtifact {
    /// Parse and validate an artifact from JSON.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let artifact: Self = serde_json::from_str(input)
            .map_err(|e| SchedulerError::Artifact(format!("parse error: {e}")))?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Serialize to JSON.
    pub fn to_json_string(&self) -> Result<String, SchedulerError> {
        serde_json::to_string_pretty(self).map_err(|e| SchedulerError::Artifact(e.to_string()))
    }

    /// Reject non-finite parameters and zero scales.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let finite = self
            .feature_means
            .iter()
            .chain(&self.feature_scales)
            .chain(&self.coefficients)
            .chain(std::iter::once(&self.intercept))
            .all(|v| v.is_finite());
        if !finite {
            return Err(SchedulerError::Artifact(
                "artifact contains non-finite parameters".into(),
            ));
        }
        if let Some(idx) = self.feature_scales.iter().position(|s| *s == 0.0) {
            return Err(SchedulerError::Artifact(format!(
                "feature scale {idx} is zero"
            )));
        }
        Ok(())
    }

    /// Raw regression output for a feature vector.
    #[must_use]
    pub fn evaluate(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        features
            .iter()
            .zip(&self.feature_means)
            .zip(&self.feature_scales)
            .zip(&self.coefficients)
            .fold(self.intercept, |acc, (((x, mean), scale), coef)| {
                ((x - mean) / scale).mul_add(*coef, acc)
            })
    }
}

/// [`BatchSizePredictor`] backed by an optional [`LinearArtifact`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPredictor {
    artifact: Option<LinearArtifact>,
    bounds: SizeBounds,
}

impl ArtifactPredictor {
    /// Wrap an already-loaded artifact.
    pub fn from_artifact(
        artifact: LinearArtifact,
        bounds: SizeBounds,
    ) -> Result<Self, SchedulerError> {
        artifact.validate()?;
        bounds.validate()?;
        Ok(Self {
            artifact: Some(artifact),
            bounds,
        })
    }

    /// Load an artifact from a JSON file.
    pub fn load(path: impl AsRef<Path>, bounds: SizeBounds) -> Result<Self, SchedulerError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| SchedulerError::Artifact(format!("{}: {e}", path.display())))?;
        let artifact = LinearArtifact::from_json_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            training_samples = ?artifact.training_samples,
            "batch size artifact loaded"
        );
        Self::from_artifact(artifact, bounds)
    }

    /// Adapter with no artifact; reports not ready.
    #[must_use]
    pub const fn not_ready(bounds: SizeBounds) -> Self {
        Self {
            artifact: None,
            bounds,
        }
    }

    /// Bounds applied to every prediction.
    #[must_use]
    pub const fn bounds(&self) -> SizeBounds {
        self.bounds
    }
}

impl BatchSizePredictor for ArtifactPredictor {
    fn predict(&self, context: &PredictionContext) -> Result<usize, SchedulerError> {
        let artifact = self
            .artifact
            .as_ref()
            .ok_or_else(|| SchedulerError::Predictor("no trained artifact loaded".into()))?;
        Ok(self.bounds.normalize(artifact.evaluate(&context.features())))
    }

    fn is_ready(&self) -> bool {
        self.artifact.is_some()
    }
}
