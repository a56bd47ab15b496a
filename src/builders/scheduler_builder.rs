//! Builds a ready-to-start scheduler from configuration.

use crate::config::BatcherConfig;
use crate::core::{
    ArtifactPredictor, BatchProcessor, CostModel, PendingWorkStore, Scheduler, SchedulerError,
    SimulatedStage, SizeBounds,
};

/// Scheduler assembled with the default stage and predictor.
pub type DefaultScheduler<S> = Scheduler<S, SimulatedStage, ArtifactPredictor>;

/// Validate `cfg` and wire cost model, simulated stage, and predictor around `store`.
///
/// A configured artifact that fails to load is logged and replaced by a
/// not-ready predictor, so the scheduler starts on the default size.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidConfig` when validation fails.
pub fn build_scheduler<S>(cfg: &BatcherConfig, store: S) -> Result<DefaultScheduler<S>, SchedulerError>
where
    S: PendingWorkStore + 'static,
{
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;

    let bounds = SizeBounds::from_config(&cfg.sizing);
    let predictor = match &cfg.predictor.artifact_path {
        Some(path) => ArtifactPredictor::load(path, bounds).unwrap_or_else(|err| {
            tracing::warn!(path = %path.display(), error = %err, "predictor artifact unavailable, cold start");
            ArtifactPredictor::not_ready(bounds)
        }),
        None => {
            tracing::info!("no predictor artifact configured, cold start");
            ArtifactPredictor::not_ready(bounds)
        }
    };

    let processor = BatchProcessor::new(
        store,
        SimulatedStage::from_config(&cfg.processing),
        CostModel::from_config(&cfg.cost),
    );
    Ok(Scheduler::new(processor, predictor, cfg.sizing.clone(), &cfg.worker))
}
