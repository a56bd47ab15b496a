//! Core batching abstractions: cost model, predictors, processor, and scheduler.

pub mod artifact;
pub mod cost;
pub mod error;
pub mod predictor;
pub mod processor;
pub mod scheduler;
pub mod stage;
pub mod stats;
pub mod store;
pub mod ticker;
pub mod work;

pub use artifact::{ArtifactPredictor, LinearArtifact, FEATURE_COUNT};
pub use cost::{BatchCost, CostModel};
pub use error::{AppResult, SchedulerError};
pub use predictor::{BatchSizePredictor, FixedSizePredictor, PredictionContext, SizeBounds};
pub use processor::{BatchMetrics, BatchOutcome, BatchProcessor};
pub use scheduler::{Scheduler, StopOutcome};
pub use stage::{ProcessingStage, SimulatedStage};
pub use stats::{StatsSnapshot, WorkerStats};
pub use store::PendingWorkStore;
pub use ticker::{IntervalTicker, StopSignal, Ticker};
pub use work::{
    Batch, BatchStatus, CostMetricRecord, NewWorkItem, PendingAggregate, RecentBatch, WorkItem,
};
