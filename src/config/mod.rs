//! Configuration models for cost, processing, sizing, and loop pacing.

pub mod batcher;

pub use batcher::{
    BatcherConfig, CostConfig, PredictorConfig, ProcessingConfig, SizingConfig, WorkerConfig,
};
