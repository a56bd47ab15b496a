//! Error types for batch scheduling operations.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Pending-work store read or write failed; treated as transient by the loop.
    #[error("store error: {0}")]
    Store(String),
    /// Predictor failed to produce a size.
    #[error("predictor error: {0}")]
    Predictor(String),
    /// Processing stage failed for a claimed batch.
    #[error("processing stage error: {0}")]
    Stage(String),
    /// Predictor artifact could not be read or is malformed.
    #[error("artifact error: {0}")]
    Artifact(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Submitted work item was rejected before reaching the store.
    #[error("invalid work item: {0}")]
    InvalidItem(String),
    /// Loop thread could not be spawned.
    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
