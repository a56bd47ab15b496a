//! Composition root owning configuration, store, and scheduler.

use std::sync::Arc;

use anyhow::Context;

use crate::builders::{build_scheduler, DefaultScheduler};
use crate::config::BatcherConfig;
use crate::core::{AppResult, SchedulerError, StopOutcome};
use crate::infra::{InMemoryWorkStore, JsonlMetricLog};
use crate::util::telemetry::init_tracing;

/// Scheduler type the application runs.
pub type AppScheduler = DefaultScheduler<Arc<InMemoryWorkStore>>;

/// Everything the façade needs, injected at startup. Cloning shares the same scheduler.
#[derive(Clone)]
pub struct AppContext {
    config: Arc<BatcherConfig>,
    store: Arc<InMemoryWorkStore>,
    scheduler: Arc<AppScheduler>,
}

impl AppContext {
    /// Build the scheduler around `store`. The loop is not started.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` when `config` fails validation.
    pub fn bootstrap(
        config: BatcherConfig,
        store: Arc<InMemoryWorkStore>,
    ) -> Result<Self, SchedulerError> {
        init_tracing();
        let scheduler = build_scheduler(&config, Arc::clone(&store))?;
        Ok(Self {
            config: Arc::new(config),
            store,
            scheduler: Arc::new(scheduler),
        })
    }

    /// Load configuration from the environment and bootstrap with a fresh store.
    ///
    /// `BATCHER_METRIC_LOG` names an optional JSONL file mirroring cost metrics.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or an unusable metric log path.
    pub fn from_env() -> AppResult<Self> {
        let config = BatcherConfig::from_env()
            .map_err(anyhow::Error::msg)
            .context("loading batcher configuration")?;

        let mut store = InMemoryWorkStore::new();
        if let Ok(path) = std::env::var("BATCHER_METRIC_LOG") {
            let log = JsonlMetricLog::open(&path)
                .with_context(|| format!("opening metric log {path}"))?;
            store = store.with_metric_log(log);
        }

        Self::bootstrap(config, Arc::new(store)).context("bootstrapping scheduler")
    }

    /// Start the background loop.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Spawn` if the loop thread cannot be created.
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.scheduler.start()
    }

    /// Stop the background loop, waiting up to the configured join timeout.
    pub fn shutdown(&self) -> StopOutcome {
        self.scheduler.stop()
    }

    /// Active configuration.
    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    /// Shared store.
    pub fn store(&self) -> &Arc<InMemoryWorkStore> {
        &self.store
    }

    /// Shared scheduler.
    pub fn scheduler(&self) -> &Arc<AppScheduler> {
        &self.scheduler
    }
}
