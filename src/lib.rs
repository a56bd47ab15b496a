//! # Adaptive Batcher
//!
//! A background batch scheduler that sizes every batch to keep cost per item low.
//!
//! Producers insert work items into a pending-work store. A dedicated OS
//! thread repeatedly decides how many items to claim, processes them as one
//! batch, prices the batch with a linear cost model, persists the outcome, and
//! updates running statistics. Transient store or stage failures are logged
//! and retried on the next iteration; the loop never dies from them.
//!
//! ## Sizing
//!
//! Batch size comes from a [`core::BatchSizePredictor`]. Until a trained
//! artifact is available (cold start), or when the queue is empty, or when no
//! batch has completed yet, the configured default size is used instead.
//! Predicted sizes are rounded to the nearest step and clamped to the
//! configured bounds.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adaptive_batcher::config::BatcherConfig;
//! use adaptive_batcher::infra::InMemoryWorkStore;
//! use adaptive_batcher::runtime::{api, AppContext};
//!
//! let ctx = AppContext::bootstrap(BatcherConfig::default(), Arc::new(InMemoryWorkStore::new()))?;
//! ctx.start()?;
//! api::ingest_item(&ctx, request)?;
//! let status = api::worker_status(&ctx)?;
//! ctx.shutdown();
//! ```
//!
//! See `tests/scheduler_lifecycle_test.rs` for start/stop semantics.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core batching abstractions: cost model, predictors, processor, and scheduler.
pub mod core;
/// Configuration models for cost, processing, sizing, and loop pacing.
pub mod config;
/// Builders to construct the scheduler from configuration.
pub mod builders;
/// Infrastructure adapters for the pending-work store and metric log.
pub mod infra;
/// Composition root and façade API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
