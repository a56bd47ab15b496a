//! Linear batch cost model.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::CostConfig;

/// Cost of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchCost {
    /// Total cost of the batch.
    pub total: f64,
    /// `total / size`, or 0 for an empty batch.
    pub per_item: f64,
}

/// `cost = fixed + variable * size`. Processing time does not enter the formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    fixed_cost: f64,
    variable_cost_per_item: f64,
}

impl CostModel {
    /// Create a model from explicit constants.
    #[must_use]
    pub const fn new(fixed_cost: f64, variable_cost_per_item: f64) -> Self {
        Self {
            fixed_cost,
            variable_cost_per_item,
        }
    }

    /// Create a model from configuration.
    #[must_use]
    pub const fn from_config(cfg: &CostConfig) -> Self {
        Self::new(cfg.fixed_cost, cfg.variable_cost_per_item)
    }

    /// Cost of a batch of `batch_size` items.
    #[must_use]
    pub fn compute(&self, batch_size: usize, _processing_time: Duration) -> BatchCost {
        #[allow(clippy::cast_precision_loss)]
        let size = batch_size as f64;
        let total = size.mul_add(self.variable_cost_per_item, self.fixed_cost);
        let per_item = if batch_size > 0 { total / size } else { 0.0 };
        BatchCost {
            total: round4(total),
            per_item: round4(per_item),
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::from_config(&CostConfig::default())
    }
}

/// Round to four decimal places.
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
