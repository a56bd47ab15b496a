//! Serializable identifiers and labels shared across the crate.

use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a work item.
pub type ItemId = u64;

/// Store-assigned identifier of a batch.
pub type BatchId = u64;

/// Priority label carried by a work item.
///
/// Claim order is arrival order; the label is recorded, not used for ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Low priority.
    #[default]
    Low,
    /// Medium priority.
    Medium,
    /// High priority.
    High,
}

