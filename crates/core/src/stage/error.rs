//! Error types for the stage module.

use thiserror::Error;

use super::types::Step;

/// Errors that a stage operation can report for one step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    /// The step ran and failed.
    #[error("{step} failed: {reason}")]
    Failed { step: Step, reason: String },

    /// The step exceeded its deadline.
    #[error("{step} timed out after {timeout_ms} ms")]
    TimedOut { step: Step, timeout_ms: u64 },
}

impl StageError {
    /// Creates a new failed error for the given step.
    pub fn failed(step: Step, reason: impl Into<String>) -> Self {
        Self::Failed {
            step,
            reason: reason.into(),
        }
    }

    /// The step this error refers to.
    pub fn step(&self) -> &Step {
        match self {
            Self::Failed { step, .. } | Self::TimedOut { step, .. } => step,
        }
    }
}
