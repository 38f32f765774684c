//! Error types for the pipeline module.

use thiserror::Error;

use super::types::WorkItem;
use crate::config::ConfigError;
use crate::stage::{Phase, StageError, Step};

/// Failure of a single item, carried inside its [`Outcome`](super::Outcome).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// A processing step (resize, watermark) failed; the item was never saved.
    #[error("processing {item} failed at {step}: {source}")]
    Processing {
        item: WorkItem,
        step: Step,
        source: StageError,
    },

    /// The save step failed.
    #[error("saving {item} failed: {source}")]
    Save { item: WorkItem, source: StageError },
}

impl PipelineError {
    pub fn processing(item: WorkItem, source: StageError) -> Self {
        Self::Processing {
            item,
            step: source.step().clone(),
            source,
        }
    }

    pub fn save(item: WorkItem, source: StageError) -> Self {
        Self::Save { item, source }
    }

    pub fn item(&self) -> &WorkItem {
        match self {
            Self::Processing { item, .. } | Self::Save { item, .. } => item,
        }
    }

    /// The step that failed.
    pub fn step(&self) -> &Step {
        match self {
            Self::Processing { step, .. } => step,
            Self::Save { source, .. } => source.step(),
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Self::Processing { .. } => Phase::Processing,
            Self::Save { .. } => Phase::Saving,
        }
    }

    pub fn stage_error(&self) -> &StageError {
        match self {
            Self::Processing { source, .. } | Self::Save { source, .. } => source,
        }
    }
}

/// Errors that abort or invalidate a whole run.
///
/// Item failures never show up here; they are reported through outcomes.
#[derive(Debug, Error)]
pub enum RunError {
    /// `run` was called while another run on the same pipeline was active.
    #[error("Pipeline is already running")]
    AlreadyRunning,

    /// The pipeline configuration cannot run (for example a pool with no workers).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A spawned task panicked or was cancelled.
    #[error("Pipeline task {task} failed: {reason}")]
    TaskFailed { task: String, reason: String },

    /// The number of outcomes does not match the number of seeded items.
    #[error("Pipeline lost outcomes: expected {expected}, received {received}")]
    Incomplete { expected: usize, received: usize },

    /// An item produced more than one outcome.
    #[error("Pipeline produced {count} duplicate outcome(s)")]
    DuplicateOutcomes { count: usize },
}

impl RunError {
    pub(crate) fn task_failed(task: impl Into<String>, err: tokio::task::JoinError) -> Self {
        Self::TaskFailed {
            task: task.into(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_processing_error_names_step_and_item() {
        let err = PipelineError::processing(
            WorkItem::new("wedding.jpg"),
            StageError::failed(Step::resize("medium"), "resize failed"),
        );

        assert_eq!(
            err.to_string(),
            "processing wedding.jpg failed at resize medium: resize medium failed: resize failed"
        );
        assert_eq!(err.phase(), Phase::Processing);
        assert_eq!(err.step(), &Step::resize("medium"));
        assert_eq!(err.item().name(), "wedding.jpg");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_save_error() {
        let err = PipelineError::save(
            WorkItem::new("nature2.jpg"),
            StageError::failed(Step::Save, "save failed"),
        );

        assert_eq!(err.phase(), Phase::Saving);
        assert_eq!(err.step(), &Step::Save);
        assert!(err.to_string().starts_with("saving nature2.jpg failed"));
    }

    #[test]
    fn test_run_error_messages() {
        let err = RunError::Incomplete {
            expected: 6,
            received: 5,
        };
        assert_eq!(
            err.to_string(),
            "Pipeline lost outcomes: expected 6, received 5"
        );
        assert_eq!(
            RunError::AlreadyRunning.to_string(),
            "Pipeline is already running"
        );
    }
}
