//! Types for the stage module.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::PipelineConfig;

/// Pipeline phase a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Transformation steps run by the processor pool.
    Processing,
    /// Persistence step run by the saver pool.
    Saving,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Processing => "processing",
            Phase::Saving => "saving",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a step, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Resize,
    Watermark,
    Save,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Resize => "resize",
            StepKind::Watermark => "watermark",
            StepKind::Save => "save",
        }
    }
}

/// A single unit of work applied to an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Resize to a named variant (e.g. "thumbnail").
    Resize { variant: String },
    /// Apply the watermark.
    Watermark,
    /// Persist the processed item.
    Save,
}

impl Step {
    pub fn resize(variant: impl Into<String>) -> Self {
        Step::Resize {
            variant: variant.into(),
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            Step::Resize { .. } => StepKind::Resize,
            Step::Watermark => StepKind::Watermark,
            Step::Save => StepKind::Save,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Step::Resize { .. } | Step::Watermark => Phase::Processing,
            Step::Save => Phase::Saving,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Resize { variant } => write!(f, "resize {}", variant),
            Step::Watermark => f.write_str("watermark"),
            Step::Save => f.write_str("save"),
        }
    }
}

/// Ordered processing steps run for every item before it is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    steps: Vec<Step>,
}

impl StepPlan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Builds the plan from the configured resize variants and watermark flag.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut steps: Vec<Step> = config
            .resize_variants
            .iter()
            .map(|v| Step::resize(v.as_str()))
            .collect();
        if config.watermark {
            steps.push(Step::Watermark);
        }
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
