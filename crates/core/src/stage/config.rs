//! Configuration for the simulated stage.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::types::StepKind;

/// Timing and failure behaviour of one step kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepProfile {
    /// How long the step takes, in milliseconds.
    pub duration_ms: u64,

    /// Probability in [0, 1] that the step fails.
    pub failure_rate: f64,
}

impl StepProfile {
    pub fn new(duration_ms: u64, failure_rate: f64) -> Self {
        Self {
            duration_ms,
            failure_rate,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Configuration for [`SimulatedStage`](super::SimulatedStage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed for reproducible failures. Uses OS entropy when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Applied to every resize variant.
    #[serde(default = "default_resize")]
    pub resize: StepProfile,

    #[serde(default = "default_watermark")]
    pub watermark: StepProfile,

    #[serde(default = "default_save")]
    pub save: StepProfile,
}

fn default_resize() -> StepProfile {
    StepProfile::new(300, 0.05)
}

fn default_watermark() -> StepProfile {
    StepProfile::new(200, 0.05)
}

fn default_save() -> StepProfile {
    StepProfile::new(500, 0.10)
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            resize: default_resize(),
            watermark: default_watermark(),
            save: default_save(),
        }
    }
}

impl SimulationConfig {
    /// A configuration where every step succeeds after `duration_ms`.
    pub fn reliable(duration_ms: u64) -> Self {
        let profile = StepProfile::new(duration_ms, 0.0);
        Self {
            seed: None,
            resize: profile,
            watermark: profile,
            save: profile,
        }
    }

    /// Sets the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Profile for the given step kind.
    pub fn profile(&self, kind: StepKind) -> &StepProfile {
        match kind {
            StepKind::Resize => &self.resize,
            StepKind::Watermark => &self.watermark,
            StepKind::Save => &self.save,
        }
    }
}
