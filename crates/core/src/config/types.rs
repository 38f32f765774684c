use serde::{Deserialize, Serialize};

use crate::stage::SimulationConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Pipeline sizing and processing plan.
///
/// Queue capacities left unset are derived from the worker counts of the pool
/// that consumes them.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Number of processor workers (default: host parallelism).
    #[serde(default = "default_processor_workers")]
    pub processor_workers: usize,

    /// Number of saver workers (default: twice the host parallelism).
    #[serde(default = "default_saver_workers")]
    pub saver_workers: usize,

    /// Input queue capacity (default: 2x processor workers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_queue_capacity: Option<usize>,

    /// Save queue capacity (default: 2x saver workers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_queue_capacity: Option<usize>,

    /// Result stream capacity (default: 2x all workers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_queue_capacity: Option<usize>,

    /// Resize variants applied in order before the watermark.
    #[serde(default = "default_resize_variants")]
    pub resize_variants: Vec<String>,

    /// Whether the watermark step runs after resizing.
    #[serde(default = "default_watermark")]
    pub watermark: bool,

    /// Per-step deadline in milliseconds. No deadline when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_timeout_ms: Option<u64>,
}

/// Number of parallelism units reported by the host, at least 1.
pub fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_processor_workers() -> usize {
    host_parallelism()
}

fn default_saver_workers() -> usize {
    host_parallelism() * 2
}

fn default_resize_variants() -> Vec<String> {
    vec![
        "thumbnail".to_string(),
        "medium".to_string(),
        "large".to_string(),
    ]
}

fn default_watermark() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            processor_workers: default_processor_workers(),
            saver_workers: default_saver_workers(),
            input_queue_capacity: None,
            save_queue_capacity: None,
            result_queue_capacity: None,
            resize_variants: default_resize_variants(),
            watermark: default_watermark(),
            stage_timeout_ms: None,
        }
    }
}

impl PipelineConfig {
    /// Sets the number of processor workers.
    pub fn with_processor_workers(mut self, workers: usize) -> Self {
        self.processor_workers = workers;
        self
    }

    /// Sets the number of saver workers.
    pub fn with_saver_workers(mut self, workers: usize) -> Self {
        self.saver_workers = workers;
        self
    }

    /// Overrides all three queue capacities at once.
    pub fn with_queue_capacities(mut self, input: usize, save: usize, result: usize) -> Self {
        self.input_queue_capacity = Some(input);
        self.save_queue_capacity = Some(save);
        self.result_queue_capacity = Some(result);
        self
    }

    /// Sets the per-step deadline.
    pub fn with_stage_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.stage_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn input_capacity(&self) -> usize {
        self.input_queue_capacity
            .unwrap_or(self.processor_workers * 2)
    }

    pub fn save_capacity(&self) -> usize {
        self.save_queue_capacity.unwrap_or(self.saver_workers * 2)
    }

    pub fn result_capacity(&self) -> usize {
        self.result_queue_capacity
            .unwrap_or((self.processor_workers + self.saver_workers) * 2)
    }

    /// Sum of all queue capacities.
    pub fn total_capacity(&self) -> usize {
        self.input_capacity() + self.save_capacity() + self.result_capacity()
    }
}
