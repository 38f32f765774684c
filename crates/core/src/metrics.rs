//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Seeding and outcomes of pipeline runs
//! - Per-step durations and failures

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Run Metrics
// =============================================================================

/// Items enqueued into the input queue.
pub static ITEMS_SEEDED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("imagepipe_items_seeded_total", "Total items seeded into the pipeline")
        .unwrap()
});

/// Outcomes drained from the result stream by result.
pub static OUTCOMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("imagepipe_outcomes_total", "Total item outcomes"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Wall-clock duration of complete runs.
pub static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("imagepipe_run_duration_seconds", "Duration of pipeline runs")
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
    )
    .unwrap()
});

// =============================================================================
// Step Metrics
// =============================================================================

/// Step duration in seconds by step kind.
pub static STEP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("imagepipe_step_duration_seconds", "Duration of stage steps")
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["step"], // "resize", "watermark", "save"
    )
    .unwrap()
});

/// Step failures by phase and step kind.
pub static STEP_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("imagepipe_step_failures_total", "Total failed stage steps"),
        &["phase", "step"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ITEMS_SEEDED.clone()),
        Box::new(OUTCOMES_TOTAL.clone()),
        Box::new(RUN_DURATION.clone()),
        Box::new(STEP_DURATION.clone()),
        Box::new(STEP_FAILURES.clone()),
    ]
}
