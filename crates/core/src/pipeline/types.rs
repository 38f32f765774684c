//! Types for the pipeline module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::error::PipelineError;
use crate::stage::Phase;

/// Image names processed when no items are given.
pub const DEMO_IMAGES: [&str; 6] = [
    "wedding.jpg",
    "birthday.jpg",
    "vacation.jpg",
    "nature1.jpg",
    "nature2.jpg",
    "fashion.jpg",
];

/// A unit of input work, identified by an opaque name (usually a file name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem {
    name: String,
}

impl WorkItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for WorkItem {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for WorkItem {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Terminal record for one item: success when `error` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub item: WorkItem,
    pub error: Option<PipelineError>,
}

impl Outcome {
    pub fn success(item: WorkItem) -> Self {
        Self { item, error: None }
    }

    pub fn failure(item: WorkItem, error: PipelineError) -> Self {
        Self {
            item,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A failed item as reported in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FailureRecord {
    pub item: String,
    pub phase: Phase,
    pub step: String,
    pub error: String,
}

impl FailureRecord {
    fn from_error(item: &WorkItem, error: &PipelineError) -> Self {
        Self {
            item: item.name().to_string(),
            phase: error.phase(),
            step: error.step().to_string(),
            error: error.to_string(),
        }
    }
}

/// Running count of outcomes.
///
/// The result does not depend on the order outcomes are recorded in: failures
/// are kept sorted and outcomes are counted per item name. The same name may
/// be seeded more than once, so duplicates are only detectable against the
/// seeded counts (see [`Tally::excess_over`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    total: usize,
    succeeded: usize,
    failed: usize,
    failures: Vec<FailureRecord>,
    counts: HashMap<WorkItem, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tally from any sequence of outcomes.
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a Outcome>) -> Self {
        let mut tally = Self::new();
        for outcome in outcomes {
            tally.record(outcome);
        }
        tally
    }

    /// Number of times each item appears in `items`.
    pub fn count_items(items: &[WorkItem]) -> HashMap<WorkItem, usize> {
        let mut counts = HashMap::new();
        for item in items {
            *counts.entry(item.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Records one outcome.
    pub fn record(&mut self, outcome: &Outcome) {
        *self.counts.entry(outcome.item.clone()).or_insert(0) += 1;

        self.total += 1;
        match &outcome.error {
            None => self.succeeded += 1,
            Some(error) => {
                self.failed += 1;
                let record = FailureRecord::from_error(&outcome.item, error);
                let pos = self
                    .failures
                    .binary_search(&record)
                    .unwrap_or_else(|pos| pos);
                self.failures.insert(pos, record);
            }
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Outcomes recorded for `item`.
    pub fn count(&self, item: &WorkItem) -> usize {
        self.counts.get(item).copied().unwrap_or(0)
    }

    pub fn contains(&self, item: &WorkItem) -> bool {
        self.count(item) > 0
    }

    /// Outcomes recorded beyond the number of times each item was seeded.
    pub fn excess_over(&self, seeded: &HashMap<WorkItem, usize>) -> usize {
        self.counts
            .iter()
            .map(|(item, &count)| count.saturating_sub(seeded.get(item).copied().unwrap_or(0)))
            .sum()
    }
}

/// Final report of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Number of items seeded (and outcomes received).
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Highest observed count of seeded items without an outcome yet.
    pub max_in_flight: usize,
    pub failures: Vec<FailureRecord>,
}

/// Lifecycle of a run, derived from queue closures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// No run has started yet.
    Idle = 0,
    /// Items are being enqueued.
    Seeding = 1,
    /// Input queue closed; processors still running.
    Processing = 2,
    /// All processors exited and the save queue is closed.
    Draining = 3,
    /// Result stream closed and drained.
    Done = 4,
}

impl RunPhase {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => RunPhase::Seeding,
            2 => RunPhase::Processing,
            3 => RunPhase::Draining,
            4 => RunPhase::Done,
            _ => RunPhase::Idle,
        }
    }
}

/// Status of a worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Pool name ("processor" or "saver").
    pub name: String,
    /// Configured number of workers.
    pub workers: usize,
    /// Workers currently inside their consume loop.
    pub active_workers: usize,
    /// Items that left this pool successfully since creation.
    pub total_processed: u64,
    /// Items that failed in this pool since creation.
    pub total_failed: u64,
}

/// Overall pipeline status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub running: bool,
    pub phase: RunPhase,
    /// Items seeded in the current run without an outcome yet.
    pub in_flight: usize,
    pub processor_pool: PoolStatus,
    pub saver_pool: PoolStatus,
}
