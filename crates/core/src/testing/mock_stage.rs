//! Mock stage operation for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::pipeline::WorkItem;
use crate::stage::{StageError, StageOperation, Step, StepKind};

/// A recorded step invocation for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStep {
    /// The item the step ran for.
    pub item: WorkItem,
    /// The step that ran.
    pub step: Step,
    /// Whether the step succeeded.
    pub success: bool,
}

/// Mock implementation of the StageOperation trait.
///
/// Provides controllable behavior for testing:
/// - Record every step invocation for assertions
/// - Fail a given step kind for a given item
/// - Simulate a fixed per-step delay
/// - Track the highest number of steps running at once
///
/// Clones share state, so a test can keep one clone and hand another to the
/// pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use imagepipe_core::testing::MockStage;
///
/// let stage = MockStage::new();
/// stage.fail_on("nature1.jpg", StepKind::Watermark).await;
///
/// let pipeline = Pipeline::new(config, stage.clone());
/// pipeline.run(items).await?;
///
/// assert!(!stage.was_saved("nature1.jpg").await);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockStage {
    /// Recorded invocations, in completion order.
    steps: Arc<RwLock<Vec<RecordedStep>>>,
    /// Forced failures as (item name, step kind).
    failures: Arc<RwLock<HashSet<(String, StepKind)>>>,
    /// Items whose first step panics.
    panics: Arc<RwLock<HashSet<String>>>,
    /// Simulated duration of every step.
    step_delay: Arc<RwLock<Duration>>,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
}

impl MockStage {
    /// Create a new mock stage where every step succeeds immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `kind` fail for the item named `item`.
    pub async fn fail_on(&self, item: impl Into<String>, kind: StepKind) {
        self.failures.write().await.insert((item.into(), kind));
    }

    /// Make any step panic for the item named `item`.
    pub async fn panic_on(&self, item: impl Into<String>) {
        self.panics.write().await.insert(item.into());
    }

    /// Set the simulated duration of each step.
    pub async fn set_step_delay(&self, delay: Duration) {
        *self.step_delay.write().await = delay;
    }

    /// Get all recorded steps.
    pub async fn recorded_steps(&self) -> Vec<RecordedStep> {
        self.steps.read().await.clone()
    }

    /// Steps run for one item, in order.
    pub async fn steps_for(&self, item: &str) -> Vec<Step> {
        self.steps
            .read()
            .await
            .iter()
            .filter(|r| r.item.name() == item)
            .map(|r| r.step.clone())
            .collect()
    }

    /// Whether the save step was ever invoked for the item.
    pub async fn was_saved(&self, item: &str) -> bool {
        self.steps_for(item).await.contains(&Step::Save)
    }

    /// Number of times the save step ran.
    pub async fn save_count(&self) -> usize {
        self.steps
            .read()
            .await
            .iter()
            .filter(|r| r.step == Step::Save)
            .count()
    }

    /// Highest number of steps that were running at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StageOperation for MockStage {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, item: &WorkItem, step: &Step) -> Result<(), StageError> {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        let delay = *self.step_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.panics.read().await.contains(item.name()) {
            self.running.fetch_sub(1, Ordering::SeqCst);
            panic!("mock stage panic for {}", item);
        }

        let key = (item.name().to_string(), step.kind());
        let success = !self.failures.read().await.contains(&key);

        self.steps.write().await.push(RecordedStep {
            item: item.clone(),
            step: step.clone(),
            success,
        });
        self.running.fetch_sub(1, Ordering::SeqCst);

        if success {
            Ok(())
        } else {
            Err(StageError::failed(
                step.clone(),
                format!("{} failed", step.kind().as_str()),
            ))
        }
    }
}
