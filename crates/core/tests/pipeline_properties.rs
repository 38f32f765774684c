//! Pipeline property integration tests.
//!
//! These tests drive whole runs through the public API with a scripted stage:
//! - Every seeded item yields exactly one outcome
//! - Processing failures never reach the saver pool
//! - No item is processed or saved twice
//! - The tally does not depend on outcome order
//! - Bounded queues limit the number of items in flight
//! - Runs terminate for a range of pool sizes

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio_test::assert_ok;

use imagepipe_core::pipeline::{Outcome, Pipeline, RunError, RunSummary, Tally};
use imagepipe_core::stage::{Phase, SimulatedStage, SimulationConfig, Step, StepKind, StepProfile};
use imagepipe_core::testing::{fixtures, MockStage};
use imagepipe_core::PipelineConfig;

/// Pipeline over a [`MockStage`] that records every outcome it drains.
struct TestHarness {
    pipeline: Pipeline<MockStage>,
    stage: MockStage,
    outcomes: Arc<Mutex<Vec<Outcome>>>,
}

impl TestHarness {
    fn new(processors: usize, savers: usize) -> Self {
        Self::with_config(
            PipelineConfig::default()
                .with_processor_workers(processors)
                .with_saver_workers(savers),
        )
    }

    fn with_config(config: PipelineConfig) -> Self {
        let stage = MockStage::new();
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);

        let pipeline = Pipeline::new(config, stage.clone()).with_outcome_callback(Arc::new(
            move |outcome: &Outcome| sink.lock().unwrap().push(outcome.clone()),
        ));

        Self {
            pipeline,
            stage,
            outcomes,
        }
    }

    async fn run(&self, items: Vec<imagepipe_core::WorkItem>) -> RunSummary {
        tokio::time::timeout(Duration::from_secs(30), self.pipeline.run(items))
            .await
            .expect("pipeline run timed out")
            .expect("pipeline run failed")
    }

    fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().unwrap().clone()
    }

    fn outcome_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for outcome in self.outcomes() {
            *counts.entry(outcome.item.name().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

// =============================================================================
// Completeness
// =============================================================================

#[tokio::test]
async fn test_every_item_yields_exactly_one_outcome() {
    let harness = TestHarness::new(3, 5);
    harness.stage.fail_on("image-004.jpg", StepKind::Resize).await;
    harness.stage.fail_on("image-011.jpg", StepKind::Watermark).await;
    harness.stage.fail_on("image-017.jpg", StepKind::Save).await;

    let items = fixtures::numbered_items(40);
    let summary = harness.run(items.clone()).await;

    assert_eq!(summary.total, 40);
    assert_eq!(summary.succeeded + summary.failed, 40);
    assert_eq!(summary.failed, 3);

    let counts = harness.outcome_counts();
    assert_eq!(counts.len(), 40);
    for item in &items {
        assert_eq!(counts.get(item.name()), Some(&1), "{} outcomes", item);
    }
}

#[tokio::test]
async fn test_repeated_names_each_yield_an_outcome() {
    let harness = TestHarness::new(2, 2);
    harness.stage.fail_on("b.jpg", StepKind::Save).await;
    let items: Vec<_> = ["a.jpg", "a.jpg", "b.jpg", "b.jpg"]
        .into_iter()
        .map(imagepipe_core::WorkItem::new)
        .collect();

    let summary = harness.run(items).await;

    assert_eq!(summary.total, 4);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(harness.stage.save_count().await, 4);
    assert_eq!(harness.outcome_counts().get("a.jpg"), Some(&2));
    assert_eq!(harness.outcome_counts().get("b.jpg"), Some(&2));
}

#[tokio::test]
async fn test_empty_input_yields_empty_summary() {
    let harness = TestHarness::new(2, 4);

    let summary = harness.run(Vec::new()).await;

    assert_eq!(summary.total, 0);
    assert_eq!(summary.failed, 0);
    assert!(summary.failures.is_empty());
    assert!(harness.outcomes().is_empty());
    assert!(harness.stage.recorded_steps().await.is_empty());
}

// =============================================================================
// Failure isolation and dispatch
// =============================================================================

#[tokio::test]
async fn test_processing_failure_never_reaches_saver() {
    let harness = TestHarness::new(2, 2);
    harness.stage.fail_on("vacation.jpg", StepKind::Resize).await;
    harness.stage.fail_on("nature1.jpg", StepKind::Watermark).await;

    let summary = harness.run(fixtures::demo_items()).await;

    assert_eq!(summary.failed, 2);
    assert!(!harness.stage.was_saved("vacation.jpg").await);
    assert!(!harness.stage.was_saved("nature1.jpg").await);
    assert_eq!(harness.stage.save_count().await, 4);

    // Processing stops at the first failed step.
    assert_eq!(
        harness.stage.steps_for("vacation.jpg").await,
        vec![Step::resize("thumbnail")]
    );
    assert_eq!(harness.stage.steps_for("nature1.jpg").await.len(), 4);

    let failed: Vec<_> = harness
        .outcomes()
        .into_iter()
        .filter_map(|o| o.error)
        .collect();
    assert!(failed.iter().all(|e| e.phase() == Phase::Processing));
}

#[tokio::test]
async fn test_save_failure_is_reported_once() {
    let harness = TestHarness::new(1, 3);
    harness.stage.fail_on("fashion.jpg", StepKind::Save).await;

    let summary = harness.run(fixtures::demo_items()).await;

    assert_eq!(summary.failed, 1);
    let record = &summary.failures[0];
    assert_eq!(record.item, "fashion.jpg");
    assert_eq!(record.phase, Phase::Saving);
    assert_eq!(record.step, "save");

    // No retries: the save step ran exactly once for the failing item.
    let saves = harness
        .stage
        .steps_for("fashion.jpg")
        .await
        .into_iter()
        .filter(|s| *s == Step::Save)
        .count();
    assert_eq!(saves, 1);
}

#[tokio::test]
async fn test_no_item_is_processed_twice() {
    let harness = TestHarness::new(4, 8);
    let items = fixtures::numbered_items(60);

    harness.run(items.clone()).await;

    let plan_len = harness.pipeline.plan().len();
    for item in &items {
        let steps = harness.stage.steps_for(item.name()).await;
        assert_eq!(steps.len(), plan_len + 1, "steps for {}", item);
        assert_eq!(steps.last(), Some(&Step::Save));
    }
    assert_eq!(harness.stage.save_count().await, 60);
}

#[tokio::test]
async fn test_steps_run_in_plan_order() {
    let harness = TestHarness::new(2, 2);

    harness.run(fixtures::demo_items()).await;

    let expected = vec![
        Step::resize("thumbnail"),
        Step::resize("medium"),
        Step::resize("large"),
        Step::Watermark,
        Step::Save,
    ];
    for name in fixtures::DEMO_IMAGES {
        assert_eq!(harness.stage.steps_for(name).await, expected);
    }
}

// =============================================================================
// Tally
// =============================================================================

#[tokio::test]
async fn test_tally_is_order_invariant() {
    let harness = TestHarness::new(3, 3);
    harness.stage.fail_on("image-002.jpg", StepKind::Save).await;
    harness.stage.fail_on("image-007.jpg", StepKind::Resize).await;
    harness.stage.fail_on("image-013.jpg", StepKind::Watermark).await;

    let summary = harness.run(fixtures::numbered_items(20)).await;
    let mut outcomes = harness.outcomes();
    let reference = Tally::from_outcomes(&outcomes);

    assert_eq!(reference.total(), summary.total);
    assert_eq!(reference.failed(), summary.failed);
    assert_eq!(reference.failures(), summary.failures.as_slice());

    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..5 {
        outcomes.shuffle(&mut rng);
        assert_eq!(Tally::from_outcomes(&outcomes), reference);
    }
}

// =============================================================================
// Backpressure
// =============================================================================

#[tokio::test]
async fn test_in_flight_items_are_bounded() {
    let config = PipelineConfig::default()
        .with_processor_workers(2)
        .with_saver_workers(2)
        .with_queue_capacities(2, 2, 4);
    // Queues, one item per worker, and the outcome the drain loop holds.
    let bound = config.total_capacity() + 2 + 2 + 1;
    let harness = TestHarness::with_config(config);
    harness.stage.set_step_delay(Duration::from_millis(2)).await;

    let summary = harness.run(fixtures::numbered_items(80)).await;

    assert_eq!(summary.total, 80);
    assert!(
        summary.max_in_flight <= bound,
        "max in flight {} exceeds {}",
        summary.max_in_flight,
        bound
    );
    assert!(harness.stage.max_concurrency() <= 4);
}

// =============================================================================
// Termination
// =============================================================================

#[tokio::test]
async fn test_terminates_for_many_pool_sizes() {
    for (processors, savers) in [(1, 1), (2, 4), (4, 8), (16, 32)] {
        let harness = TestHarness::new(processors, savers);
        harness.stage.fail_on("image-003.jpg", StepKind::Resize).await;
        harness.stage.fail_on("image-005.jpg", StepKind::Save).await;

        let summary = harness.run(fixtures::numbered_items(25)).await;

        assert_eq!(summary.total, 25, "{}x{}", processors, savers);
        assert_eq!(summary.failed, 2, "{}x{}", processors, savers);
        assert!(!harness.pipeline.status().running);
    }
}

#[tokio::test]
async fn test_more_workers_than_items() {
    let harness = TestHarness::new(16, 32);

    let summary = harness.run(fixtures::numbered_items(3)).await;

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 3);
}

#[tokio::test]
async fn test_stage_timeout_fails_item() {
    let config = PipelineConfig::default()
        .with_processor_workers(2)
        .with_saver_workers(2)
        .with_stage_timeout_ms(20);
    let harness = TestHarness::with_config(config);
    harness.stage.set_step_delay(Duration::from_millis(200)).await;

    let summary = harness.run(fixtures::numbered_items(2)).await;

    assert_eq!(summary.failed, 2);
    for record in &summary.failures {
        assert_eq!(record.phase, Phase::Processing);
        assert_eq!(record.step, "resize thumbnail");
        assert!(record.error.contains("timed out after 20 ms"));
    }
}

// =============================================================================
// Demo scenarios
// =============================================================================

#[tokio::test]
async fn test_demo_run_without_failures() {
    let config = PipelineConfig::default()
        .with_processor_workers(2)
        .with_saver_workers(4);
    let stage = SimulatedStage::new(SimulationConfig::reliable(1));
    let pipeline = Pipeline::new(config, stage);

    let summary = assert_ok!(pipeline.run(fixtures::demo_items()).await);

    assert_eq!(summary.total, 6);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_demo_run_with_forced_processing_failure() {
    let harness = TestHarness::new(2, 4);
    // Third demo image.
    harness.stage.fail_on("vacation.jpg", StepKind::Resize).await;

    let summary = harness.run(fixtures::demo_items()).await;

    assert_eq!(summary.total, 6);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.failed, 1);
    let failure = &summary.failures[0];
    assert_eq!(failure.item, "vacation.jpg");
    assert_eq!(failure.phase, Phase::Processing);
    assert_eq!(failure.step, "resize thumbnail");
    assert!(!harness.stage.was_saved("vacation.jpg").await);
}

#[tokio::test]
async fn test_always_failing_save_fails_every_item() {
    let mut simulation = SimulationConfig::reliable(1).with_seed(3);
    simulation.save = StepProfile::new(1, 1.0);
    let pipeline = Pipeline::new(
        PipelineConfig::default()
            .with_processor_workers(2)
            .with_saver_workers(2),
        SimulatedStage::new(simulation),
    );

    let summary = assert_ok!(pipeline.run(fixtures::demo_items()).await);

    assert_eq!(summary.failed, 6);
    assert!(summary.failures.iter().all(|f| f.phase == Phase::Saving));
}

#[tokio::test]
async fn test_seeded_runs_are_reproducible() {
    let run = |seed: u64| async move {
        let mut simulation = SimulationConfig::reliable(1).with_seed(seed);
        simulation.resize.failure_rate = 0.3;
        // One worker per pool keeps the RNG draw order fixed.
        let pipeline = Pipeline::new(
            PipelineConfig::default()
                .with_processor_workers(1)
                .with_saver_workers(1),
            SimulatedStage::new(simulation),
        );
        pipeline
            .run(fixtures::numbered_items(20))
            .await
            .map(|summary| summary.failures)
    };

    let first = run(99).await.unwrap();
    let second = run(99).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_rerun_after_completion() {
    let harness = TestHarness::new(2, 2);

    harness.run(fixtures::numbered_items(5)).await;
    let summary = harness.run(fixtures::numbered_items(5)).await;

    // Each run is tallied on its own.
    assert_eq!(summary.total, 5);
    assert_eq!(harness.outcomes().len(), 10);
    assert!(!matches!(
        harness.pipeline.run(Vec::new()).await,
        Err(RunError::AlreadyRunning)
    ));
}
