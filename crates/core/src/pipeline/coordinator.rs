//! Pipeline coordinator: owns the queues, seeds work, drains outcomes.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::error::RunError;
use super::pool::{spawn_closer, PoolHandle, PoolStats};
use super::processor_pool::ProcessorPool;
use super::saver_pool::SaverPool;
use super::types::{Outcome, PipelineStatus, RunPhase, RunSummary, Tally, WorkItem};
use crate::config::PipelineConfig;
use crate::metrics::{ITEMS_SEEDED, OUTCOMES_TOTAL, RUN_DURATION};
use crate::stage::{StageOperation, StepPlan};

/// Callback invoked from the drain loop for every outcome.
pub type OutcomeCallback = Arc<dyn Fn(&Outcome) + Send + Sync>;

/// Per-run counters shared between the seeder, the drain loop and `status()`.
#[derive(Default)]
struct RunState {
    running: AtomicBool,
    phase: AtomicU8,
    seeded: AtomicUsize,
    drained: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RunState {
    /// Moves the phase forward; never backwards.
    fn advance(&self, phase: RunPhase) {
        self.phase.fetch_max(phase as u8, Ordering::SeqCst);
    }

    fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn in_flight(&self) -> usize {
        let seeded = self.seeded.load(Ordering::SeqCst);
        seeded.saturating_sub(self.drained.load(Ordering::SeqCst))
    }

    fn observe_in_flight(&self) {
        self.max_in_flight
            .fetch_max(self.in_flight(), Ordering::SeqCst);
    }

    fn reset(&self) {
        self.phase.store(RunPhase::Seeding as u8, Ordering::SeqCst);
        self.seeded.store(0, Ordering::SeqCst);
        self.drained.store(0, Ordering::SeqCst);
        self.max_in_flight.store(0, Ordering::SeqCst);
    }
}

/// Clears the running flag when a run ends, however it ends.
struct RunningGuard {
    state: Arc<RunState>,
}

impl RunningGuard {
    fn acquire(state: &Arc<RunState>) -> Result<Self, RunError> {
        state
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| RunError::AlreadyRunning)?;
        state.reset();
        Ok(Self {
            state: Arc::clone(state),
        })
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::SeqCst);
    }
}

/// The two-stage image pipeline.
///
/// A run wires three bounded queues together:
///
/// ```text
/// seeder ──input──▶ processors ──save──▶ savers ──┐
///                       │                         ├──result──▶ drain loop
///                       └─────── failures ────────┘
/// ```
///
/// The seeder closes the input queue after the last item. A supervisor task
/// closes the save queue once every processor has exited, and a second one
/// closes the result stream once every saver has exited. The drain loop runs
/// concurrently with all of them and finishes when the result stream is
/// closed and empty.
pub struct Pipeline<S: StageOperation> {
    config: PipelineConfig,
    plan: Arc<StepPlan>,
    stage: Arc<S>,
    on_outcome: Option<OutcomeCallback>,
    processor_stats: Arc<PoolStats>,
    saver_stats: Arc<PoolStats>,
    state: Arc<RunState>,
}

impl<S: StageOperation + 'static> Pipeline<S> {
    /// Creates a new pipeline around a stage operation.
    pub fn new(config: PipelineConfig, stage: S) -> Self {
        Self::with_shared_stage(config, Arc::new(stage))
    }

    /// Creates a new pipeline around an already shared stage operation.
    pub fn with_shared_stage(config: PipelineConfig, stage: Arc<S>) -> Self {
        let plan = Arc::new(StepPlan::from_config(&config));
        Self {
            config,
            plan,
            stage,
            on_outcome: None,
            processor_stats: Arc::new(PoolStats::default()),
            saver_stats: Arc::new(PoolStats::default()),
            state: Arc::new(RunState::default()),
        }
    }

    /// Sets a callback that receives every outcome as it is drained.
    pub fn with_outcome_callback(mut self, callback: OutcomeCallback) -> Self {
        self.on_outcome = Some(callback);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn plan(&self) -> &StepPlan {
        &self.plan
    }

    /// Returns the current pipeline status.
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            running: self.state.running.load(Ordering::SeqCst),
            phase: self.state.phase(),
            in_flight: self.state.in_flight(),
            processor_pool: self
                .processor_stats
                .to_status("processor", self.config.processor_workers),
            saver_pool: self
                .saver_stats
                .to_status("saver", self.config.saver_workers),
        }
    }

    /// Runs every item through the pipeline and waits for all outcomes.
    ///
    /// Item failures are reported in the summary, not as errors. An error means
    /// the run itself went wrong: the pipeline configuration is invalid, it
    /// overlapped another run, a task panicked, or outcomes went missing.
    pub async fn run(&self, items: Vec<WorkItem>) -> Result<RunSummary, RunError> {
        self.config.validate()?;
        let _running = RunningGuard::acquire(&self.state)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let expected = items.len();
        let seeded_counts = Tally::count_items(&items);
        let timeout = self.config.stage_timeout_ms.map(Duration::from_millis);

        tracing::info!(
            run_id = %run_id,
            items = expected,
            processors = self.config.processor_workers,
            savers = self.config.saver_workers,
            "Starting pipeline run"
        );

        let (input_tx, input_rx) = async_channel::bounded(self.config.input_capacity());
        let (save_tx, save_rx) = async_channel::bounded(self.config.save_capacity());
        let (result_tx, result_rx) = async_channel::bounded(self.config.result_capacity());

        let processors = ProcessorPool::new(
            self.config.processor_workers,
            Arc::clone(&self.stage),
            Arc::clone(&self.plan),
            timeout,
            Arc::clone(&self.processor_stats),
        )
        .spawn(input_rx, save_tx.clone(), result_tx.clone());

        let savers = SaverPool::new(
            self.config.saver_workers,
            Arc::clone(&self.stage),
            timeout,
            Arc::clone(&self.saver_stats),
        )
        .spawn(save_rx, result_tx.clone());

        let save_closer = {
            let state = Arc::clone(&self.state);
            spawn_closer(processors.name, processors.completion.clone(), save_tx, move || {
                state.advance(RunPhase::Draining)
            })
        };
        let result_closer = spawn_closer(savers.name, savers.completion.clone(), result_tx, || {});

        let seeder = spawn_seeder(items, input_tx, Arc::clone(&self.state));

        let tally = self.drain(result_rx).await;

        let joined = self
            .join_all(seeder, [save_closer, result_closer], [processors, savers])
            .await;
        self.state.advance(RunPhase::Done);
        let seeded = joined?;

        let finished_at = Utc::now();
        let elapsed = clock.elapsed();
        RUN_DURATION.observe(elapsed.as_secs_f64());

        tracing::info!(
            run_id = %run_id,
            total = tally.total(),
            failed = tally.failed(),
            "All done. Total: {}, Failed: {}",
            tally.total(),
            tally.failed()
        );

        let duplicates = tally.excess_over(&seeded_counts);
        if duplicates > 0 {
            return Err(RunError::DuplicateOutcomes { count: duplicates });
        }
        if seeded != expected || tally.total() != seeded {
            return Err(RunError::Incomplete {
                expected,
                received: tally.total(),
            });
        }

        Ok(RunSummary {
            run_id,
            started_at,
            finished_at,
            duration_ms: elapsed.as_millis() as u64,
            total: tally.total(),
            succeeded: tally.succeeded(),
            failed: tally.failed(),
            max_in_flight: self.state.max_in_flight.load(Ordering::SeqCst),
            failures: tally.failures().to_vec(),
        })
    }

    /// Reads outcomes until the result stream is closed and empty.
    async fn drain(&self, results: async_channel::Receiver<Outcome>) -> Tally {
        let mut tally = Tally::new();

        while let Ok(outcome) = results.recv().await {
            self.state.drained.fetch_add(1, Ordering::SeqCst);

            match &outcome.error {
                None => {
                    OUTCOMES_TOTAL.with_label_values(&["success"]).inc();
                    tracing::info!(item = %outcome.item, "Success: {}", outcome.item);
                }
                Some(error) => {
                    OUTCOMES_TOTAL.with_label_values(&["failed"]).inc();
                    tracing::warn!(
                        item = %outcome.item,
                        phase = %error.phase(),
                        step = %error.step(),
                        "Failed: {} - {}",
                        outcome.item,
                        error
                    );
                }
            }

            tally.record(&outcome);

            if let Some(callback) = &self.on_outcome {
                callback(&outcome);
            }
        }

        tally
    }

    /// Joins every task spawned for a run. Returns the number of seeded items.
    async fn join_all(
        &self,
        seeder: JoinHandle<usize>,
        closers: [JoinHandle<()>; 2],
        pools: [PoolHandle; 2],
    ) -> Result<usize, RunError> {
        let seeded = seeder
            .await
            .map_err(|e| RunError::task_failed("seeder", e))?;

        for closer in closers {
            closer
                .await
                .map_err(|e| RunError::task_failed("queue closer", e))?;
        }

        for pool in pools {
            let results = futures::future::join_all(pool.workers).await;
            if let Some(err) = results.into_iter().find_map(Result::err) {
                return Err(RunError::task_failed(format!("{} worker", pool.name), err));
            }
        }

        Ok(seeded)
    }
}

/// Enqueues every item, then closes the input queue.
fn spawn_seeder(
    items: Vec<WorkItem>,
    input_tx: async_channel::Sender<WorkItem>,
    state: Arc<RunState>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut seeded = 0;
        for item in items {
            if input_tx.send(item).await.is_err() {
                tracing::error!("Input queue closed while seeding");
                break;
            }
            seeded += 1;
            state.seeded.fetch_add(1, Ordering::SeqCst);
            state.observe_in_flight();
            ITEMS_SEEDED.inc();
        }

        input_tx.close();
        state.advance(RunPhase::Processing);
        tracing::info!(seeded, "All items enqueued, input queue closed");
        seeded
    })
}
