//! Processor pool: runs the processing plan and routes items onward.

use std::sync::Arc;
use std::time::Duration;

use super::completion::{CompletionSignal, WorkerGuard};
use super::error::PipelineError;
use super::pool::{run_step, PoolHandle, PoolStats};
use super::types::{Outcome, WorkItem};
use crate::stage::{StageError, StageOperation, StepPlan};

pub(crate) struct ProcessorPool<S: StageOperation> {
    workers: usize,
    stage: Arc<S>,
    plan: Arc<StepPlan>,
    timeout: Option<Duration>,
    stats: Arc<PoolStats>,
}

impl<S: StageOperation + 'static> ProcessorPool<S> {
    pub(crate) fn new(
        workers: usize,
        stage: Arc<S>,
        plan: Arc<StepPlan>,
        timeout: Option<Duration>,
        stats: Arc<PoolStats>,
    ) -> Self {
        Self {
            workers,
            stage,
            plan,
            timeout,
            stats,
        }
    }

    /// Spawns the workers. Each one consumes `input` until it is closed and
    /// drained, forwarding fully processed items to `save_tx` and reporting
    /// failures straight to `results`.
    pub(crate) fn spawn(
        self,
        input: async_channel::Receiver<WorkItem>,
        save_tx: async_channel::Sender<WorkItem>,
        results: async_channel::Sender<Outcome>,
    ) -> PoolHandle {
        let completion = CompletionSignal::new();
        // Register everyone before anyone can exit.
        let guards: Vec<WorkerGuard> = (0..self.workers).map(|_| completion.register()).collect();

        let workers = guards
            .into_iter()
            .enumerate()
            .map(|(id, guard)| {
                let worker = ProcessorWorker {
                    id,
                    stage: Arc::clone(&self.stage),
                    plan: Arc::clone(&self.plan),
                    timeout: self.timeout,
                    stats: Arc::clone(&self.stats),
                    input: input.clone(),
                    save_tx: save_tx.clone(),
                    results: results.clone(),
                };
                tokio::spawn(async move {
                    let _guard = guard;
                    worker.run().await;
                })
            })
            .collect();

        PoolHandle {
            name: "processor",
            completion,
            workers,
        }
    }
}

struct ProcessorWorker<S: StageOperation> {
    id: usize,
    stage: Arc<S>,
    plan: Arc<StepPlan>,
    timeout: Option<Duration>,
    stats: Arc<PoolStats>,
    input: async_channel::Receiver<WorkItem>,
    save_tx: async_channel::Sender<WorkItem>,
    results: async_channel::Sender<Outcome>,
}

impl<S: StageOperation> ProcessorWorker<S> {
    async fn run(self) {
        self.stats.worker_started();
        tracing::debug!(worker = self.id, "Processor worker started");

        while let Ok(item) = self.input.recv().await {
            tracing::debug!(worker = self.id, item = %item, "[Processor {}] Processing {}", self.id, item);

            match self.process(&item).await {
                Ok(()) => {
                    self.stats.record_processed();
                    if self.save_tx.send(item).await.is_err() {
                        // Only reachable if the save queue was closed while this
                        // pool was still running.
                        tracing::error!(worker = self.id, "Save queue closed early, stopping worker");
                        break;
                    }
                }
                Err(source) => {
                    self.stats.record_failed();
                    let error = PipelineError::processing(item.clone(), source);
                    tracing::debug!(worker = self.id, item = %item, error = %error, "Processing failed");
                    if self.results.send(Outcome::failure(item, error)).await.is_err() {
                        tracing::error!(worker = self.id, "Result stream closed early, stopping worker");
                        break;
                    }
                }
            }
        }

        self.stats.worker_exited();
        tracing::debug!(worker = self.id, "Processor worker exiting");
    }

    /// Runs every step of the plan in order, stopping at the first failure.
    async fn process(&self, item: &WorkItem) -> Result<(), StageError> {
        for step in self.plan.steps() {
            run_step(self.stage.as_ref(), item, step, self.timeout).await?;
        }
        Ok(())
    }
}
