//! Saver pool: persists processed items and reports every result.

use std::sync::Arc;
use std::time::Duration;

use super::completion::{CompletionSignal, WorkerGuard};
use super::error::PipelineError;
use super::pool::{run_step, PoolHandle, PoolStats};
use super::types::{Outcome, WorkItem};
use crate::stage::{StageOperation, Step};

pub(crate) struct SaverPool<S: StageOperation> {
    workers: usize,
    stage: Arc<S>,
    timeout: Option<Duration>,
    stats: Arc<PoolStats>,
}

impl<S: StageOperation + 'static> SaverPool<S> {
    pub(crate) fn new(
        workers: usize,
        stage: Arc<S>,
        timeout: Option<Duration>,
        stats: Arc<PoolStats>,
    ) -> Self {
        Self {
            workers,
            stage,
            timeout,
            stats,
        }
    }

    /// Spawns the workers. Each one consumes `save_rx` until it is closed and
    /// drained and sends exactly one outcome per item to `results`.
    pub(crate) fn spawn(
        self,
        save_rx: async_channel::Receiver<WorkItem>,
        results: async_channel::Sender<Outcome>,
    ) -> PoolHandle {
        let completion = CompletionSignal::new();
        let guards: Vec<WorkerGuard> = (0..self.workers).map(|_| completion.register()).collect();

        let workers = guards
            .into_iter()
            .enumerate()
            .map(|(id, guard)| {
                let worker = SaverWorker {
                    id,
                    stage: Arc::clone(&self.stage),
                    timeout: self.timeout,
                    stats: Arc::clone(&self.stats),
                    save_rx: save_rx.clone(),
                    results: results.clone(),
                };
                tokio::spawn(async move {
                    let _guard = guard;
                    worker.run().await;
                })
            })
            .collect();

        PoolHandle {
            name: "saver",
            completion,
            workers,
        }
    }
}

struct SaverWorker<S: StageOperation> {
    id: usize,
    stage: Arc<S>,
    timeout: Option<Duration>,
    stats: Arc<PoolStats>,
    save_rx: async_channel::Receiver<WorkItem>,
    results: async_channel::Sender<Outcome>,
}

impl<S: StageOperation> SaverWorker<S> {
    async fn run(self) {
        self.stats.worker_started();
        tracing::debug!(worker = self.id, "Saver worker started");

        while let Ok(item) = self.save_rx.recv().await {
            tracing::debug!(worker = self.id, item = %item, "[Saver {}] Saving {}", self.id, item);

            let outcome = self.save(item).await;
            if self.results.send(outcome).await.is_err() {
                tracing::error!(worker = self.id, "Result stream closed early, stopping worker");
                break;
            }
        }

        self.stats.worker_exited();
        tracing::debug!(worker = self.id, "Saver worker exiting");
    }

    /// Runs the save step. Always yields an outcome, success or failure.
    async fn save(&self, item: WorkItem) -> Outcome {
        match run_step(self.stage.as_ref(), &item, &Step::Save, self.timeout).await {
            Ok(()) => {
                self.stats.record_processed();
                Outcome::success(item)
            }
            Err(source) => {
                self.stats.record_failed();
                let error = PipelineError::save(item.clone(), source);
                Outcome::failure(item, error)
            }
        }
    }
}
