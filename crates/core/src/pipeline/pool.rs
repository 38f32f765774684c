//! Pieces shared by the processor and saver pools.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::completion::CompletionSignal;
use super::types::{PoolStatus, WorkItem};
use crate::metrics::{STEP_DURATION, STEP_FAILURES};
use crate::stage::{StageError, StageOperation, Step};

/// Tracks statistics for a worker pool.
#[derive(Default)]
pub(crate) struct PoolStats {
    active: AtomicUsize,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl PoolStats {
    pub(crate) fn worker_started(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn worker_exited(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn record_processed(&self) {
        self.total_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.total_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn to_status(&self, name: &str, workers: usize) -> PoolStatus {
        PoolStatus {
            name: name.to_string(),
            workers,
            active_workers: self.active.load(Ordering::Relaxed),
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// Running pool: its worker tasks and the signal that fires when all exit.
pub(crate) struct PoolHandle {
    pub(crate) name: &'static str,
    pub(crate) completion: CompletionSignal,
    pub(crate) workers: Vec<JoinHandle<()>>,
}

/// Runs one step, applying the optional deadline and recording step metrics.
pub(crate) async fn run_step<S>(
    stage: &S,
    item: &WorkItem,
    step: &Step,
    timeout: Option<Duration>,
) -> Result<(), StageError>
where
    S: StageOperation + ?Sized,
{
    let start = Instant::now();
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, stage.execute(item, step)).await {
            Ok(result) => result,
            Err(_) => Err(StageError::TimedOut {
                step: step.clone(),
                timeout_ms: limit.as_millis() as u64,
            }),
        },
        None => stage.execute(item, step).await,
    };

    let kind = step.kind().as_str();
    STEP_DURATION
        .with_label_values(&[kind])
        .observe(start.elapsed().as_secs_f64());
    if result.is_err() {
        STEP_FAILURES
            .with_label_values(&[step.phase().as_str(), kind])
            .inc();
    }

    result
}

/// Closes a downstream queue once every worker of the upstream pool has exited.
///
/// This task is the only place the queue gets closed, and the completion
/// signal guarantees no producer is left to write to it.
pub(crate) fn spawn_closer<T>(
    pool: &'static str,
    completion: CompletionSignal,
    downstream: async_channel::Sender<T>,
    on_closed: impl FnOnce() + Send + 'static,
) -> JoinHandle<()>
where
    T: Send + 'static,
{
    tokio::spawn(async move {
        completion.wait().await;
        downstream.close();
        tracing::info!(pool, "All {} workers exited, downstream queue closed", pool);
        on_closed();
    })
}
