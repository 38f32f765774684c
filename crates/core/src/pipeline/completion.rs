//! Counted completion signal for a worker pool.
//!
//! Every worker holds a [`WorkerGuard`] obtained from [`CompletionSignal::register`]
//! before it is spawned. Dropping the last outstanding guard flips a watch
//! channel, waking everyone blocked in [`CompletionSignal::wait`]. Guards are
//! released on drop, so a panicking worker still counts as exited.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

struct Inner {
    active: AtomicUsize,
    done_tx: watch::Sender<bool>,
}

/// Fires once every registered worker has released its guard.
///
/// All workers must be registered before the first one can exit; registering
/// after the signal has fired does not reset it.
#[derive(Clone)]
pub struct CompletionSignal {
    inner: Arc<Inner>,
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                active: AtomicUsize::new(0),
                done_tx,
            }),
        }
    }

    /// Counts one more worker. The returned guard marks it exited when dropped.
    pub fn register(&self) -> WorkerGuard {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        WorkerGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Workers registered and not yet exited.
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn is_complete(&self) -> bool {
        *self.inner.done_tx.borrow()
    }

    /// Waits until every registered worker has exited.
    pub async fn wait(&self) {
        let mut done_rx = self.inner.done_tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = done_rx.wait_for(|done| *done).await;
    }
}

/// Registration of one worker with a [`CompletionSignal`].
pub struct WorkerGuard {
    inner: Arc<Inner>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.done_tx.send_replace(true);
        }
    }
}
