//! Worker pools: where a worker's loop actually runs.
//!
//! The scheduler never spawns threads itself. It hands each worker loop to a
//! [`WorkerPool`] and later awaits the returned [`WorkerHandle`], so the same
//! scheduling logic works over OS threads or a sequential baseline.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use chunkrun_core::WorkerId;

use crate::ScheduleError;

/// Capability to run one worker loop and later wait for it.
pub trait WorkerPool: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Start `job` as worker `worker_id`.
    fn submit<F>(&self, worker_id: WorkerId, job: F) -> WorkerHandle
    where
        F: FnOnce() + Send + 'static;
}

/// Handle to a submitted worker loop.
#[derive(Debug)]
pub struct WorkerHandle {
    worker_id: WorkerId,
    state: HandleState,
}

#[derive(Debug)]
enum HandleState {
    Spawned(JoinHandle<()>),
    Finished(Result<(), String>),
}

impl WorkerHandle {
    /// Wrap a spawned tokio task.
    pub fn spawned(worker_id: WorkerId, handle: JoinHandle<()>) -> Self {
        Self {
            worker_id,
            state: HandleState::Spawned(handle),
        }
    }

    /// A handle for a job that already ran to completion.
    pub fn finished(worker_id: WorkerId, outcome: Result<(), String>) -> Self {
        Self {
            worker_id,
            state: HandleState::Finished(outcome),
        }
    }

    /// Wait for the worker loop to exit.
    pub async fn join(self) -> Result<(), ScheduleError> {
        let outcome = match self.state {
            HandleState::Spawned(handle) => handle.await.map_err(|e| {
                if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    e.to_string()
                }
            }),
            HandleState::Finished(outcome) => outcome,
        };
        trace!(worker_id = %self.worker_id, ok = outcome.is_ok(), "Worker joined");
        outcome.map_err(|msg| ScheduleError::Pool(format!("{}: {}", self.worker_id, msg)))
    }
}

/// Runs each worker on tokio's blocking thread pool (one OS thread per worker),
/// on the runtime the scheduler is awaited on.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockingPool;

impl BlockingPool {
    pub fn new() -> Self {
        Self
    }
}

impl WorkerPool for BlockingPool {
    fn name(&self) -> &'static str {
        "blocking"
    }

    fn submit<F>(&self, worker_id: WorkerId, job: F) -> WorkerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        debug!(worker_id = %worker_id, "Spawning worker thread");
        WorkerHandle::spawned(worker_id, tokio::task::spawn_blocking(job))
    }
}

/// Runs each worker to completion inside `submit`, one after another.
///
/// Useful as a single-threaded baseline and for deterministic tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlinePool;

impl WorkerPool for InlinePool {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn submit<F>(&self, worker_id: WorkerId, job: F) -> WorkerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(job)).map_err(panic_message);
        WorkerHandle::finished(worker_id, outcome)
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_inline_pool_runs_on_submit() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let handle = InlinePool.submit(WorkerId::new(0), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_blocking_pool_joins() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<WorkerHandle> = (0..4)
            .map(|i| {
                let c = counter.clone();
                BlockingPool::new().submit(WorkerId::new(i), move || {
                    c.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().await.unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_panicking_job_surfaces_as_pool_error() {
        let handle = BlockingPool::new().submit(WorkerId::new(2), || panic!("worker exploded"));
        let err = handle.join().await.unwrap_err();
        assert_eq!(
            err,
            ScheduleError::Pool("worker-2: worker exploded".to_string())
        );

        let handle = InlinePool.submit(WorkerId::new(1), || panic!("inline exploded"));
        assert!(matches!(handle.join().await, Err(ScheduleError::Pool(_))));
    }
}
