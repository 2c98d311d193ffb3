//! Worker loops and the shared queue used by dynamic and guided runs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use chunkrun_core::{PartialResult, WorkItem, WorkerId};

use crate::pool::panic_message;
use crate::{BoxError, ScheduleError};

/// Message a worker sends back to the executor.
#[derive(Debug)]
pub(crate) enum WorkerEvent<T> {
    /// One work item finished.
    Completed { item: WorkItem, result: PartialResult<T> },
    /// The compute function failed; the worker has stopped.
    Failed(ScheduleError),
}

/// Closeable queue of work items, fully loaded before any worker starts.
///
/// The sending half is dropped on construction, so an empty queue is also a
/// closed one and workers need no stop sentinels.
#[derive(Debug)]
pub(crate) struct WorkQueue {
    rx: Mutex<mpsc::UnboundedReceiver<WorkItem>>,
}

impl WorkQueue {
    pub(crate) fn preloaded(items: Vec<WorkItem>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        for item in items {
            // The receiver is alive in this scope, so send cannot fail.
            let _ = tx.send(item);
        }
        Arc::new(Self { rx: Mutex::new(rx) })
    }

    /// Next item, or `None` once the queue is drained.
    pub(crate) fn pop(&self) -> Option<WorkItem> {
        self.rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .ok()
    }
}

/// Everything one worker needs, owned by its loop.
pub(crate) struct WorkerContext<C, T> {
    pub(crate) worker_id: WorkerId,
    pub(crate) compute: Arc<C>,
    pub(crate) events: mpsc::UnboundedSender<WorkerEvent<T>>,
    pub(crate) cancel: CancellationToken,
}

impl<C, T> WorkerContext<C, T>
where
    C: Fn(&WorkItem) -> Result<T, BoxError> + Send + Sync + 'static,
    T: Send + 'static,
{
    /// Static policy: process the pre-assigned items in block order.
    pub(crate) fn run_assigned(self, items: Vec<WorkItem>) {
        for item in items {
            if self.cancel.is_cancelled() {
                debug!(worker_id = %self.worker_id, "Cancelled, leaving assigned items");
                return;
            }
            if !self.execute(item) {
                return;
            }
        }
    }

    /// Dynamic and guided policies: pull from the shared queue until drained.
    pub(crate) fn run_queue(self, queue: Arc<WorkQueue>) {
        loop {
            if self.cancel.is_cancelled() {
                debug!(worker_id = %self.worker_id, "Cancelled, leaving queue");
                return;
            }
            let Some(item) = queue.pop() else {
                return;
            };
            if !self.execute(item) {
                return;
            }
        }
    }

    /// Run the compute function on one item. Returns false if the worker must stop.
    fn execute(&self, item: WorkItem) -> bool {
        debug!(
            worker_id = %self.worker_id,
            item_id = item.id,
            start = item.start,
            end = item.end,
            "Processing chunk"
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.compute)(&item)));
        let event = match outcome {
            Ok(Ok(value)) => WorkerEvent::Completed {
                item,
                result: PartialResult {
                    work_item_id: item.id,
                    worker_id: self.worker_id,
                    value,
                },
            },
            Ok(Err(e)) => WorkerEvent::Failed(ScheduleError::WorkerFailure {
                item_id: item.id,
                message: e.to_string(),
            }),
            Err(payload) => WorkerEvent::Failed(ScheduleError::WorkerFailure {
                item_id: item.id,
                message: format!("panicked: {}", panic_message(payload)),
            }),
        };

        let failed = matches!(event, WorkerEvent::Failed(_));
        if self.events.send(event).is_err() {
            // Executor stopped listening; nothing left to report to.
            return false;
        }
        if failed {
            // The failure is already queued, so the executor sees it before the cancellation.
            warn!(worker_id = %self.worker_id, item_id = item.id, "Chunk failed, cancelling run");
            self.cancel.cancel();
        }
        !failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkrun_core::chunks_dynamic;

    fn context<C>(
        compute: C,
    ) -> (
        WorkerContext<C, usize>,
        mpsc::UnboundedReceiver<WorkerEvent<usize>>,
    )
    where
        C: Fn(&WorkItem) -> Result<usize, BoxError> + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = WorkerContext {
            worker_id: WorkerId::new(0),
            compute: Arc::new(compute),
            events: tx,
            cancel: CancellationToken::new(),
        };
        (ctx, rx)
    }

    #[test]
    fn test_queue_drains_then_closes() {
        let queue = WorkQueue::preloaded(chunks_dynamic(10, 4).unwrap());
        let ids: Vec<usize> = std::iter::from_fn(|| queue.pop()).map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_run_queue_processes_everything() {
        let (ctx, mut rx) = context(|item| Ok(item.range().sum()));
        ctx.run_queue(WorkQueue::preloaded(chunks_dynamic(12, 3).unwrap()));

        let mut total = 0;
        while let Ok(WorkerEvent::Completed { result, .. }) = rx.try_recv() {
            total += result.value;
        }
        assert_eq!(total, 66);
    }

    #[test]
    fn test_failure_stops_worker() {
        let (ctx, mut rx) = context(|item| {
            if item.id == 1 {
                Err("bad chunk".into())
            } else {
                Ok(0)
            }
        });
        ctx.run_assigned(chunks_dynamic(12, 3).unwrap());

        assert!(matches!(rx.try_recv(), Ok(WorkerEvent::Completed { .. })));
        match rx.try_recv() {
            Ok(WorkerEvent::Failed(ScheduleError::WorkerFailure { item_id, message })) => {
                assert_eq!(item_id, 1);
                assert_eq!(message, "bad chunk");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_failure_cancels_other_workers() {
        let (ctx, _rx) = context(|_| Err("always".into()));
        let token = ctx.cancel.clone();
        ctx.run_assigned(vec![WorkItem::new(0, 0, 1)]);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_panic_becomes_worker_failure() {
        let (ctx, mut rx) = context(|_| panic!("index out of range"));
        ctx.run_assigned(vec![WorkItem::new(4, 0, 2)]);
        match rx.try_recv() {
            Ok(WorkerEvent::Failed(ScheduleError::WorkerFailure { item_id, message })) => {
                assert_eq!(item_id, 4);
                assert!(message.contains("index out of range"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_worker_does_nothing() {
        let (ctx, mut rx) = context(|_| Ok(1));
        ctx.cancel.cancel();
        ctx.run_queue(WorkQueue::preloaded(chunks_dynamic(8, 2).unwrap()));
        assert!(rx.try_recv().is_err());
    }
}
