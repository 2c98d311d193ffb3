//! Scheduler - fans work items out to a worker pool and reduces the partials.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chunkrun_core::{
    assign_buckets, chunks_dynamic, chunks_guided, chunks_static, ScheduleRun, SchedulePolicy,
    WorkItem, WorkerId,
};

use crate::pool::{panic_message, BlockingPool, WorkerHandle, WorkerPool};
use crate::report::{RunOutcome, TraceRecorder};
use crate::worker::{WorkQueue, WorkerContext, WorkerEvent};
use crate::{BoxError, ScheduleError, SchedulerConfig};

/// How work items reach the workers.
enum Dispatch {
    /// One pre-assigned bucket per worker.
    Static(Vec<Vec<WorkItem>>),
    /// One shared queue drained by `workers` workers.
    Shared { queue: Arc<WorkQueue>, workers: usize },
}

struct Plan {
    total: usize,
    width: usize,
    dispatch: Dispatch,
}

/// Executes scheduled runs on a fixed-width worker pool.
pub struct Scheduler<P = BlockingPool> {
    config: SchedulerConfig,
    pool: P,
    shutdown: CancellationToken,
}

impl Scheduler<BlockingPool> {
    /// Create a Scheduler backed by OS threads.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_pool(config, BlockingPool::new())
    }
}

impl<P: WorkerPool> Scheduler<P> {
    /// Create a Scheduler on a custom pool.
    pub fn with_pool(config: SchedulerConfig, pool: P) -> Self {
        Self {
            config,
            pool,
            shutdown: CancellationToken::new(),
        }
    }

    /// Builder method to tie runs to an external cancellation token.
    ///
    /// Cancelling the token aborts every run in progress with
    /// [`ScheduleError::Cancelled`], and every later run as well.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Run `compute` over every work item of `policy` and fold the results.
    pub async fn run<T, C, R>(
        &self,
        n: usize,
        policy: SchedulePolicy,
        compute: C,
        reduce: R,
        identity: T,
    ) -> Result<T, ScheduleError>
    where
        T: Send + 'static,
        C: Fn(&WorkItem) -> Result<T, BoxError> + Send + Sync + 'static,
        R: Fn(T, T) -> Result<T, BoxError>,
    {
        self.run_with_report(n, policy, compute, reduce, identity)
            .await
            .map(|outcome| outcome.value)
    }

    /// Like [`Scheduler::run`], also returning the execution trace.
    pub async fn run_with_report<T, C, R>(
        &self,
        n: usize,
        policy: SchedulePolicy,
        compute: C,
        reduce: R,
        identity: T,
    ) -> Result<RunOutcome<T>, ScheduleError>
    where
        T: Send + 'static,
        C: Fn(&WorkItem) -> Result<T, BoxError> + Send + Sync + 'static,
        R: Fn(T, T) -> Result<T, BoxError>,
    {
        let started = Instant::now();
        let mut run = ScheduleRun::new(n, policy);
        run.dispatch()?;

        info!(
            run_id = %run.id,
            policy = %policy,
            n,
            pool = self.pool.name(),
            "Dispatching run"
        );

        let plan = match self.plan(n, &policy) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(run_id = %run.id, error = %e, "Run rejected");
                run.fail(e.to_string())?;
                return Err(e);
            }
        };
        run.start(plan.total)?;

        // Cancelled when this function returns, so workers never outlive the run.
        let cancel = self.shutdown.child_token();
        let _guard = cancel.clone().drop_guard();

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handles = self.spawn_workers(plan.dispatch, Arc::new(compute), &events_tx, &cancel);
        drop(events_tx);
        let workers_started = handles.len();

        info!(
            run_id = %run.id,
            items = plan.total,
            workers = workers_started,
            "Run started"
        );

        let mut recorder = TraceRecorder::new(plan.width);
        let collected = self
            .collect(&mut events_rx, &cancel, &reduce, identity, &mut recorder)
            .await;
        drop(events_rx);
        let result = match collected {
            Ok(value) => join_workers(handles).await.map(|()| value),
            Err(e) => {
                // Items still executing are abandoned; their workers stop at the next
                // cancellation check.
                cancel.cancel();
                debug!(run_id = %run.id, abandoned = handles.len(), "Detaching workers");
                Err(e)
            }
        };
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                warn!(run_id = %run.id, error = %e, "Run failed");
                run.fail(e.to_string())?;
                return Err(e);
            }
        };

        run.reduce()?;
        if recorder.folded() != plan.total {
            let e = ScheduleError::Incomplete {
                expected: plan.total,
                folded: recorder.folded(),
            };
            warn!(run_id = %run.id, error = %e, "Run failed");
            run.fail(e.to_string())?;
            return Err(e);
        }
        run.complete()?;

        let elapsed = started.elapsed();
        info!(
            run_id = %run.id,
            items = plan.total,
            elapsed_ms = elapsed.as_millis() as u64,
            "Run completed"
        );

        let report = recorder.finish(run, self.pool.name(), workers_started, elapsed.as_secs_f64());
        Ok(RunOutcome { value, report })
    }

    /// Validate the policy and build the work items for it.
    fn plan(&self, n: usize, policy: &SchedulePolicy) -> Result<Plan, ScheduleError> {
        match *policy {
            SchedulePolicy::Static {
                chunk_size,
                num_workers,
            } => {
                let assigned = chunks_static(n, chunk_size, num_workers)?;
                let buckets = assign_buckets(&assigned, num_workers);
                Ok(Plan {
                    total: assigned.len(),
                    width: buckets.len(),
                    dispatch: Dispatch::Static(buckets),
                })
            }
            SchedulePolicy::Dynamic { chunk_size } => self.shared(chunks_dynamic(n, chunk_size)?),
            SchedulePolicy::Guided { min_chunk_size } => {
                self.shared(chunks_guided(n, min_chunk_size)?)
            }
        }
    }

    fn shared(&self, items: Vec<WorkItem>) -> Result<Plan, ScheduleError> {
        if self.config.num_workers == 0 {
            return Err(ScheduleError::InvalidParameter(
                "num_workers must be >= 1".to_string(),
            ));
        }
        let workers = self.config.num_workers.min(items.len());
        Ok(Plan {
            total: items.len(),
            width: workers,
            dispatch: Dispatch::Shared {
                queue: WorkQueue::preloaded(items),
                workers,
            },
        })
    }

    fn spawn_workers<T, C>(
        &self,
        dispatch: Dispatch,
        compute: Arc<C>,
        events: &mpsc::UnboundedSender<WorkerEvent<T>>,
        cancel: &CancellationToken,
    ) -> Vec<WorkerHandle>
    where
        T: Send + 'static,
        C: Fn(&WorkItem) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let context = |index: usize| WorkerContext {
            worker_id: WorkerId::new(index),
            compute: compute.clone(),
            events: events.clone(),
            cancel: cancel.clone(),
        };

        match dispatch {
            Dispatch::Static(buckets) => buckets
                .into_iter()
                .enumerate()
                .filter(|(_, bucket)| !bucket.is_empty())
                .map(|(index, bucket)| {
                    let ctx = context(index);
                    self.pool
                        .submit(ctx.worker_id, move || ctx.run_assigned(bucket))
                })
                .collect(),
            Dispatch::Shared { queue, workers } => (0..workers)
                .map(|index| {
                    let ctx = context(index);
                    let queue = queue.clone();
                    self.pool.submit(ctx.worker_id, move || ctx.run_queue(queue))
                })
                .collect(),
        }
    }

    /// Fold partials in completion order until every worker has hung up.
    async fn collect<T, R>(
        &self,
        events: &mut mpsc::UnboundedReceiver<WorkerEvent<T>>,
        cancel: &CancellationToken,
        reduce: &R,
        identity: T,
        recorder: &mut TraceRecorder,
    ) -> Result<T, ScheduleError>
    where
        R: Fn(T, T) -> Result<T, BoxError>,
    {
        let timeout = self.config.timeout;
        let deadline = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut acc = identity;
        loop {
            let event = tokio::select! {
                biased;
                event = events.recv() => event,
                _ = cancel.cancelled() => return Err(ScheduleError::Cancelled),
                _ = &mut deadline => {
                    return Err(ScheduleError::Timeout(timeout.unwrap_or_default()));
                }
            };

            match event {
                Some(WorkerEvent::Completed { item, result }) => {
                    let item_id = result.work_item_id;
                    let value = result.value;
                    acc = match panic::catch_unwind(AssertUnwindSafe(|| reduce(acc, value))) {
                        Ok(Ok(folded)) => folded,
                        Ok(Err(e)) => {
                            return Err(ScheduleError::ReductionError {
                                item_id,
                                message: e.to_string(),
                            });
                        }
                        Err(payload) => {
                            return Err(ScheduleError::ReductionError {
                                item_id,
                                message: format!("panicked: {}", panic_message(payload)),
                            });
                        }
                    };
                    recorder.record(result.worker_id, &item);
                    debug!(item_id, worker_id = %result.worker_id, "Folded partial");
                }
                Some(WorkerEvent::Failed(e)) => return Err(e),
                None if cancel.is_cancelled() => return Err(ScheduleError::Cancelled),
                None => return Ok(acc),
            }
        }
    }
}

/// Join every worker, keeping the first error.
async fn join_workers(handles: Vec<WorkerHandle>) -> Result<(), ScheduleError> {
    let mut first_error = None;
    for handle in handles {
        if let Err(e) = handle.join().await {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}
