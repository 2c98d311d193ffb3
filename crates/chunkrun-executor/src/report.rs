//! What happened during a run: who executed which chunk, and how long it took.

use serde::Serialize;

use chunkrun_core::{ScheduleRun, WorkItem, WorkerId};

/// One completed work item, in the order the executor received it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRecord {
    /// Completion sequence number, starting at 0.
    pub seq: usize,
    pub item_id: usize,
    pub worker_id: WorkerId,
    pub start: usize,
    pub end: usize,
}

/// Per-worker totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub worker_id: WorkerId,
    /// Work items completed.
    pub items: usize,
    /// Iterations covered by those items.
    pub iterations: usize,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Final lifecycle record of the run.
    pub run: ScheduleRun,

    /// Pool the workers ran on.
    pub pool: &'static str,

    /// Number of workers started.
    pub workers_started: usize,

    /// Wall-clock time from dispatch to completion.
    pub elapsed_secs: f64,

    /// Completion trace.
    pub trace: Vec<ExecutionRecord>,

    /// Totals per worker, indexed by worker id.
    pub workers: Vec<WorkerStats>,
}

/// Reduced value plus the report of the run that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome<T> {
    pub value: T,
    pub report: RunReport,
}

/// Accumulates the trace while partials arrive.
#[derive(Debug, Default)]
pub(crate) struct TraceRecorder {
    trace: Vec<ExecutionRecord>,
    workers: Vec<WorkerStats>,
}

impl TraceRecorder {
    pub(crate) fn new(num_workers: usize) -> Self {
        Self {
            trace: Vec::new(),
            workers: (0..num_workers)
                .map(|i| WorkerStats {
                    worker_id: WorkerId::new(i),
                    items: 0,
                    iterations: 0,
                })
                .collect(),
        }
    }

    pub(crate) fn record(&mut self, worker_id: WorkerId, item: &WorkItem) {
        self.trace.push(ExecutionRecord {
            seq: self.trace.len(),
            item_id: item.id,
            worker_id,
            start: item.start,
            end: item.end,
        });
        if let Some(stats) = self.workers.get_mut(worker_id.index()) {
            stats.items += 1;
            stats.iterations += item.len();
        }
    }

    pub(crate) fn folded(&self) -> usize {
        self.trace.len()
    }

    pub(crate) fn finish(
        self,
        run: ScheduleRun,
        pool: &'static str,
        workers_started: usize,
        elapsed_secs: f64,
    ) -> RunReport {
        RunReport {
            run,
            pool,
            workers_started,
            elapsed_secs,
            trace: self.trace,
            workers: self.workers,
        }
    }
}

impl RunReport {
    /// Ids of completed items, in completion order.
    pub fn completed_ids(&self) -> Vec<usize> {
        self.trace.iter().map(|r| r.item_id).collect()
    }

    /// Items processed by `worker_id`, in the order it finished them.
    pub fn items_of(&self, worker_id: WorkerId) -> Vec<usize> {
        self.trace
            .iter()
            .filter(|r| r.worker_id == worker_id)
            .map(|r| r.item_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkrun_core::SchedulePolicy;

    #[test]
    fn test_recorder_tallies_per_worker() {
        let mut recorder = TraceRecorder::new(2);
        recorder.record(WorkerId::new(1), &WorkItem::new(0, 0, 4));
        recorder.record(WorkerId::new(0), &WorkItem::new(1, 4, 6));
        recorder.record(WorkerId::new(1), &WorkItem::new(2, 6, 7));
        assert_eq!(recorder.folded(), 3);

        let run = ScheduleRun::new(7, SchedulePolicy::Dynamic { chunk_size: 4 });
        let report = recorder.finish(run, "inline", 2, 0.0);
        assert_eq!(report.completed_ids(), vec![0, 1, 2]);
        assert_eq!(report.items_of(WorkerId::new(1)), vec![0, 2]);
        assert_eq!(report.workers[1].iterations, 5);
        assert_eq!(report.workers[0].items, 1);
    }

    #[test]
    fn test_report_serializes() {
        let run = ScheduleRun::new(0, SchedulePolicy::Guided { min_chunk_size: 1 });
        let report = TraceRecorder::new(1).finish(run, "blocking", 0, 0.5);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["pool"], "blocking");
        assert_eq!(json["run"]["policy"]["kind"], "guided");
        assert_eq!(json["workers"][0]["worker_id"], 0);
    }
}
