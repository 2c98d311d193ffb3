//! Partitioning of an iteration space into work items.
//!
//! All functions here are pure: the same inputs always give the same items,
//! and the items of one call always partition `[0, n)` with ids `0..k`
//! in ascending `start` order.

use crate::{AssignedItem, CoreError, SchedulePolicy, WorkItem, WorkerId};

/// Convert a signed problem size into a `usize`, rejecting negatives.
pub fn problem_size(n: i64) -> Result<usize, CoreError> {
    usize::try_from(n).map_err(|_| CoreError::invalid(format!("problem size must be >= 0, got {n}")))
}

/// Consecutive blocks of `chunk_size`, each owned by worker `block % num_workers`.
pub fn chunks_static(
    n: usize,
    chunk_size: usize,
    num_workers: usize,
) -> Result<Vec<AssignedItem>, CoreError> {
    SchedulePolicy::Static {
        chunk_size,
        num_workers,
    }
    .validate()?;

    Ok(fixed_blocks(n, chunk_size)
        .map(|item| AssignedItem {
            worker_id: WorkerId::new(item.id % num_workers),
            item,
        })
        .collect())
}

/// Consecutive blocks of `chunk_size` with no owner.
pub fn chunks_dynamic(n: usize, chunk_size: usize) -> Result<Vec<WorkItem>, CoreError> {
    SchedulePolicy::Dynamic { chunk_size }.validate()?;
    Ok(fixed_blocks(n, chunk_size).collect())
}

/// Blocks of half the remaining iterations, never smaller than `min_chunk_size`
/// (except the clipped tail).
pub fn chunks_guided(n: usize, min_chunk_size: usize) -> Result<Vec<WorkItem>, CoreError> {
    SchedulePolicy::Guided { min_chunk_size }.validate()?;

    let mut items = Vec::new();
    let mut remaining = n;
    let mut start: usize = 0;
    while remaining > 0 {
        let size = (remaining / 2).max(min_chunk_size);
        let end = start.saturating_add(size).min(n);
        items.push(WorkItem::new(items.len(), start, end));
        remaining -= end - start;
        start = end;
    }
    Ok(items)
}

/// The work items for `policy`, without owner assignment.
pub fn chunks_for(n: usize, policy: &SchedulePolicy) -> Result<Vec<WorkItem>, CoreError> {
    match *policy {
        SchedulePolicy::Static {
            chunk_size,
            num_workers,
        } => Ok(chunks_static(n, chunk_size, num_workers)?
            .into_iter()
            .map(|assigned| assigned.item)
            .collect()),
        SchedulePolicy::Dynamic { chunk_size } => chunks_dynamic(n, chunk_size),
        SchedulePolicy::Guided { min_chunk_size } => chunks_guided(n, min_chunk_size),
    }
}

/// Group static assignments per worker, keeping block order inside each bucket.
///
/// Only workers that can own a block get a bucket, so there are at most
/// `assigned.len()` buckets however large `num_workers` is.
pub fn assign_buckets(assigned: &[AssignedItem], num_workers: usize) -> Vec<Vec<WorkItem>> {
    let mut buckets = vec![Vec::new(); num_workers.min(assigned.len())];
    for a in assigned {
        buckets[a.worker_id.index()].push(a.item);
    }
    buckets
}

fn fixed_blocks(n: usize, chunk_size: usize) -> impl Iterator<Item = WorkItem> {
    (0..n)
        .step_by(chunk_size)
        .enumerate()
        .map(move |(id, start)| WorkItem::new(id, start, start.saturating_add(chunk_size).min(n)))
}
