//! Work item and partial result types.

use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::WorkerId;

/// A half-open range `[start, end)` of the iteration space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    /// Position of this item in the chunker's output.
    pub id: usize,

    /// First iteration (inclusive).
    pub start: usize,

    /// One past the last iteration.
    pub end: usize,
}

impl WorkItem {
    /// Create a new WorkItem.
    pub fn new(id: usize, start: usize, end: usize) -> Self {
        debug_assert!(start < end, "empty work item {start}..{end}");
        Self { id, start, end }
    }

    /// Number of iterations covered.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Always false for items produced by the chunker.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// The iterations as a `Range`.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// A WorkItem pinned to the worker that must execute it (static policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedItem {
    /// Owning worker.
    pub worker_id: WorkerId,

    /// The work to do.
    pub item: WorkItem,
}

/// Value produced by one worker for one WorkItem.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResult<T> {
    /// The item this value was computed from.
    pub work_item_id: usize,

    /// The worker that produced it.
    pub worker_id: WorkerId,

    /// Computed value.
    pub value: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_item_range() {
        let item = WorkItem::new(0, 3, 7);
        assert_eq!(item.len(), 4);
        assert!(!item.is_empty());
        assert_eq!(item.range().sum::<usize>(), 3 + 4 + 5 + 6);
    }
}
