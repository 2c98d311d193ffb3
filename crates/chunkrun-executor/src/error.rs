//! Errors surfaced by a scheduled run.

use std::time::Duration;

use thiserror::Error;

use chunkrun_core::CoreError;

/// Error type accepted from compute and reduce functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that end a ScheduleRun.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// Malformed scheduling input. Raised before any worker starts.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The compute function failed or panicked on a work item.
    #[error("Worker failed on work item {item_id}: {message}")]
    WorkerFailure { item_id: usize, message: String },

    /// The reduce function failed while folding a work item's partial.
    #[error("Reduction failed on work item {item_id}: {message}")]
    ReductionError { item_id: usize, message: String },

    /// The run was cancelled from outside.
    #[error("Run cancelled")]
    Cancelled,

    /// The run did not finish in time.
    #[error("Run timed out after {0:?}")]
    Timeout(Duration),

    /// A worker unit could not be joined.
    #[error("Worker pool error: {0}")]
    Pool(String),

    /// Fewer partials were folded than work items were dispatched.
    #[error("Run incomplete: folded {folded} of {expected} work items")]
    Incomplete { expected: usize, folded: usize },

    /// Illegal lifecycle transition.
    #[error("Invalid run state: {0}")]
    InvalidState(String),
}

impl From<CoreError> for ScheduleError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidParameter(msg) => Self::InvalidParameter(msg),
            other @ CoreError::InvalidStateTransition { .. } => {
                Self::InvalidState(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_invalid_parameter_maps_through() {
        let err: ScheduleError = CoreError::InvalidParameter("chunk_size must be >= 1".into()).into();
        assert_eq!(
            err,
            ScheduleError::InvalidParameter("chunk_size must be >= 1".into())
        );
    }

    #[test]
    fn test_worker_failure_message_names_item() {
        let err = ScheduleError::WorkerFailure {
            item_id: 7,
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Worker failed on work item 7: boom");
    }
}
