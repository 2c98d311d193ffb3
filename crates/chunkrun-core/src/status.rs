//! Lifecycle status of a ScheduleRun.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a ScheduleRun.
///
/// ```text
/// Created -> Dispatching -> Running -> Reducing -> Completed
///                 |            |           |
///                 +------------+-----------+--> Failed
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Run created, nothing validated yet.
    #[default]
    Created,
    /// Parameters validated, work items being built and handed out.
    Dispatching,
    /// Workers are executing work items.
    Running,
    /// All partials received, final fold in progress.
    Reducing,
    /// Final value produced.
    Completed,
    /// Validation, worker or reduction failure, or the run was aborted.
    Failed,
}

impl RunStatus {
    /// Returns true if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, next),
            (Created, Dispatching)
                | (Dispatching, Running)
                | (Dispatching, Failed)
                | (Running, Reducing)
                | (Running, Failed)
                | (Reducing, Completed)
                | (Reducing, Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "CREATED",
            Self::Dispatching => "DISPATCHING",
            Self::Running => "RUNNING",
            Self::Reducing => "REDUCING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            RunStatus::Created,
            RunStatus::Dispatching,
            RunStatus::Running,
            RunStatus::Reducing,
            RunStatus::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in [RunStatus::Dispatching, RunStatus::Running, RunStatus::Failed] {
            assert!(!RunStatus::Completed.can_transition_to(next));
            assert!(!RunStatus::Failed.can_transition_to(next));
        }
        assert!(!RunStatus::Created.can_transition_to(RunStatus::Failed));
    }
}
