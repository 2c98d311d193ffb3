//! ScheduleRun: the bookkeeping for one scheduled execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CoreError, RunId, RunStatus, SchedulePolicy};

/// One call to the executor, from creation to its terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRun {
    /// Unique run identifier.
    pub id: RunId,

    /// Policy the run was created with.
    pub policy: SchedulePolicy,

    /// Size of the iteration space `[0, n)`.
    pub n: usize,

    /// Current status.
    pub status: RunStatus,

    /// Number of work items, known once dispatching succeeds.
    pub items: usize,

    /// When the run was created.
    pub created_at: DateTime<Utc>,

    /// When workers were started.
    pub started_at: Option<DateTime<Utc>>,

    /// When the run reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,

    /// Error message if the run failed.
    pub error_message: Option<String>,
}

impl ScheduleRun {
    /// Create a new run in the `Created` state.
    pub fn new(n: usize, policy: SchedulePolicy) -> Self {
        Self {
            id: RunId::generate(),
            policy,
            n,
            status: RunStatus::Created,
            items: 0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error_message: None,
        }
    }

    /// Builder method to set a specific ID (useful for testing).
    pub fn with_id(mut self, id: RunId) -> Self {
        self.id = id;
        self
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: RunStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Mark the run as validating and building work items.
    pub fn dispatch(&mut self) -> Result<(), CoreError> {
        self.transition(RunStatus::Dispatching)
    }

    /// Mark the run as executing `items` work items.
    pub fn start(&mut self, items: usize) -> Result<(), CoreError> {
        self.transition(RunStatus::Running)?;
        self.items = items;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the run as folding its last partials.
    pub fn reduce(&mut self) -> Result<(), CoreError> {
        self.transition(RunStatus::Reducing)
    }

    /// Mark the run as completed.
    pub fn complete(&mut self) -> Result<(), CoreError> {
        self.transition(RunStatus::Completed)?;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the run as failed.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), CoreError> {
        self.transition(RunStatus::Failed)?;
        self.finished_at = Some(Utc::now());
        self.error_message = Some(error.into());
        Ok(())
    }

    /// Check if the run is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
