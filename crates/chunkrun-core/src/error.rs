//! Core domain errors.

use thiserror::Error;

use crate::RunStatus;

/// Core domain errors for chunkrun.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Malformed scheduling input (zero chunk size, negative size, unknown policy).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid run state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: RunStatus, to: RunStatus },
}

impl CoreError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
