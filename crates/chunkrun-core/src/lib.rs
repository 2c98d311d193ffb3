//! chunkrun Core Domain Types
//!
//! This crate contains the pure scheduling domain with no dependencies on:
//! - Async runtimes
//! - Thread or process pools
//! - I/O
//!
//! It turns a problem size and a [`SchedulePolicy`] into the work items
//! that an executor fans out to its workers.

pub mod chunker;
pub mod error;
pub mod ids;
pub mod policy;
pub mod run;
pub mod status;
pub mod work;

// Re-export commonly used types
pub use chunker::{
    assign_buckets, chunks_dynamic, chunks_for, chunks_guided, chunks_static, problem_size,
};
pub use error::CoreError;
pub use ids::{RunId, WorkerId};
pub use policy::{PolicyKind, SchedulePolicy};
pub use run::ScheduleRun;
pub use status::RunStatus;
pub use work::{AssignedItem, PartialResult, WorkItem};
