//! chunkrun Executor
//!
//! Runs the work items of a [`SchedulePolicy`](chunkrun_core::SchedulePolicy)
//! on a fixed pool of workers and reduces their partial results.
//!
//! # Example
//!
//! ```rust,no_run
//! use chunkrun_core::SchedulePolicy;
//! use chunkrun_executor::{Scheduler, SchedulerConfig};
//!
//! async fn sum() -> Result<(), Box<dyn std::error::Error>> {
//!     let scheduler = Scheduler::new(SchedulerConfig::default().with_num_workers(4));
//!
//!     let total = scheduler
//!         .run(
//!             12,
//!             SchedulePolicy::Dynamic { chunk_size: 3 },
//!             |item| Ok(item.range().sum::<usize>()),
//!             |a, b| Ok(a + b),
//!             0,
//!         )
//!         .await?;
//!
//!     assert_eq!(total, 66);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod report;
pub mod scheduler;
mod worker;

pub use config::SchedulerConfig;
pub use error::{BoxError, ScheduleError};
pub use pool::{BlockingPool, InlinePool, WorkerHandle, WorkerPool};
pub use report::{ExecutionRecord, RunOutcome, RunReport, WorkerStats};
pub use scheduler::Scheduler;
