//! Scheduler configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Pool width for dynamic and guided runs. Static runs use the
    /// worker count carried by their policy.
    pub num_workers: usize,

    /// Abort a run that has not finished after this long.
    pub timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            num_workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4),
            timeout: None,
        }
    }
}

impl SchedulerConfig {
    /// Builder method to set the pool width.
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Builder method to set a run timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
