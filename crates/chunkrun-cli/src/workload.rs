//! Built-in compute functions for experimenting with schedules.

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use rand::Rng;
use serde::Serialize;

use chunkrun_core::WorkItem;
use chunkrun_executor::BoxError;

/// Per-chunk compute function handed to the scheduler.
pub type ComputeFn = Box<dyn Fn(&WorkItem) -> Result<u128, BoxError> + Send + Sync>;

/// What each chunk computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Workload {
    /// Sum of the indices.
    Sum,
    /// Sum of the squared indices.
    Squares,
    /// Dot product of `a[i] = i` and `b[i] = 2i`.
    Dot,
}

impl Workload {
    /// Closed-form result over `[0, n)`.
    pub fn expected(&self, n: usize) -> u128 {
        let n = n as u128;
        let squares = if n == 0 {
            0
        } else {
            (n - 1) * n * (2 * n - 1) / 6
        };
        match self {
            Self::Sum => n * n.saturating_sub(1) / 2,
            Self::Squares => squares,
            Self::Dot => 2 * squares,
        }
    }

    /// Build the compute function for a problem of size `n`.
    ///
    /// With `jitter`, every chunk sleeps a random duration up to that bound
    /// before computing, to make chunk costs uneven.
    pub fn compute_fn(&self, n: usize, jitter: Option<Duration>) -> ComputeFn {
        let work: ComputeFn = match self {
            Self::Sum => Box::new(|item: &WorkItem| -> Result<u128, BoxError> {
                Ok(item.range().map(|i| i as u128).sum())
            }),
            Self::Squares => Box::new(|item: &WorkItem| -> Result<u128, BoxError> {
                Ok(item.range().map(|i| (i as u128) * (i as u128)).sum())
            }),
            Self::Dot => {
                // Shared read-only inputs.
                let a: Arc<Vec<u64>> = Arc::new((0..n as u64).collect());
                let b: Arc<Vec<u64>> = Arc::new((0..n as u64).map(|i| 2 * i).collect());
                Box::new(move |item: &WorkItem| -> Result<u128, BoxError> {
                    let (a, b) = (&a[item.range()], &b[item.range()]);
                    Ok(a.iter().zip(b).map(|(&x, &y)| x as u128 * y as u128).sum())
                })
            }
        };

        match jitter {
            Some(max) if !max.is_zero() => Box::new(move |item: &WorkItem| -> Result<u128, BoxError> {
                let pause = rand::thread_rng().gen_range(Duration::ZERO..=max);
                std::thread::sleep(pause);
                work(item)
            }),
            _ => work,
        }
    }
}

/// Reduction used by every workload.
pub fn add(a: u128, b: u128) -> Result<u128, BoxError> {
    a.checked_add(b).ok_or_else(|| "sum overflowed u128".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkrun_core::chunks_dynamic;

    fn fold(workload: Workload, n: usize) -> u128 {
        let compute = workload.compute_fn(n, None);
        chunks_dynamic(n, 7)
            .unwrap()
            .iter()
            .map(|item| compute(item).unwrap())
            .fold(0, |acc, v| add(acc, v).unwrap())
    }

    #[test]
    fn test_workloads_match_closed_form() {
        for n in [0, 1, 2, 10, 50, 333] {
            for workload in [Workload::Sum, Workload::Squares, Workload::Dot] {
                assert_eq!(fold(workload, n), workload.expected(n), "{workload:?} n={n}");
            }
        }
    }

    #[test]
    fn test_known_values() {
        assert_eq!(Workload::Sum.expected(12), 66);
        assert_eq!(Workload::Squares.expected(50), 40425);
        assert_eq!(Workload::Dot.expected(40), 41080);
    }

    #[test]
    fn test_jitter_keeps_result() {
        let compute = Workload::Sum.compute_fn(10, Some(Duration::from_millis(1)));
        assert_eq!(compute(&WorkItem::new(0, 0, 10)).unwrap(), 45);
    }
}
