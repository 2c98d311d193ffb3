//! Scheduling policies modeled on OpenMP's `schedule` clause.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Name of a scheduling policy, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Static,
    Dynamic,
    Guided,
}

impl PolicyKind {
    /// All kinds, in the order they are usually compared.
    pub const ALL: [PolicyKind; 3] = [Self::Static, Self::Dynamic, Self::Guided];

    /// Lowercase policy name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Guided => "guided",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            "guided" => Ok(Self::Guided),
            other => Err(CoreError::invalid(format!("unknown schedule policy '{other}'"))),
        }
    }
}

/// How the iteration space is cut and handed to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SchedulePolicy {
    /// Fixed-size blocks assigned round-robin before execution.
    Static { chunk_size: usize, num_workers: usize },

    /// Fixed-size blocks pulled from a shared queue.
    Dynamic { chunk_size: usize },

    /// Halving blocks, floored at `min_chunk_size`, pulled from a shared queue.
    Guided { min_chunk_size: usize },
}

impl SchedulePolicy {
    /// Build a policy from its name and the usual `chunk`/`workers` knobs.
    ///
    /// For guided scheduling `chunk` is the minimum chunk size and `workers`
    /// is ignored.
    pub fn from_kind(kind: PolicyKind, chunk: usize, workers: usize) -> Self {
        match kind {
            PolicyKind::Static => Self::Static {
                chunk_size: chunk,
                num_workers: workers,
            },
            PolicyKind::Dynamic => Self::Dynamic { chunk_size: chunk },
            PolicyKind::Guided => Self::Guided {
                min_chunk_size: chunk,
            },
        }
    }

    /// The policy's name.
    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Static { .. } => PolicyKind::Static,
            Self::Dynamic { .. } => PolicyKind::Dynamic,
            Self::Guided { .. } => PolicyKind::Guided,
        }
    }

    /// Reject zero chunk sizes and zero worker counts.
    pub fn validate(&self) -> Result<(), CoreError> {
        match *self {
            Self::Static {
                chunk_size,
                num_workers,
            } => {
                if chunk_size == 0 {
                    return Err(CoreError::invalid("chunk_size must be >= 1"));
                }
                if num_workers == 0 {
                    return Err(CoreError::invalid("num_workers must be >= 1"));
                }
            }
            Self::Dynamic { chunk_size } => {
                if chunk_size == 0 {
                    return Err(CoreError::invalid("chunk_size must be >= 1"));
                }
            }
            Self::Guided { min_chunk_size } => {
                if min_chunk_size == 0 {
                    return Err(CoreError::invalid("min_chunk_size must be >= 1"));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for SchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static {
                chunk_size,
                num_workers,
            } => write!(f, "static(chunk={chunk_size}, workers={num_workers})"),
            Self::Dynamic { chunk_size } => write!(f, "dynamic(chunk={chunk_size})"),
            Self::Guided { min_chunk_size } => write!(f, "guided(min_chunk={min_chunk_size})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy_names() {
        assert_eq!("static".parse::<PolicyKind>().unwrap(), PolicyKind::Static);
        assert_eq!(" Dynamic ".parse::<PolicyKind>().unwrap(), PolicyKind::Dynamic);
        assert_eq!("GUIDED".parse::<PolicyKind>().unwrap(), PolicyKind::Guided);
    }

    #[test]
    fn test_unknown_policy_is_invalid_parameter() {
        let err = "runtime".parse::<PolicyKind>().unwrap_err();
        assert!(matches!(err, CoreError::InvalidParameter(_)));
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        for kind in PolicyKind::ALL {
            let policy = SchedulePolicy::from_kind(kind, 0, 4);
            assert!(policy.validate().is_err(), "{policy} should be rejected");
        }
        let policy = SchedulePolicy::from_kind(PolicyKind::Static, 2, 0);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_policy_serializes_with_kind_tag() {
        let policy = SchedulePolicy::Guided { min_chunk_size: 2 };
        let json = serde_json::to_string(&policy).unwrap();
        assert_eq!(json, r#"{"kind":"guided","min_chunk_size":2}"#);
    }
}
