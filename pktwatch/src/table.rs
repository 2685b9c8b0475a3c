use std::fmt;

use crate::error::Result;
use crate::key::TargetKey;

/// Outcome of a successful counter table read.
///
/// `NotYetObserved` means the kernel has not created an entry for the key,
/// which is the normal state until the first matching packet arrives. It is
/// not the same as `Observed(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterReading {
    Observed(u64),
    NotYetObserved,
}

impl CounterReading {
    pub fn count(self) -> Option<u64> {
        match self {
            CounterReading::Observed(n) => Some(n),
            CounterReading::NotYetObserved => None,
        }
    }
}

impl fmt::Display for CounterReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterReading::Observed(n) => write!(f, "{n}"),
            CounterReading::NotYetObserved => f.write_str("not observed"),
        }
    }
}

/// Read-only view of the key -> packet count table written by the kernel.
///
/// Implementations never retry. Anything other than "no entry yet" is
/// reported as [`AgentError::LookupFailed`](crate::error::AgentError) and
/// the caller decides what to do with it.
pub trait CounterTable {
    fn lookup(&self, key: TargetKey) -> Result<CounterReading>;
}
