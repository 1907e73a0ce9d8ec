//! Error types.
//!
//! Only two things can go wrong while extending a constraint store: the
//! extension is infeasible ([`Unsatisfiable`], an ordinary dead end for the
//! search), or the relation itself is outside the supported shape
//! ([`EncodingError`], a bug in whoever built the relation).

use std::fmt;

/// The extended constraint store has no solution.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Unsatisfiable;

impl fmt::Display for Unsatisfiable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constraint store is unsatisfiable")
    }
}

impl std::error::Error for Unsatisfiable {}

/// A relation or substitution the store cannot represent.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EncodingError {
    /// The relation does not normalize to `x - y <= c` or `x - y < c`.
    NotDifference { relation: String },
    /// The relation mentions a ticket variable the store never created.
    UnknownVariable(u32),
    /// The relation mentions a ticket variable that was already discarded.
    RetiredVariable(u32),
    /// A region or move mentions a process the state does not have.
    UnknownProcess { process: u32, processes: usize },
    /// A non-idle process has no ticket variable, or an idle one has.
    IdleInvariant { process: u32 },
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::NotDifference { relation } => {
                write!(f, "relation `{}` is not a difference constraint", relation)
            }
            EncodingError::UnknownVariable(v) => write!(f, "unknown ticket variable _{}", v),
            EncodingError::RetiredVariable(v) => write!(f, "ticket variable _{} was discarded", v),
            EncodingError::UnknownProcess { process, processes } => write!(
                f,
                "process {} out of range (state has {} processes)",
                process, processes
            ),
            EncodingError::IdleInvariant { process } => {
                write!(f, "process {} violates the idle/ticket invariant", process)
            }
        }
    }
}

impl std::error::Error for EncodingError {}

/// Failure of [`ConstraintStore::add`][crate::store::ConstraintStore::add].
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StoreError {
    Unsatisfiable,
    Encoding(EncodingError),
}

impl From<Unsatisfiable> for StoreError {
    fn from(_: Unsatisfiable) -> Self {
        StoreError::Unsatisfiable
    }
}

impl From<EncodingError> for StoreError {
    fn from(e: EncodingError) -> Self {
        StoreError::Encoding(e)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unsatisfiable => write!(f, "{}", Unsatisfiable),
            StoreError::Encoding(e) => write!(f, "encoding error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Unsatisfiable => None,
            StoreError::Encoding(e) => Some(e),
        }
    }
}

/// Invalid checker configuration.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CheckError {
    ZeroProcesses,
    /// Process ids are `u32`; larger process counts cannot be numbered.
    TooManyProcesses { processes: usize },
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckError::ZeroProcesses => write!(f, "process count must be positive"),
            CheckError::TooManyProcesses { processes } => {
                write!(f, "{} processes exceed the largest process id {}", processes, u32::MAX)
            }
        }
    }
}

impl std::error::Error for CheckError {}
