//! Type-safe wrappers for processes and their control state.
//!
//! This module provides newtype wrappers that keep process identifiers,
//! program points and control vectors apart, so that a process id can never
//! be confused with a ticket variable or an index into the constraint store.
use std::fmt;

/// A process identifier (1-indexed).
///
/// # Invariants
///
/// - Process IDs must be >= 1
/// - Process IDs are fixed for the whole run and range over `1..=N`
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ProcessId(u32);

impl ProcessId {
    /// Creates a new process identifier.
    ///
    /// # Panics
    ///
    /// Panics if `id == 0`. Processes are 1-indexed.
    pub fn new(id: u32) -> Self {
        assert_ne!(id, 0, "Process IDs must be >= 1");
        ProcessId(id)
    }

    /// Returns the raw process ID.
    pub fn id(self) -> u32 {
        self.0
    }

    /// Returns the 0-based position of this process in a control vector.
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// The process at 0-based position `index`, if it has a valid id.
    pub fn from_index(index: usize) -> Option<ProcessId> {
        index
            .checked_add(1)
            .and_then(|id| u32::try_from(id).ok())
            .map(ProcessId)
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl From<ProcessId> for u32 {
    fn from(pid: ProcessId) -> Self {
        pid.0
    }
}

/// The program point a single process is at.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ProgramPoint {
    Idle,
    Waiting,
    Critical,
}

impl ProgramPoint {
    /// Human-readable label, as printed by trace sinks.
    pub fn label(self) -> &'static str {
        match self {
            ProgramPoint::Idle => "idle",
            ProgramPoint::Waiting => "waiting",
            ProgramPoint::Critical => "critical",
        }
    }
}

impl fmt::Display for ProgramPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One program point per process, indexed by [`ProcessId`].
///
/// This is the discrete half of a symbolic state and the key under which the
/// tabling engine files explored regions.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ControlVector(Vec<ProgramPoint>);

impl ControlVector {
    /// Creates a control vector with all `n` processes idle.
    pub fn idle(n: usize) -> Self {
        ControlVector(vec![ProgramPoint::Idle; n])
    }

    /// Number of processes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the program point of `pid`.
    ///
    /// # Panics
    ///
    /// Panics if `pid` is out of range.
    pub fn get(&self, pid: ProcessId) -> ProgramPoint {
        self.0[pid.index()]
    }

    pub fn set(&mut self, pid: ProcessId, point: ProgramPoint) {
        self.0[pid.index()] = point;
    }

    /// Checks whether `pid` names a process of this vector.
    pub fn contains(&self, pid: ProcessId) -> bool {
        pid.index() < self.0.len()
    }

    /// Iterates over `(process, program point)` pairs in process order.
    pub fn iter(&self) -> impl Iterator<Item = (ProcessId, ProgramPoint)> + '_ {
        self.0
            .iter()
            .enumerate()
            .map_while(|(i, &point)| ProcessId::from_index(i).map(|pid| (pid, point)))
    }

    /// Processes currently at `point`.
    pub fn processes_at(&self, point: ProgramPoint) -> impl Iterator<Item = ProcessId> + '_ {
        self.iter().filter(move |&(_, p)| p == point).map(|(pid, _)| pid)
    }

    /// Number of processes currently at `point`.
    pub fn count(&self, point: ProgramPoint) -> usize {
        self.0.iter().filter(|&&p| p == point).count()
    }

}

impl From<Vec<ProgramPoint>> for ControlVector {
    fn from(points: Vec<ProgramPoint>) -> Self {
        ControlVector(points)
    }
}

impl fmt::Display for ControlVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, point) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", point)?;
        }
        write!(f, "]")
    }
}
