//! Safety properties over control vectors.

use crate::types::{ControlVector, ProcessId, ProgramPoint};

/// Checks whether two or more processes are in the critical section.
pub fn violates_mutex(control: &ControlVector) -> bool {
    control.count(ProgramPoint::Critical) >= 2
}

/// Processes in the critical section, in process order.
pub fn critical_processes(control: &ControlVector) -> Vec<ProcessId> {
    control.processes_at(ProgramPoint::Critical).collect()
}
