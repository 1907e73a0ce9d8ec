//! Symbolic states.
//!
//! A symbolic state pairs a [`ControlVector`] with one [`Ticket`] per
//! process. Idle processes hold the concrete ticket 0; every other process
//! holds a ticket variable of the shared [`ConstraintStore`], which carries
//! everything known about the values those variables may take.

use std::fmt;

use crate::error::EncodingError;
use crate::relation::{Expr, Relation};
use crate::store::{ConstraintStore, Solution, TicketVar};
use crate::types::{ControlVector, ProcessId, ProgramPoint};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Ticket {
    /// Concrete 0: no active ticket.
    Idle,
    Held(TicketVar),
}

impl Ticket {
    pub fn var(self) -> Option<TicketVar> {
        match self {
            Ticket::Idle => None,
            Ticket::Held(v) => Some(v),
        }
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ticket::Idle => write!(f, "0"),
            Ticket::Held(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SymbolicState {
    control: ControlVector,
    tickets: Vec<Ticket>,
}

impl SymbolicState {
    /// All `n` processes idle, all tickets 0.
    pub fn initial(n: usize) -> Self {
        Self {
            control: ControlVector::idle(n),
            tickets: vec![Ticket::Idle; n],
        }
    }

    pub fn num_processes(&self) -> usize {
        self.tickets.len()
    }

    pub fn control(&self) -> &ControlVector {
        &self.control
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn point(&self, pid: ProcessId) -> ProgramPoint {
        self.control.get(pid)
    }

    pub fn ticket(&self, pid: ProcessId) -> Ticket {
        self.tickets[pid.index()]
    }

    /// Moves `pid` to `point`, holding `ticket`.
    pub(crate) fn update(&mut self, pid: ProcessId, point: ProgramPoint, ticket: Ticket) {
        self.control.set(pid, point);
        self.tickets[pid.index()] = ticket;
    }

    /// Live ticket variables, in process order.
    pub fn held(&self) -> impl Iterator<Item = (ProcessId, TicketVar)> + '_ {
        self.control
            .iter()
            .zip(&self.tickets)
            .filter_map(|((pid, _), t)| t.var().map(|v| (pid, v)))
    }

    /// Checks `control[p] = Idle <=> ticket[p] = 0` for every process.
    pub fn check_idle_invariant(&self) -> Result<(), EncodingError> {
        for ((pid, point), ticket) in self.control.iter().zip(&self.tickets) {
            let idle = point == ProgramPoint::Idle;
            if idle != (*ticket == Ticket::Idle) {
                return Err(EncodingError::IdleInvariant { process: pid.id() });
            }
        }
        Ok(())
    }

    /// The ticket of `pid` as an expression: its variable, or the constant 0.
    pub fn ticket_expr(&self, pid: ProcessId) -> Result<Expr<TicketVar>, EncodingError> {
        if !self.control.contains(pid) {
            return Err(EncodingError::UnknownProcess {
                process: pid.id(),
                processes: self.num_processes(),
            });
        }
        Ok(match self.ticket(pid) {
            Ticket::Idle => Expr::constant(0),
            Ticket::Held(v) => Expr::var(v),
        })
    }

    /// Substitutes this state's tickets into a relation over processes.
    pub fn instantiate(
        &self,
        relation: &Relation<ProcessId>,
    ) -> Result<Relation<TicketVar>, EncodingError> {
        relation.substitute(|pid| self.ticket_expr(pid))
    }

    /// The constraint region of this state, over process slots.
    ///
    /// This is the store projected onto the live tickets, so it does not
    /// depend on how the store names its variables or on retired ones.
    pub fn region(&self, store: &ConstraintStore) -> Region {
        let vars: Vec<(ProcessId, TicketVar)> = self.held().collect();
        Region(store.project(&vars))
    }

    /// Concrete ticket values under `solution`.
    pub fn concrete_tickets(&self, solution: &Solution) -> Vec<i64> {
        self.tickets
            .iter()
            .map(|t| t.var().map_or(0, |v| solution.value(v)))
            .collect()
    }
}

impl fmt::Display for SymbolicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.control)?;
        for (i, t) in self.tickets.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", t)?;
        }
        write!(f, "]")
    }
}

/// A conjunction of relations over process tickets (`t1`, `t2`, ...).
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Region(Vec<Relation<ProcessId>>);

impl Region {
    pub fn relations(&self) -> &[Relation<ProcessId>] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<Relation<ProcessId>>> for Region {
    fn from(relations: Vec<Relation<ProcessId>>) -> Self {
        Region(relations)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, relation) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", relation)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: u32) -> ProcessId {
        ProcessId::new(id)
    }

    #[test]
    fn test_initial_state() {
        let state = SymbolicState::initial(3);
        assert_eq!(state.num_processes(), 3);
        assert_eq!(state.control().count(ProgramPoint::Idle), 3);
        assert!(state.tickets().iter().all(|&t| t == Ticket::Idle));
        assert_eq!(state.held().count(), 0);
        assert!(state.check_idle_invariant().is_ok());
        assert_eq!(state.to_string(), "[idle, idle, idle] [0, 0, 0]");
    }

    #[test]
    fn test_idle_invariant() {
        let mut store = ConstraintStore::new();
        let mut state = SymbolicState::initial(2);
        let v = store.fresh();

        state.update(p(1), ProgramPoint::Waiting, Ticket::Idle);
        assert_eq!(
            state.check_idle_invariant(),
            Err(EncodingError::IdleInvariant { process: 1 })
        );

        state.update(p(1), ProgramPoint::Waiting, Ticket::Held(v));
        assert!(state.check_idle_invariant().is_ok());

        state.update(p(2), ProgramPoint::Idle, Ticket::Held(v));
        assert!(state.check_idle_invariant().is_err());
    }

    #[test]
    fn test_instantiate() {
        let mut store = ConstraintStore::new();
        let mut state = SymbolicState::initial(2);
        let v = store.fresh();
        state.update(p(2), ProgramPoint::Waiting, Ticket::Held(v));

        let relation = Expr::var(p(2)).ge(Expr::var(p(1)) + 1);
        let instance = state.instantiate(&relation).unwrap();
        assert_eq!(instance.to_string(), "_1 >= 1");

        let bad = Expr::var(p(3)).ge(Expr::constant(0));
        assert_eq!(
            state.instantiate(&bad),
            Err(EncodingError::UnknownProcess {
                process: 3,
                processes: 2
            })
        );
    }

    #[test]
    fn test_region_ignores_retired() {
        let mut store = ConstraintStore::new();
        let mut state = SymbolicState::initial(2);

        let a = store.fresh();
        store.add(Expr::var(a).ge(Expr::constant(1))).unwrap();
        state.update(p(1), ProgramPoint::Waiting, Ticket::Held(a));

        let b = store.fresh();
        store.add(Expr::var(b).ge(Expr::var(a) + 1)).unwrap();
        state.update(p(2), ProgramPoint::Waiting, Ticket::Held(b));
        assert_eq!(state.region(&store).to_string(), "{t1 >= 1, t2 >= 2, t2 >= t1 + 1}");

        store.retire(a).unwrap();
        state.update(p(1), ProgramPoint::Idle, Ticket::Idle);
        assert_eq!(state.region(&store).to_string(), "{t2 >= 2}");
    }
}
