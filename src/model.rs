//! The N-process Bakery algorithm as a nondeterministic transition relation.
//!
//! Each process cycles through three program points:
//!
//! ```text
//!            DrawTicket            EnterCritical
//!   Idle ───────────────▶ Waiting ───────────────▶ Critical
//!    ▲                                                 │
//!    └─────────────────── ExitCritical ────────────────┘
//! ```
//!
//! - **DrawTicket** introduces a fresh ticket variable `t` for the process
//!   with `t >= 1` and `t >= t_q + 1` for every other process `q` holding a
//!   ticket (the unbounded "maximum plus one" assignment, over-approximated).
//! - **EnterCritical** requires `t < t_q` for every other ticket holder `q`.
//!   Equal tickets never enter; there is no process-id tie-break.
//! - **ExitCritical** resets the ticket to the concrete 0 and discards its
//!   variable.
//!
//! Transitions are guarded by disjoint program points, so every process
//! offers exactly one transition in every state. The interleaving is the
//! only source of nondeterminism.
//!
//! The draw and entry rules can be weakened through [`DrawRule`] and
//! [`EntryRule`] to obtain broken variants of the algorithm.

use std::fmt;

use log::debug;

use crate::error::{EncodingError, StoreError};
use crate::relation::{Expr, Relation};
use crate::state::{SymbolicState, Ticket};
use crate::store::{ConstraintStore, TicketVar};
use crate::types::{ProcessId, ProgramPoint};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Transition {
    DrawTicket,
    EnterCritical,
    ExitCritical,
}

impl Transition {
    /// The only transition a process at `point` can take.
    pub fn enabled_at(point: ProgramPoint) -> Transition {
        match point {
            ProgramPoint::Idle => Transition::DrawTicket,
            ProgramPoint::Waiting => Transition::EnterCritical,
            ProgramPoint::Critical => Transition::ExitCritical,
        }
    }

    /// Program point the transition is guarded on.
    pub fn source(self) -> ProgramPoint {
        match self {
            Transition::DrawTicket => ProgramPoint::Idle,
            Transition::EnterCritical => ProgramPoint::Waiting,
            Transition::ExitCritical => ProgramPoint::Critical,
        }
    }

    pub fn target(self) -> ProgramPoint {
        match self {
            Transition::DrawTicket => ProgramPoint::Waiting,
            Transition::EnterCritical => ProgramPoint::Critical,
            Transition::ExitCritical => ProgramPoint::Idle,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::DrawTicket => "draw",
            Transition::EnterCritical => "enter",
            Transition::ExitCritical => "exit",
        };
        f.write_str(name)
    }
}

/// One process taking one transition.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Move {
    pub process: ProcessId,
    pub transition: Transition,
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{} {}", self.process.id(), self.transition)
    }
}

/// How a new ticket relates to the tickets already held.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum DrawRule {
    /// `t >= t_q + 1`: strictly above every active ticket.
    #[default]
    Strict,
    /// `t >= t_q`: ties with an active ticket are possible.
    Weak,
}

/// What a waiting process requires of every other ticket holder to enter.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum EntryRule {
    /// `t < t_q`.
    #[default]
    Strict,
    /// `t <= t_q`.
    NonStrict,
    /// No requirement at all.
    Unguarded,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BakeryModel {
    pub draw: DrawRule,
    pub entry: EntryRule,
}

impl BakeryModel {
    pub fn with_draw(mut self, draw: DrawRule) -> Self {
        self.draw = draw;
        self
    }

    pub fn with_entry(mut self, entry: EntryRule) -> Self {
        self.entry = entry;
        self
    }

    /// All moves offered in `state`, one per process, in process order.
    pub fn moves(&self, state: &SymbolicState) -> Vec<Move> {
        state
            .control()
            .iter()
            .map(|(process, point)| Move {
                process,
                transition: Transition::enabled_at(point),
            })
            .collect()
    }

    /// Applies `mv` to `state`, extending `store` with the guard relations.
    ///
    /// On failure the store may hold part of the extension; the caller is
    /// expected to roll it back to a mark taken before the call.
    pub fn apply(
        &self,
        state: &SymbolicState,
        mv: Move,
        store: &mut ConstraintStore,
    ) -> Result<SymbolicState, StoreError> {
        let p = mv.process;
        if !state.control().contains(p) {
            return Err(EncodingError::UnknownProcess {
                process: p.id(),
                processes: state.num_processes(),
            }
            .into());
        }
        if state.point(p) != mv.transition.source() {
            // Not offered in this state; nothing can follow from it.
            return Err(StoreError::Unsatisfiable);
        }
        debug!("apply({}) to {}", mv, state);

        let mut next = state.clone();
        match mv.transition {
            Transition::DrawTicket => {
                let t = store.fresh();
                store.add(Expr::var(t).ge(Expr::constant(1)))?;
                for (q, u) in Self::others(state, p)? {
                    let relation = match self.draw {
                        DrawRule::Strict => Expr::var(t).ge(Expr::var(u) + 1),
                        DrawRule::Weak => Expr::var(t).ge(Expr::var(u)),
                    };
                    debug!("draw: {} against {}", relation, q);
                    store.add(relation)?;
                }
                next.update(p, mv.transition.target(), Ticket::Held(t));
            }
            Transition::EnterCritical => {
                let t = Self::own_ticket(state, p)?;
                for (q, u) in Self::others(state, p)? {
                    let relation: Option<Relation<TicketVar>> = match self.entry {
                        EntryRule::Strict => Some(Expr::var(t).lt(Expr::var(u))),
                        EntryRule::NonStrict => Some(Expr::var(t).le(Expr::var(u))),
                        EntryRule::Unguarded => None,
                    };
                    if let Some(relation) = relation {
                        debug!("enter: {} against {}", relation, q);
                        store.add(relation)?;
                    }
                }
                next.update(p, mv.transition.target(), Ticket::Held(t));
            }
            Transition::ExitCritical => {
                let t = Self::own_ticket(state, p)?;
                store.retire(t)?;
                next.update(p, mv.transition.target(), Ticket::Idle);
            }
        }
        Ok(next)
    }

    fn own_ticket(state: &SymbolicState, p: ProcessId) -> Result<TicketVar, EncodingError> {
        state
            .ticket(p)
            .var()
            .ok_or(EncodingError::IdleInvariant { process: p.id() })
    }

    /// Ticket variables of every non-idle process other than `p`.
    fn others(
        state: &SymbolicState,
        p: ProcessId,
    ) -> Result<Vec<(ProcessId, TicketVar)>, EncodingError> {
        state
            .control()
            .iter()
            .filter(|&(q, point)| q != p && point != ProgramPoint::Idle)
            .map(|(q, _)| {
                state
                    .ticket(q)
                    .var()
                    .map(|u| (q, u))
                    .ok_or(EncodingError::IdleInvariant { process: q.id() })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn mv(process: u32, transition: Transition) -> Move {
        Move {
            process: ProcessId::new(process),
            transition,
        }
    }

    #[test]
    fn test_guards_are_disjoint() {
        for point in [ProgramPoint::Idle, ProgramPoint::Waiting, ProgramPoint::Critical] {
            let enabled: Vec<_> = [
                Transition::DrawTicket,
                Transition::EnterCritical,
                Transition::ExitCritical,
            ]
            .into_iter()
            .filter(|t| t.source() == point)
            .collect();
            assert_eq!(enabled, vec![Transition::enabled_at(point)]);
        }
    }

    #[test]
    fn test_apply_reaches_target() {
        let model = BakeryModel::default();
        let mut store = ConstraintStore::new();
        let mut state = SymbolicState::initial(1);
        for _ in 0..3 {
            let moves = model.moves(&state);
            let &[next_move] = moves.as_slice() else {
                panic!("one move per process");
            };
            state = model.apply(&state, next_move, &mut store).unwrap();
            assert_eq!(state.point(next_move.process), next_move.transition.target());
            assert_eq!(
                Transition::enabled_at(next_move.transition.target()).source(),
                next_move.transition.target()
            );
        }
        assert_eq!(state.point(ProcessId::new(1)), ProgramPoint::Idle);
    }

    #[test]
    fn test_moves_one_per_process() {
        let model = BakeryModel::default();
        let state = SymbolicState::initial(3);
        let moves = model.moves(&state);
        assert_eq!(moves.len(), 3);
        assert!(moves.iter().all(|m| m.transition == Transition::DrawTicket));
    }

    #[test]
    fn test_concrete_scenario() {
        let model = BakeryModel::default();
        let mut store = ConstraintStore::new();
        let s0 = SymbolicState::initial(2);

        let s1 = model.apply(&s0, mv(1, Transition::DrawTicket), &mut store).unwrap();
        let s2 = model.apply(&s1, mv(2, Transition::DrawTicket), &mut store).unwrap();
        assert_eq!(
            s2.region(&store).to_string(),
            "{t1 >= 1, t2 >= 2, t2 >= t1 + 1}"
        );

        let s3 = model.apply(&s2, mv(1, Transition::EnterCritical), &mut store).unwrap();
        assert_eq!(s3.point(ProcessId::new(1)), ProgramPoint::Critical);

        let mark = store.mark();
        let blocked = model.apply(&s3, mv(2, Transition::EnterCritical), &mut store);
        assert_eq!(blocked, Err(StoreError::Unsatisfiable));
        store.undo(mark);

        let s4 = model.apply(&s3, mv(1, Transition::ExitCritical), &mut store).unwrap();
        assert_eq!(s4.ticket(ProcessId::new(1)), Ticket::Idle);
        assert!(s4.check_idle_invariant().is_ok());

        let s5 = model.apply(&s4, mv(2, Transition::EnterCritical), &mut store).unwrap();
        assert_eq!(s5.point(ProcessId::new(2)), ProgramPoint::Critical);
    }

    #[test]
    fn test_weak_draw_allows_ties() {
        let model = BakeryModel::default()
            .with_draw(DrawRule::Weak)
            .with_entry(EntryRule::NonStrict);
        let mut store = ConstraintStore::new();
        let s0 = SymbolicState::initial(2);

        let s1 = model.apply(&s0, mv(1, Transition::DrawTicket), &mut store).unwrap();
        let s2 = model.apply(&s1, mv(2, Transition::DrawTicket), &mut store).unwrap();
        let s3 = model.apply(&s2, mv(1, Transition::EnterCritical), &mut store).unwrap();
        let s4 = model.apply(&s3, mv(2, Transition::EnterCritical), &mut store).unwrap();
        assert_eq!(s4.control().count(ProgramPoint::Critical), 2);
    }

    #[test]
    fn test_unguarded_entry() {
        let model = BakeryModel::default().with_entry(EntryRule::Unguarded);
        let mut store = ConstraintStore::new();
        let s0 = SymbolicState::initial(2);

        let s1 = model.apply(&s0, mv(1, Transition::DrawTicket), &mut store).unwrap();
        let s2 = model.apply(&s1, mv(2, Transition::DrawTicket), &mut store).unwrap();
        let s3 = model.apply(&s2, mv(2, Transition::EnterCritical), &mut store).unwrap();
        let s4 = model.apply(&s3, mv(1, Transition::EnterCritical), &mut store).unwrap();
        assert_eq!(s4.control().count(ProgramPoint::Critical), 2);
    }

    #[test]
    fn test_move_not_offered() {
        let model = BakeryModel::default();
        let mut store = ConstraintStore::new();
        let s0 = SymbolicState::initial(2);
        assert_eq!(
            model.apply(&s0, mv(1, Transition::ExitCritical), &mut store),
            Err(StoreError::Unsatisfiable)
        );
        assert!(matches!(
            model.apply(&s0, mv(5, Transition::DrawTicket), &mut store),
            Err(StoreError::Encoding(EncodingError::UnknownProcess { .. }))
        ));
    }
}
