//! Tabling: memoization of explored constraint regions.
//!
//! For every control vector, the table keeps the regions already explored
//! from it, each stored as its negation: a list of single-relation
//! disjuncts, one per relation of the region with the operator inverted.
//! A candidate state is *covered* when its region adds nothing new, i.e.
//! when none of its solutions escapes the stored regions.
//!
//! Two subsumption checks are available:
//!
//! - [`Subsumption::PerRegion`]: the candidate is covered if some single
//!   stored region contains it, i.e. every disjunct of that region's
//!   negation is infeasible against the candidate's store.
//! - [`Subsumption::Union`]: the candidate is covered if it is contained in
//!   the union of the stored regions. This backtracks over one disjunct per
//!   stored region, looking for a satisfiable combination; finding none
//!   means covered.
//!
//! Regions are written over process slots (`t1`, `t2`, ...) and substituted
//! with the candidate's own ticket variables before each probe. The table is
//! append-only for the lifetime of a run.
//!
//! A lookup may be given a deadline. Union subsumption checks the clock at
//! every backtracking step and answers [`Coverage::Unknown`] once it passes.

use std::collections::HashMap;
use std::time::Instant;

use log::debug;

use crate::error::{EncodingError, StoreError};
use crate::relation::Relation;
use crate::state::{Region, SymbolicState};
use crate::store::ConstraintStore;
use crate::types::{ControlVector, ProcessId};

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Subsumption {
    #[default]
    PerRegion,
    Union,
}

/// Answer of a deadline-bounded lookup.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Coverage {
    Covered,
    NotCovered,
    /// The deadline passed before the check finished.
    Unknown,
}

/// The complement of an explored region, as alternative relations.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NegatedRegion {
    disjuncts: Vec<Relation<ProcessId>>,
}

impl NegatedRegion {
    pub fn of(region: &Region) -> Self {
        Self {
            disjuncts: region.relations().iter().flat_map(|r| r.negations()).collect(),
        }
    }

    pub fn disjuncts(&self) -> &[Relation<ProcessId>] {
        &self.disjuncts
    }

    /// Checks whether every disjunct is infeasible against the candidate,
    /// i.e. the candidate lies inside the original region.
    fn excludes(
        &self,
        state: &SymbolicState,
        store: &mut ConstraintStore,
    ) -> Result<bool, EncodingError> {
        for disjunct in &self.disjuncts {
            if store.probe(&state.instantiate(disjunct)?)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct Table {
    entries: HashMap<ControlVector, Vec<NegatedRegion>>,
    subsumption: Subsumption,
    regions: usize,
    hits: usize,
    misses: usize,
}

impl Table {
    pub fn new(subsumption: Subsumption) -> Self {
        Self {
            subsumption,
            ..Default::default()
        }
    }

    /// Number of regions recorded.
    pub fn len(&self) -> usize {
        self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions == 0
    }

    /// Number of candidates found covered.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Number of candidates found not covered.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Negated regions recorded for `control`.
    pub fn regions(&self, control: &ControlVector) -> &[NegatedRegion] {
        self.entries.get(control).map_or(&[], Vec::as_slice)
    }

    /// Checks whether the region of `state` is already covered.
    ///
    /// `store` must be at the state's own constraints; it is probed and
    /// restored, never left changed.
    pub fn is_covered(
        &mut self,
        state: &SymbolicState,
        store: &mut ConstraintStore,
    ) -> Result<bool, EncodingError> {
        Ok(self.lookup(state, store, None)? == Coverage::Covered)
    }

    /// Like [`is_covered`][Table::is_covered], giving up at `deadline`.
    pub fn lookup(
        &mut self,
        state: &SymbolicState,
        store: &mut ConstraintStore,
        deadline: Option<Instant>,
    ) -> Result<Coverage, EncodingError> {
        let coverage = match self.entries.get(state.control()) {
            None => Coverage::NotCovered,
            Some(negations) => match self.subsumption {
                Subsumption::PerRegion => {
                    let mut coverage = Coverage::NotCovered;
                    for negation in negations {
                        if expired(deadline) {
                            coverage = Coverage::Unknown;
                            break;
                        }
                        if negation.excludes(state, store)? {
                            coverage = Coverage::Covered;
                            break;
                        }
                    }
                    coverage
                }
                Subsumption::Union => match escapes(negations, state, store, deadline)? {
                    Escape::Found => Coverage::NotCovered,
                    Escape::Blocked => Coverage::Covered,
                    Escape::Expired => Coverage::Unknown,
                },
            },
        };

        match coverage {
            Coverage::Covered => self.hits += 1,
            Coverage::NotCovered => self.misses += 1,
            Coverage::Unknown => {}
        }
        debug!("tabled({}) => {:?}", state.control(), coverage);
        Ok(coverage)
    }

    /// Records `region` as explored from `control`.
    pub fn record(&mut self, control: &ControlVector, region: &Region) {
        debug!("record({}, {})", control, region);
        self.entries
            .entry(control.clone())
            .or_default()
            .push(NegatedRegion::of(region));
        self.regions += 1;
    }
}

enum Escape {
    Found,
    Blocked,
    Expired,
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Searches for a solution of the candidate outside all `negations`' regions,
/// choosing one disjunct per region and backtracking on infeasibility.
fn escapes(
    negations: &[NegatedRegion],
    state: &SymbolicState,
    store: &mut ConstraintStore,
    deadline: Option<Instant>,
) -> Result<Escape, EncodingError> {
    let Some((first, rest)) = negations.split_first() else {
        return Ok(Escape::Found);
    };
    for disjunct in first.disjuncts() {
        if expired(deadline) {
            return Ok(Escape::Expired);
        }
        let relation = state.instantiate(disjunct)?;
        let mark = store.mark();
        match store.add(relation) {
            Ok(()) => {
                let found = escapes(rest, state, store, deadline);
                store.undo(mark);
                match found? {
                    Escape::Blocked => {}
                    outcome => return Ok(outcome),
                }
            }
            Err(StoreError::Unsatisfiable) => {}
            Err(StoreError::Encoding(e)) => return Err(e),
        }
    }
    Ok(Escape::Blocked)
}
