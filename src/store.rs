//! Incremental store of difference constraints over ticket variables.
//!
//! The store keeps an arena of ticket variables (cells referenced by
//! [`TicketVar`] index), the relations added so far, and a *closed*
//! difference-bound matrix: entry `(i, j)` is the tightest known bound on
//! `x_i - x_j`, with row/column 0 standing for the constant zero. Closure
//! is maintained incrementally on every [`add`][ConstraintStore::add], so
//! satisfiability is decided by a negative-cycle check on the new edge only.
//!
//! Every mutation is recorded on a trail. [`mark`][ConstraintStore::mark]
//! returns the current trail height and [`undo`][ConstraintStore::undo]
//! rolls the store back to it, truncating the variable arena as well. This
//! is what lets a single store serve a whole depth-first search.

use std::cmp::min;
use std::fmt;

use log::{debug, trace};

use crate::bound::Bound;
use crate::error::{EncodingError, StoreError, Unsatisfiable};
use crate::relation::{Expr, Relation};

/// A ticket variable (1-indexed; 0 is the zero reference row).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TicketVar(u32);

impl TicketVar {
    pub fn id(self) -> u32 {
        self.0
    }

    fn row(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TicketVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

#[derive(Debug, Copy, Clone)]
struct Cell {
    retired: bool,
}

#[derive(Debug, Copy, Clone)]
enum Undo {
    Bound { row: usize, col: usize, old: Bound },
    Fresh,
    Relation,
    Retire(usize),
}

/// A saved trail height.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Mark(usize);

#[derive(Clone)]
pub struct ConstraintStore {
    cells: Vec<Cell>,
    matrix: Vec<Vec<Bound>>,
    relations: Vec<Relation<TicketVar>>,
    trail: Vec<Undo>,
}

impl ConstraintStore {
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            matrix: vec![vec![Bound::ZERO]],
            relations: Vec::new(),
            trail: Vec::new(),
        }
    }

    /// Number of ticket variables ever created (live or retired).
    pub fn num_vars(&self) -> usize {
        self.cells.len()
    }

    /// Relations added so far, in order.
    pub fn relations(&self) -> &[Relation<TicketVar>] {
        &self.relations
    }

    pub fn is_live(&self, var: TicketVar) -> bool {
        matches!(self.cell(var), Some(cell) if !cell.retired)
    }

    fn cell(&self, var: TicketVar) -> Option<&Cell> {
        var.row().checked_sub(1).and_then(|i| self.cells.get(i))
    }

    /// Allocates a fresh, unconstrained ticket variable.
    pub fn fresh(&mut self) -> TicketVar {
        self.cells.push(Cell { retired: false });
        let id = self.cells.len();
        for row in self.matrix.iter_mut() {
            row.push(Bound::Infinite);
        }
        let mut row = vec![Bound::Infinite; id + 1];
        row[id] = Bound::ZERO;
        self.matrix.push(row);
        self.trail.push(Undo::Fresh);
        TicketVar(id as u32)
    }

    /// Discards a ticket variable.
    ///
    /// Bounds already derived through the variable stay in the matrix, but
    /// no new relation may mention it.
    pub fn retire(&mut self, var: TicketVar) -> Result<(), EncodingError> {
        self.check_var(var)?;
        self.cells[var.row() - 1].retired = true;
        self.trail.push(Undo::Retire(var.row()));
        Ok(())
    }

    pub fn mark(&self) -> Mark {
        Mark(self.trail.len())
    }

    /// Rolls the store back to `mark`.
    pub fn undo(&mut self, mark: Mark) {
        while self.trail.len() > mark.0 {
            match self.trail.pop() {
                Some(Undo::Bound { row, col, old }) => self.matrix[row][col] = old,
                Some(Undo::Fresh) => {
                    self.matrix.pop();
                    for row in self.matrix.iter_mut() {
                        row.pop();
                    }
                    self.cells.pop();
                }
                Some(Undo::Relation) => {
                    self.relations.pop();
                }
                Some(Undo::Retire(row)) => self.cells[row - 1].retired = false,
                None => break,
            }
        }
    }

    fn check_var(&self, var: TicketVar) -> Result<(), EncodingError> {
        match self.cell(var) {
            None => Err(EncodingError::UnknownVariable(var.id())),
            Some(cell) if cell.retired => Err(EncodingError::RetiredVariable(var.id())),
            Some(_) => Ok(()),
        }
    }

    fn check_relation(&self, relation: &Relation<TicketVar>) -> Result<(), EncodingError> {
        relation
            .lhs
            .terms()
            .iter()
            .chain(relation.rhs.terms())
            .try_for_each(|&(_, v)| self.check_var(v))
    }

    /// Extends the store with one relation.
    ///
    /// On failure the store is left exactly as it was.
    pub fn add(&mut self, relation: Relation<TicketVar>) -> Result<(), StoreError> {
        self.check_relation(&relation)?;
        let differences = relation.differences()?;

        let mark = self.mark();
        for d in differences {
            let i = d.plus.map_or(0, TicketVar::row);
            let j = d.minus.map_or(0, TicketVar::row);
            if let Err(e) = self.constrain(i, j, d.bound) {
                debug!("add({}) => unsatisfiable", relation);
                self.undo(mark);
                return Err(e.into());
            }
        }

        debug!("add({})", relation);
        self.relations.push(relation);
        self.trail.push(Undo::Relation);
        Ok(())
    }

    /// Adds `x_i - x_j <= b` and restores closure.
    fn constrain(&mut self, i: usize, j: usize, b: Bound) -> Result<(), Unsatisfiable> {
        // The new edge closes a cycle through (j, i).
        if !self.matrix[j][i].add(b).is_consistent_cycle() {
            return Err(Unsatisfiable);
        }
        if b >= self.matrix[i][j] {
            return Ok(());
        }

        // Entries in row j and column i cannot shrink here, since the cycle
        // through the new edge is non-negative, so updating in place is safe.
        let n = self.matrix.len();
        for k in 0..n {
            let via = self.matrix[k][i].add(b);
            if !via.is_finite() {
                continue;
            }
            for l in 0..n {
                let candidate = via.add(self.matrix[j][l]);
                if candidate < self.matrix[k][l] {
                    trace!("tighten ({}, {}): {} -> {}", k, l, self.matrix[k][l], candidate);
                    self.set(k, l, candidate);
                }
            }
        }
        Ok(())
    }

    fn set(&mut self, row: usize, col: usize, bound: Bound) {
        let old = self.matrix[row][col];
        self.trail.push(Undo::Bound { row, col, old });
        self.matrix[row][col] = bound;
    }

    /// Checks whether the store extended with `relation` is satisfiable,
    /// without changing the store.
    pub fn probe(&mut self, relation: &Relation<TicketVar>) -> Result<bool, EncodingError> {
        let mark = self.mark();
        let result = match self.add(relation.clone()) {
            Ok(()) => Ok(true),
            Err(StoreError::Unsatisfiable) => Ok(false),
            Err(StoreError::Encoding(e)) => Err(e),
        };
        self.undo(mark);
        result
    }

    /// Checks whether every solution of the store satisfies `relation`.
    pub fn entails(&mut self, relation: &Relation<TicketVar>) -> Result<bool, EncodingError> {
        for negation in relation.negations() {
            if self.probe(&negation)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Tightest known bound on `plus - minus` (`None` is the constant zero).
    pub fn bound(&self, plus: Option<TicketVar>, minus: Option<TicketVar>) -> Bound {
        let i = plus.map_or(0, TicketVar::row);
        let j = minus.map_or(0, TicketVar::row);
        self.matrix[i][j]
    }

    /// Projects the store onto the given variables, renaming each one.
    ///
    /// The result lists every finite bound between the chosen variables and
    /// zero, as relations over the new names. Variables not listed are
    /// eliminated; since the matrix is closed, this loses nothing about the
    /// listed ones.
    pub fn project<V: Copy + Eq>(&self, vars: &[(V, TicketVar)]) -> Vec<Relation<V>> {
        let slots: Vec<(Option<V>, usize)> = std::iter::once((None, 0))
            .chain(vars.iter().map(|&(name, var)| (Some(name), var.row())))
            .collect();

        let mut relations = Vec::new();
        for &(a, i) in &slots {
            for &(b, j) in &slots {
                if i == j {
                    continue;
                }
                let bound = self.matrix[i][j];
                let Some(c) = bound.value() else {
                    continue;
                };
                let strict = bound.is_strict();
                // x_i - x_j <= c, read as a bound on x_j whenever possible.
                let relation = match (a, b) {
                    (_, Some(b)) => {
                        let rhs = match a {
                            Some(a) => Expr::var(a) - c,
                            None => Expr::constant(-c),
                        };
                        if strict {
                            Expr::var(b).gt(rhs)
                        } else {
                            Expr::var(b).ge(rhs)
                        }
                    }
                    (Some(a), None) => {
                        if strict {
                            Expr::var(a).lt(Expr::constant(c))
                        } else {
                            Expr::var(a).le(Expr::constant(c))
                        }
                    }
                    (None, None) => continue,
                };
                relations.push(relation);
            }
        }
        relations
    }

    /// The least integer assignment satisfying the store, if one exists.
    ///
    /// Strict bounds are tightened to their integer counterparts first, so
    /// a store satisfiable over the reals may still have no integer
    /// solution. Unbounded variables are set to their upper bound, or 0.
    pub fn least_integer_solution(&self) -> Option<Solution> {
        let n = self.matrix.len();
        let mut m: Vec<Vec<Bound>> = self
            .matrix
            .iter()
            .map(|row| row.iter().map(|b| b.tighten()).collect())
            .collect();
        if !close(&mut m) {
            return None;
        }

        let mut values = vec![0; n];
        for v in 1..n {
            let value = match (m[0][v].value(), m[v][0].value()) {
                (Some(lower), _) => -lower,
                (None, Some(upper)) => upper,
                (None, None) => 0,
            };
            m[v][0] = min(m[v][0], Bound::le(value));
            m[0][v] = min(m[0][v], Bound::le(-value));
            if !close(&mut m) {
                return None;
            }
            values[v] = value;
        }
        Some(Solution(values))
    }
}

/// Floyd-Warshall closure. Returns `false` on a negative cycle.
fn close(m: &mut [Vec<Bound>]) -> bool {
    let n = m.len();
    for k in 0..n {
        for i in 0..n {
            if !m[i][k].is_finite() {
                continue;
            }
            for j in 0..n {
                let candidate = m[i][k].add(m[k][j]);
                if candidate < m[i][j] {
                    m[i][j] = candidate;
                }
            }
        }
    }
    (0..n).all(|i| m[i][i].is_consistent_cycle())
}

impl Default for ConstraintStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConstraintStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintStore")
            .field("vars", &self.cells.len())
            .field("relations", &self.relations.len())
            .field("trail", &self.trail.len())
            .finish()
    }
}

impl fmt::Display for ConstraintStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, relation) in self.relations.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", relation)?;
        }
        write!(f, "}}")
    }
}

/// A concrete integer value for every ticket variable of a store.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Solution(Vec<i64>);

impl Solution {
    pub fn value(&self, var: TicketVar) -> i64 {
        self.0[var.row()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn v(x: TicketVar) -> Expr<TicketVar> {
        Expr::var(x)
    }
    fn c(k: i64) -> Expr<TicketVar> {
        Expr::constant(k)
    }

    #[test]
    fn test_fresh_is_unconstrained() {
        let mut store = ConstraintStore::new();
        let a = store.fresh();
        let b = store.fresh();
        assert_eq!(store.num_vars(), 2);
        assert_eq!(store.bound(Some(a), Some(b)), Bound::Infinite);
        assert_eq!(store.bound(Some(a), Some(a)), Bound::ZERO);
        assert!(store.probe(&v(a).lt(c(-100))).unwrap());
    }

    #[test]
    fn test_closure() {
        let mut store = ConstraintStore::new();
        let a = store.fresh();
        let b = store.fresh();
        store.add(v(a).ge(c(1))).unwrap();
        store.add(v(b).ge(v(a) + 1)).unwrap();
        // b >= 2 is implied.
        assert_eq!(store.bound(None, Some(b)), Bound::le(-2));
        assert!(store.entails(&v(b).ge(c(2))).unwrap());
        assert!(!store.entails(&v(b).ge(c(3))).unwrap());
    }

    #[test]
    fn test_unsatisfiable_leaves_store_unchanged() {
        let mut store = ConstraintStore::new();
        let a = store.fresh();
        let b = store.fresh();
        store.add(v(b).ge(v(a) + 1)).unwrap();
        let before = store.mark();

        let result = store.add(v(b).lt(v(a)));
        assert_eq!(result, Err(StoreError::Unsatisfiable));
        assert_eq!(store.mark(), before);
        assert_eq!(store.relations().len(), 1);
    }

    #[test]
    fn test_strictness() {
        let mut store = ConstraintStore::new();
        let a = store.fresh();
        let b = store.fresh();
        store.add(v(a).le(v(b))).unwrap();
        // a <= b and b <= a is fine (a = b) ...
        assert!(store.probe(&v(b).le(v(a))).unwrap());
        // ... but b < a is not.
        assert!(!store.probe(&v(b).lt(v(a))).unwrap());
    }

    #[test]
    fn test_equality() {
        let mut store = ConstraintStore::new();
        let a = store.fresh();
        let b = store.fresh();
        store.add(v(a).equals(v(b) + 3)).unwrap();
        assert!(store.entails(&v(a).gt(v(b))).unwrap());
        assert!(!store.probe(&v(a).lt(v(b) + 3)).unwrap());
    }

    #[test]
    fn test_constant_relations() {
        let mut store = ConstraintStore::new();
        store.add(c(0).le(c(1))).unwrap();
        assert_eq!(store.add(c(1).lt(c(1))), Err(StoreError::Unsatisfiable));
    }

    #[test]
    fn test_undo_restores_arena() {
        let mut store = ConstraintStore::new();
        let a = store.fresh();
        store.add(v(a).ge(c(1))).unwrap();
        let mark = store.mark();

        let b = store.fresh();
        store.add(v(b).ge(v(a) + 1)).unwrap();
        store.retire(a).unwrap();
        assert_eq!(store.num_vars(), 2);
        assert!(!store.is_live(a));

        store.undo(mark);
        assert_eq!(store.num_vars(), 1);
        assert!(store.is_live(a));
        assert_eq!(store.relations().len(), 1);
        assert_eq!(store.bound(None, Some(a)), Bound::le(-1));
    }

    #[test]
    fn test_encoding_errors() {
        let mut store = ConstraintStore::new();
        let a = store.fresh();
        store.retire(a).unwrap();
        assert_eq!(
            store.add(v(a).ge(c(1))),
            Err(StoreError::Encoding(EncodingError::RetiredVariable(1)))
        );
        assert_eq!(
            store.add(v(TicketVar(9)).ge(c(1))),
            Err(StoreError::Encoding(EncodingError::UnknownVariable(9)))
        );

        let b = store.fresh();
        assert!(matches!(
            store.add((v(b) + v(b)).ge(c(1))),
            Err(StoreError::Encoding(EncodingError::NotDifference { .. }))
        ));
    }

    #[test]
    fn test_project() {
        let mut store = ConstraintStore::new();
        let a = store.fresh();
        let b = store.fresh();
        store.add(v(a).ge(c(1))).unwrap();
        store.add(v(b).ge(v(a) + 1)).unwrap();

        let only_b: Vec<String> = store.project(&[("y", b)]).iter().map(|r| r.to_string()).collect();
        assert_eq!(only_b, vec!["y >= 2"]);

        let both: Vec<String> = store
            .project(&[("x", a), ("y", b)])
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(both, vec!["x >= 1", "y >= 2", "y >= x + 1"]);
    }

    #[test]
    fn test_project_strict_bounds() {
        let mut store = ConstraintStore::new();
        let a = store.fresh();
        let b = store.fresh();
        store.add(v(a).lt(v(b))).unwrap();
        store.add(v(b).le(c(5))).unwrap();

        let both: Vec<String> = store
            .project(&[("x", a), ("y", b)])
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(both, vec!["x < 5", "y > x", "y <= 5"]);
    }

    #[test]
    fn test_least_integer_solution() {
        let mut store = ConstraintStore::new();
        let a = store.fresh();
        let b = store.fresh();
        store.add(v(a).ge(c(1))).unwrap();
        store.add(v(b).gt(v(a))).unwrap();

        let solution = store.least_integer_solution().unwrap();
        assert_eq!(solution.value(a), 1);
        assert_eq!(solution.value(b), 2);
    }

    #[test]
    fn test_no_integer_solution() {
        // a < b < a + 1 has real solutions only.
        let mut store = ConstraintStore::new();
        let a = store.fresh();
        let b = store.fresh();
        store.add(v(a).lt(v(b))).unwrap();
        store.add(v(b).lt(v(a) + 1)).unwrap();
        assert!(store.least_integer_solution().is_none());
    }
}
