//! Linear relations over ticket variables.
//!
//! Relations are built from variables, integer constants, `+`, `-` and unary
//! negation, compared with one of `=`, `<`, `>`, `<=`, `>=`:
//!
//! ```
//! use bakery_tabling::relation::Expr;
//! use bakery_tabling::types::ProcessId;
//!
//! let t1 = Expr::var(ProcessId::new(1));
//! let t2 = Expr::var(ProcessId::new(2));
//! let r = t2.ge(t1 + 1);
//! assert_eq!(r.to_string(), "t2 >= t1 + 1");
//! ```
//!
//! The store only understands relations that normalize to a single
//! difference `x - y <= c` or `x - y < c` (either side may be the constant
//! zero). Anything else is an [`EncodingError`].

use std::fmt;
use std::ops::{Add, Neg, Sub};

use crate::bound::Bound;
use crate::error::EncodingError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Op {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Op {
    /// Operators whose disjunction is the complement of `self`.
    pub fn negated(self) -> &'static [Op] {
        match self {
            Op::Eq => &[Op::Lt, Op::Gt],
            Op::Lt => &[Op::Ge],
            Op::Gt => &[Op::Le],
            Op::Le => &[Op::Gt],
            Op::Ge => &[Op::Lt],
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Ge => ">=",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A linear expression `c1*v1 + ... + cn*vn + k` with integer coefficients.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Expr<V> {
    terms: Vec<(i64, V)>,
    constant: i64,
}

impl<V> Expr<V> {
    pub fn var(v: V) -> Self {
        Expr {
            terms: vec![(1, v)],
            constant: 0,
        }
    }

    pub fn constant(c: i64) -> Self {
        Expr {
            terms: Vec::new(),
            constant: c,
        }
    }

    pub fn terms(&self) -> &[(i64, V)] {
        &self.terms
    }

    fn scale(mut self, factor: i64) -> Self {
        for (c, _) in self.terms.iter_mut() {
            *c *= factor;
        }
        self.constant *= factor;
        self
    }
}

impl<V: Copy + Eq> Expr<V> {
    /// Merges repeated variables and drops the ones that cancel out.
    fn collect(&self) -> Vec<(i64, V)> {
        let mut merged: Vec<(i64, V)> = Vec::with_capacity(self.terms.len());
        for &(c, v) in &self.terms {
            match merged.iter_mut().find(|(_, w)| *w == v) {
                Some((acc, _)) => *acc += c,
                None => merged.push((c, v)),
            }
        }
        merged.retain(|&(c, _)| c != 0);
        merged
    }

    /// Replaces every variable by an expression over another variable type.
    pub fn substitute<W, E, F>(&self, f: &mut F) -> Result<Expr<W>, E>
    where
        F: FnMut(V) -> Result<Expr<W>, E>,
    {
        let mut result = Expr::constant(self.constant);
        for &(c, v) in &self.terms {
            result = result + f(v)?.scale(c);
        }
        Ok(result)
    }

    pub fn equals(self, rhs: Expr<V>) -> Relation<V> {
        Relation::new(self, Op::Eq, rhs)
    }
    pub fn lt(self, rhs: Expr<V>) -> Relation<V> {
        Relation::new(self, Op::Lt, rhs)
    }
    pub fn gt(self, rhs: Expr<V>) -> Relation<V> {
        Relation::new(self, Op::Gt, rhs)
    }
    pub fn le(self, rhs: Expr<V>) -> Relation<V> {
        Relation::new(self, Op::Le, rhs)
    }
    pub fn ge(self, rhs: Expr<V>) -> Relation<V> {
        Relation::new(self, Op::Ge, rhs)
    }
}

impl<V> Add for Expr<V> {
    type Output = Expr<V>;

    fn add(mut self, rhs: Expr<V>) -> Self::Output {
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
        self
    }
}

impl<V> Add<i64> for Expr<V> {
    type Output = Expr<V>;

    fn add(mut self, rhs: i64) -> Self::Output {
        self.constant += rhs;
        self
    }
}

impl<V> Neg for Expr<V> {
    type Output = Expr<V>;

    fn neg(self) -> Self::Output {
        self.scale(-1)
    }
}

impl<V> Sub for Expr<V> {
    type Output = Expr<V>;

    fn sub(self, rhs: Expr<V>) -> Self::Output {
        self + -rhs
    }
}

impl<V> Sub<i64> for Expr<V> {
    type Output = Expr<V>;

    fn sub(self, rhs: i64) -> Self::Output {
        self + -rhs
    }
}

impl<V: fmt::Display> fmt::Display for Expr<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (c, v)) in self.terms.iter().enumerate() {
            let magnitude = c.unsigned_abs();
            if i == 0 {
                if *c < 0 {
                    write!(f, "-")?;
                }
            } else if *c < 0 {
                write!(f, " - ")?;
            } else {
                write!(f, " + ")?;
            }
            if magnitude != 1 {
                write!(f, "{}*", magnitude)?;
            }
            write!(f, "{}", v)?;
        }
        if self.terms.is_empty() {
            write!(f, "{}", self.constant)
        } else if self.constant < 0 {
            write!(f, " - {}", self.constant.unsigned_abs())
        } else if self.constant > 0 {
            write!(f, " + {}", self.constant)
        } else {
            Ok(())
        }
    }
}

/// One atomic relation `lhs op rhs`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Relation<V> {
    pub lhs: Expr<V>,
    pub op: Op,
    pub rhs: Expr<V>,
}

/// A normalized relation `plus - minus <= c` (or `< c`).
///
/// `None` on either side stands for the constant zero.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Difference<V> {
    pub plus: Option<V>,
    pub minus: Option<V>,
    pub bound: Bound,
}

impl<V> Relation<V> {
    pub fn new(lhs: Expr<V>, op: Op, rhs: Expr<V>) -> Self {
        Relation { lhs, op, rhs }
    }
}

impl<V: Copy + Eq + fmt::Display> Relation<V> {
    /// The complement of this relation, as alternative single relations.
    pub fn negations(&self) -> Vec<Relation<V>> {
        self.op
            .negated()
            .iter()
            .map(|&op| Relation::new(self.lhs.clone(), op, self.rhs.clone()))
            .collect()
    }

    /// Rewrites the relation over another variable type.
    pub fn substitute<W, E, F>(&self, mut f: F) -> Result<Relation<W>, E>
    where
        F: FnMut(V) -> Result<Expr<W>, E>,
    {
        Ok(Relation::new(
            self.lhs.substitute(&mut f)?,
            self.op,
            self.rhs.substitute(&mut f)?,
        ))
    }

    /// Normalizes the relation into difference constraints.
    ///
    /// `=` yields two constraints, every other operator one. A relation
    /// without variables yields a single `0 - 0` constraint whose bound
    /// decides it.
    pub fn differences(&self) -> Result<Vec<Difference<V>>, EncodingError> {
        let d = self.lhs.clone() - self.rhs.clone();
        let terms = d.collect();
        let k = d.constant;
        let negated: Vec<(i64, V)> = terms.iter().map(|&(c, v)| (-c, v)).collect();

        // lhs - rhs = sum + k, compared against zero.
        let result = match self.op {
            Op::Le => vec![self.difference(&terms, Bound::le(-k))?],
            Op::Lt => vec![self.difference(&terms, Bound::lt(-k))?],
            Op::Ge => vec![self.difference(&negated, Bound::le(k))?],
            Op::Gt => vec![self.difference(&negated, Bound::lt(k))?],
            Op::Eq => vec![
                self.difference(&terms, Bound::le(-k))?,
                self.difference(&negated, Bound::le(k))?,
            ],
        };
        Ok(result)
    }

    fn difference(&self, terms: &[(i64, V)], bound: Bound) -> Result<Difference<V>, EncodingError> {
        let mut plus = None;
        let mut minus = None;
        for &(c, v) in terms {
            let slot = match c {
                1 => &mut plus,
                -1 => &mut minus,
                _ => return Err(self.not_difference()),
            };
            if slot.replace(v).is_some() {
                return Err(self.not_difference());
            }
        }
        Ok(Difference { plus, minus, bound })
    }

    fn not_difference(&self) -> EncodingError {
        EncodingError::NotDifference {
            relation: self.to_string(),
        }
    }
}

impl<V: fmt::Display> fmt::Display for Relation<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    struct V(u32);

    impl fmt::Display for V {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "v{}", self.0)
        }
    }

    fn x() -> Expr<V> {
        Expr::var(V(1))
    }
    fn y() -> Expr<V> {
        Expr::var(V(2))
    }

    #[test]
    fn test_display() {
        assert_eq!((x() + 1).to_string(), "v1 + 1");
        assert_eq!((-x() - y()).to_string(), "-v1 - v2");
        assert_eq!(Expr::<V>::constant(0).to_string(), "0");
        assert_eq!((x() + x()).to_string(), "v1 + v1");
        assert_eq!(y().ge(x() + 1).to_string(), "v2 >= v1 + 1");
    }

    #[test]
    fn test_negations() {
        let r = x().equals(y());
        let negs: Vec<_> = r.negations().iter().map(|r| r.to_string()).collect();
        assert_eq!(negs, vec!["v1 < v2", "v1 > v2"]);

        assert_eq!(x().lt(y()).negations()[0].op, Op::Ge);
        assert_eq!(x().gt(y()).negations()[0].op, Op::Le);
        assert_eq!(x().le(y()).negations()[0].op, Op::Gt);
        assert_eq!(x().ge(y()).negations()[0].op, Op::Lt);
    }

    #[test]
    fn test_differences_ge() {
        // v2 >= v1 + 1  <=>  v1 - v2 <= -1
        let d = y().ge(x() + 1).differences().unwrap();
        assert_eq!(
            d,
            vec![Difference {
                plus: Some(V(1)),
                minus: Some(V(2)),
                bound: Bound::le(-1),
            }]
        );
    }

    #[test]
    fn test_differences_constant_side() {
        // v1 >= 1  <=>  0 - v1 <= -1
        let d = x().ge(Expr::constant(1)).differences().unwrap();
        assert_eq!(d[0].plus, None);
        assert_eq!(d[0].minus, Some(V(1)));
        assert_eq!(d[0].bound, Bound::le(-1));

        // v1 < 5  <=>  v1 - 0 < 5
        let d = x().lt(Expr::constant(5)).differences().unwrap();
        assert_eq!(d[0].plus, Some(V(1)));
        assert_eq!(d[0].minus, None);
        assert_eq!(d[0].bound, Bound::lt(5));
    }

    #[test]
    fn test_differences_eq() {
        let d = x().equals(y() + 2).differences().unwrap();
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].bound, Bound::le(2));
        assert_eq!(d[1].bound, Bound::le(-2));
    }

    #[test]
    fn test_cancellation() {
        // v1 + v2 - v2 > 0  <=>  0 - v1 < 0
        let d = (x() + y()).gt(y()).differences().unwrap();
        assert_eq!(d[0].plus, None);
        assert_eq!(d[0].minus, Some(V(1)));
        assert_eq!(d[0].bound, Bound::lt(0));
    }

    #[test]
    fn test_not_difference() {
        assert!(matches!(
            (x() + x()).le(y()).differences(),
            Err(EncodingError::NotDifference { .. })
        ));
        assert!(matches!(
            (x() + y()).le(Expr::constant(1)).differences(),
            Err(EncodingError::NotDifference { .. })
        ));
    }

    #[test]
    fn test_substitute() {
        let r = y().ge(x() + 1);
        let s: Relation<V> = r
            .substitute(|v: V| -> Result<Expr<V>, ()> {
                Ok(if v == V(1) { Expr::constant(0) } else { Expr::var(V(7)) })
            })
            .unwrap();
        assert_eq!(s.to_string(), "v7 >= 1");
    }
}
