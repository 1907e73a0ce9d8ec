//! Bounds on differences of ticket variables.
//!
//! A bound `b` on the pair `(x, y)` states `x - y <= c` (non-strict) or
//! `x - y < c` (strict). The absent bound is `+∞`. Bounds are ordered by how
//! much they admit: a smaller bound is a tighter constraint.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Bound {
    Finite { value: i64, strict: bool },
    Infinite,
}

impl Bound {
    /// `x - y <= 0`, the bound every diagonal entry must respect.
    pub const ZERO: Bound = Bound::Finite {
        value: 0,
        strict: false,
    };

    /// Non-strict bound `<= value`.
    pub const fn le(value: i64) -> Self {
        Bound::Finite {
            value,
            strict: false,
        }
    }

    /// Strict bound `< value`.
    pub const fn lt(value: i64) -> Self {
        Bound::Finite {
            value,
            strict: true,
        }
    }

    pub fn is_finite(self) -> bool {
        matches!(self, Bound::Finite { .. })
    }

    pub fn value(self) -> Option<i64> {
        match self {
            Bound::Finite { value, .. } => Some(value),
            Bound::Infinite => None,
        }
    }

    pub fn is_strict(self) -> bool {
        matches!(self, Bound::Finite { strict: true, .. })
    }

    /// Sum of two bounds along a path `x - y` then `y - z`.
    ///
    /// The result is strict if either operand is.
    pub fn add(self, other: Bound) -> Bound {
        match (self, other) {
            (
                Bound::Finite {
                    value: a,
                    strict: s1,
                },
                Bound::Finite {
                    value: b,
                    strict: s2,
                },
            ) => Bound::Finite {
                value: a.saturating_add(b),
                strict: s1 || s2,
            },
            _ => Bound::Infinite,
        }
    }

    /// Checks whether a cycle with this total weight admits a solution.
    pub fn is_consistent_cycle(self) -> bool {
        self >= Bound::ZERO
    }

    /// Integer tightening: `x - y < c` becomes `x - y <= c - 1`.
    pub fn tighten(self) -> Bound {
        match self {
            Bound::Finite {
                value,
                strict: true,
            } => Bound::le(value.saturating_sub(1)),
            other => other,
        }
    }
}

impl Ord for Bound {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Bound::Infinite, Bound::Infinite) => Ordering::Equal,
            (Bound::Infinite, _) => Ordering::Greater,
            (_, Bound::Infinite) => Ordering::Less,
            (
                Bound::Finite {
                    value: a,
                    strict: s1,
                },
                Bound::Finite {
                    value: b,
                    strict: s2,
                },
            ) => a.cmp(b).then_with(|| match (s1, s2) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            }),
        }
    }
}

impl PartialOrd for Bound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Finite {
                value,
                strict: true,
            } => write!(f, "<{}", value),
            Bound::Finite {
                value,
                strict: false,
            } => write!(f, "<={}", value),
            Bound::Infinite => write!(f, "<∞"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Bound::lt(0) < Bound::le(0));
        assert!(Bound::le(-1) < Bound::lt(0));
        assert!(Bound::le(100) < Bound::Infinite);
        assert_eq!(Bound::le(3).max(Bound::lt(3)), Bound::le(3));
    }

    #[test]
    fn test_add() {
        assert_eq!(Bound::le(1).add(Bound::le(2)), Bound::le(3));
        assert_eq!(Bound::le(1).add(Bound::lt(-1)), Bound::lt(0));
        assert_eq!(Bound::le(1).add(Bound::Infinite), Bound::Infinite);
    }

    #[test]
    fn test_cycle_consistency() {
        assert!(Bound::le(0).is_consistent_cycle());
        assert!(Bound::lt(1).is_consistent_cycle());
        assert!(!Bound::lt(0).is_consistent_cycle());
        assert!(!Bound::le(-1).is_consistent_cycle());
    }

    #[test]
    fn test_tighten() {
        assert_eq!(Bound::lt(0).tighten(), Bound::le(-1));
        assert_eq!(Bound::le(0).tighten(), Bound::le(0));
        assert_eq!(Bound::Infinite.tighten(), Bound::Infinite);
    }
}
