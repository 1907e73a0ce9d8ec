//! # bakery-tabling: symbolic safety checking of the Bakery algorithm
//!
//! **`bakery-tabling`** checks mutual exclusion for Lamport's Bakery algorithm with `N`
//! processes, without bounding the ticket values. Tickets are kept symbolic: every state
//! pairs a concrete control vector with a conjunction of linear relations over ticket
//! variables, and exploration is a depth-first search that memoizes explored regions
//! (*tabling*) to cut off the infinite ticket space.
//!
//! ## How it works
//!
//! - **Difference constraints**: every relation the Bakery model produces has the form
//!   `x - y ⋈ c` or `x ⋈ c`. The [`ConstraintStore`][crate::store::ConstraintStore] keeps
//!   them as a closed difference-bound matrix, so satisfiability is decided exactly and
//!   incrementally, with strict and non-strict bounds kept apart.
//! - **Chronological backtracking**: store mutations go to a trail. The search takes a
//!   [`Mark`][crate::store::Mark] before each branch and rolls back to it afterwards.
//! - **Tabling**: for every control vector, the [`Table`][crate::table::Table] keeps the
//!   explored regions as their negations. A new state whose region is contained in an
//!   explored one is pruned.
//! - **Witnesses**: a violation comes with the path that reached it and, when possible,
//!   concrete integer tickets for every step.
//!
//! ## Basic Usage
//!
//! ```rust
//! use bakery_tabling::model::{BakeryModel, DrawRule, EntryRule};
//! use bakery_tabling::search::{check, CheckerConfig};
//!
//! // The correct algorithm is safe for three processes.
//! let config = CheckerConfig::default().with_processes(3);
//! let report = check(&config, &BakeryModel::default()).unwrap();
//! assert!(report.outcome.is_safe());
//!
//! // Allowing equal tickets and entering on ties breaks it.
//! let broken = BakeryModel::default()
//!     .with_draw(DrawRule::Weak)
//!     .with_entry(EntryRule::NonStrict);
//! let report = check(&CheckerConfig::default(), &broken).unwrap();
//! assert!(report.outcome.is_violation());
//! ```
//!
//! ## Core Components
//!
//! - **[`relation`]**: linear expressions and relations, and their difference form.
//! - **[`store`]**: the constraint store with trail, projection and integer solutions.
//! - **[`state`]**: symbolic states and their regions.
//! - **[`model`]**: the Bakery transition relation.
//! - **[`table`]**: region memoization and subsumption.
//! - **[`search`]**: the search driver, budgets, reports and witnesses.
//! - **[`trace`]**: observers of visited states.

pub mod bound;
pub mod error;
pub mod model;
pub mod property;
pub mod relation;
pub mod search;
pub mod state;
pub mod store;
pub mod table;
pub mod trace;
pub mod types;
