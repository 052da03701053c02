//! UEL - Unification in the description logic EL
//!
//! Computes unifiers of EL unification problems: sets of equations,
//! subsumptions, disequations and dissubsumptions between conjunctions of
//! flat atoms, some of whose concept names are variables.
//!
//! # Architecture
//!
//! - [`atoms::AtomStore`] - interning table for concept names and `∃r.A` atoms
//! - [`goal::Goal`] - the unification problem and its [`goal::Unifier`]s
//! - [`core::UnificationAlgorithm`] - interface implemented by every processor
//! - [`sat::SatProcessor`] - SAT encoding, solved by the built-in DPLL solver
//!   or an external SAT/MaxSAT binary
//! - [`rule::RuleProcessor`] - goal-oriented rules with backtracking
//! - [`asp::AspProcessor`] - answer set programming through clingo
//! - [`enumerator::UnifierEnumerator`] - deduplicating, cancellable enumeration
//!
//! # Example
//!
//! ```rust
//! use uel::{AtomStore, Goal, UelConfig, UnifierEnumerator};
//!
//! let mut store = AtomStore::with_top();
//! let a = store.constant("A").unwrap();
//! let b = store.constant("B").unwrap();
//! let x = store.user_variable("X").unwrap();
//! let mut goal = Goal::new("example", store);
//! goal.add_equation([x], [a, b]).unwrap();
//!
//! let mut enumerator = UnifierEnumerator::new(&goal, UelConfig::default());
//! while enumerator.compute_next_unifier().unwrap() {
//!     let unifier = enumerator.unifier().unwrap();
//!     println!("{}", unifier.render(goal.store(), None));
//! }
//! ```

pub mod asp;
pub mod atoms;
pub mod config;
pub mod core;
pub mod el;
pub mod enumerator;
pub mod error;
pub mod goal;
pub mod process;
pub mod rule;
pub mod sat;

pub use crate::atoms::{Atom, AtomId, AtomKind, AtomStore, RoleId};
pub use crate::config::{ProcessorKind, SatBackendKind, UelConfig};
pub use crate::core::{CancellationToken, SatBackend, SolverStats, UnificationAlgorithm};
pub use crate::el::Concept;
pub use crate::enumerator::{EnumeratorState, UnifierEnumerator};
pub use crate::error::{ErrorCode, UelError, UelResult};
pub use crate::goal::{Axiom, Connective, Goal, GoalDocument, Unifier};

/// Crate version, embedded by the build script
pub const VERSION: &str = env!("UEL_VERSION");
