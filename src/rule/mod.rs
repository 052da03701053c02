//! Rule-based unification
//!
//! Goals are split into flat subsumptions `A1 ⊓ … ⊓ An ⊑ B`. A fixed set of
//! rules solves them while building, for every variable `X`, a set of
//! non-variable atoms `S_X`; nondeterministic choices are explored by
//! backtracking. Every complete derivation yields a candidate unifier.

pub mod assignment;
pub mod processor;
pub mod rules;
pub mod subsumption;

pub use assignment::Assignment;
pub use processor::{RuleProcessor, SearchState};
pub use rules::{Application, Rule, RuleResult};
pub use subsumption::FlatSubsumption;
