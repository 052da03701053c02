//! SAT-based unification
//!
//! - `formula`: literals, clauses, CNF/WCNF formulas and models
//! - `literal`: the propositional vocabulary of the encoding
//! - `encoder`: goal → formula, model → unifier, blocking clauses
//! - `dpll`: built-in DPLL solver with branch-and-bound MaxSAT
//! - `external`: solver binaries driven through [`crate::process`]
//! - `output`: parser for competition-format solver output
//! - `processor`: the [`crate::core::UnificationAlgorithm`] tying it together

pub mod dpll;
pub mod encoder;
pub mod external;
pub mod formula;
pub mod literal;
pub mod output;
pub mod processor;

pub use dpll::{DpllConfig, DpllSolver, DpllStats};
pub use encoder::SatEncoder;
pub use external::ExternalSatBackend;
pub use formula::{Formula, Lit, Model, SatClause, SatResult, Var};
pub use literal::{Literal, LiteralTable};
pub use output::{parse_solver_output, SolverStatus};
pub use processor::SatProcessor;
