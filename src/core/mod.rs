//! Core abstractions shared by all unification processors
//!
//! This module provides:
//! - `traits`: the solver seams (`UnificationAlgorithm`, `SatBackend`)
//! - `cancel`: cooperative cancellation shared between caller and solver
//! - `stats`: solver statistics reported through `UnificationAlgorithm::stats`

pub mod cancel;
pub mod stats;
pub mod traits;

pub use cancel::CancellationToken;
pub use stats::SolverStats;
pub use traits::*;
