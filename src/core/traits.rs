//! Core trait abstractions for uel
//!
//! This module defines the seams between the enumeration protocol and the
//! solving strategies:
//! - `UnificationAlgorithm`: a stateful producer of candidate unifiers
//! - `SatBackend`: something that can decide (or optimise) a CNF formula
//!
//! # Design Principles
//!
//! 1. **Lazy**: algorithms do no work until the first candidate is requested
//! 2. **Resumable**: each call continues the search where the last one stopped
//! 3. **Cancellable**: every implementation polls a shared `CancellationToken`

use crate::core::{CancellationToken, SolverStats};
use crate::error::UelResult;
use crate::goal::Unifier;
use crate::sat::{Formula, SatResult};

// ============================================================================
// Unification
// ============================================================================

/// A unification algorithm bound to one goal
///
/// Implementations are driven by [`crate::enumerator::UnifierEnumerator`],
/// which handles deduplication and the public state machine. An algorithm
/// only has to produce candidates until it runs out.
///
/// # Example
///
/// ```ignore
/// let mut algorithm = RuleProcessor::new(&goal, token);
/// while let Some(unifier) = algorithm.next_candidate()? {
///     println!("{}", unifier.render(goal.store(), None));
/// }
/// ```
pub trait UnificationAlgorithm {
    /// Short name used in logs and statistics
    fn name(&self) -> &'static str;

    /// Advance to the next candidate unifier
    ///
    /// Returns:
    /// - `Ok(Some(unifier))` for the next solution found by the search
    /// - `Ok(None)` once the search space is exhausted
    /// - `Err(Cancelled)` if the cancellation token was triggered
    ///
    /// A candidate may repeat an earlier one; callers deduplicate.
    fn next_candidate(&mut self) -> UelResult<Option<Unifier>>;

    /// Statistics collected so far
    fn stats(&self) -> SolverStats;

    /// Release external resources (processes, pipes)
    ///
    /// Called when enumeration stops early, is cancelled or is exhausted.
    fn cleanup(&mut self) {}
}

// ============================================================================
// SAT solving
// ============================================================================

/// A SAT / MaxSAT decision procedure
///
/// Weighted formulas (with soft clauses) ask for a model of the hard clauses
/// that minimises the total weight of falsified soft clauses.
pub trait SatBackend {
    /// Name of this backend
    fn name(&self) -> &str;

    /// Solve the formula, polling `cancel` while working
    fn solve(&mut self, formula: &Formula, cancel: &CancellationToken) -> UelResult<SatResult>;

    /// Decisions (or comparable work units) spent so far
    fn decisions(&self) -> usize {
        0
    }
}
