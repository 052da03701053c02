//! SAT-based unification
//!
//! Encodes the goal once, then alternates between solving and adding a
//! blocking clause for the unifier just found until the formula becomes
//! unsatisfiable.

use std::time::Instant;

use tracing::{debug, info};

use crate::core::{CancellationToken, SatBackend, SolverStats, UnificationAlgorithm};
use crate::error::{ErrorCode, UelError, UelResult};
use crate::goal::{Goal, Unifier};
use crate::sat::dpll::{DpllConfig, DpllSolver};
use crate::sat::encoder::SatEncoder;
use crate::sat::formula::{Formula, SatResult};

/// Unification algorithm driven by a SAT backend
pub struct SatProcessor<'g> {
    goal: &'g Goal,
    encoder: SatEncoder<'g>,
    backend: Box<dyn SatBackend + 'g>,
    formula: Option<Formula>,
    cancel: CancellationToken,
    exhausted: bool,
    stats: SolverStats,
}

impl<'g> SatProcessor<'g> {
    /// Processor using the built-in DPLL solver
    pub fn new(goal: &'g Goal, minimal: bool, cancel: CancellationToken) -> Self {
        Self::with_backend(goal, minimal, Box::new(DpllSolver::new()), cancel)
    }

    pub fn with_dpll(
        goal: &'g Goal,
        minimal: bool,
        config: DpllConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_backend(goal, minimal, Box::new(DpllSolver::with_config(config)), cancel)
    }

    pub fn with_backend(
        goal: &'g Goal,
        minimal: bool,
        backend: Box<dyn SatBackend + 'g>,
        cancel: CancellationToken,
    ) -> Self {
        let mut stats = SolverStats::new(if minimal { "sat-minimal" } else { "sat" });
        stats.atoms = goal.store().len();
        stats.variables = goal.store().variables().len();
        Self {
            goal,
            encoder: SatEncoder::new(goal, minimal),
            backend,
            formula: None,
            cancel,
            exhausted: false,
            stats,
        }
    }

    /// The encoded formula (encoding it on first use)
    pub fn formula(&mut self) -> UelResult<&Formula> {
        if self.formula.is_none() {
            let formula = self.encoder.encode()?;
            self.stats.literals = formula.num_vars() as usize;
            self.stats.clauses = formula.clause_count();
            self.formula = Some(formula);
        }
        self.formula
            .as_ref()
            .ok_or_else(|| UelError::internal("formula missing after encoding"))
    }

    fn step(&mut self) -> UelResult<Option<Unifier>> {
        if self.exhausted {
            return Ok(None);
        }
        self.cancel.check()?;
        self.formula()?;
        let Some(formula) = self.formula.as_mut() else {
            return Err(UelError::internal("formula missing after encoding"));
        };

        self.stats.solver_calls += 1;
        let result = self.backend.solve(formula, &self.cancel)?;
        self.stats.decisions = self.backend.decisions();

        match result {
            SatResult::Sat(model) => {
                let unifier = self
                    .encoder
                    .decode(&model)
                    .map_err(|e| e.with_context("solver", self.backend.name().to_string()))?;
                let blocking = self.encoder.blocking_clause(&model)?;
                formula.add_clause(blocking);
                self.stats.clauses = formula.clause_count();
                self.stats.candidates += 1;
                debug!(
                    goal = self.goal.id(),
                    call = self.stats.solver_calls,
                    cost = ?model.cost,
                    "model found"
                );
                Ok(Some(unifier))
            }
            SatResult::Unsat => {
                info!(
                    goal = self.goal.id(),
                    models = self.stats.candidates,
                    "formula exhausted"
                );
                self.exhausted = true;
                Ok(None)
            }
            SatResult::Unknown(reason) => Err(UelError::new(ErrorCode::ResourceLimit, reason)
                .in_goal(self.goal.id())
                .with_context("solver", self.backend.name().to_string())),
        }
    }
}

impl<'g> UnificationAlgorithm for SatProcessor<'g> {
    fn name(&self) -> &'static str {
        if self.encoder.is_minimal() {
            "sat-minimal"
        } else {
            "sat"
        }
    }

    fn next_candidate(&mut self) -> UelResult<Option<Unifier>> {
        let started = Instant::now();
        let result = self.step();
        self.stats.elapsed += started.elapsed();
        result
    }

    fn stats(&self) -> SolverStats {
        self.stats.clone()
    }

    fn cleanup(&mut self) {
        self.formula = None;
        self.exhausted = true;
    }
}
