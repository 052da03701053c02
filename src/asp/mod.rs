//! ASP-based unification through clingo
//!
//! - `encoding`: goal facts and the fixed rule program
//! - `output`: clingo's JSON output and the witness terms
//!
//! clingo runs once, on the first request; its projected witnesses are then
//! handed out one by one. In minimal mode a false-sign domain heuristic on the
//! relevant `subs/2` atoms makes clingo enumerate the subset-minimal answers.

pub mod encoding;
pub mod output;

use std::collections::VecDeque;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{AspConfig, LimitsConfig};
use crate::core::{CancellationToken, SolverStats, UnificationAlgorithm};
use crate::error::{UelError, UelResult};
use crate::goal::{Goal, Unifier};
use crate::process::SolverProcess;

pub use encoding::{encode_goal, UNIFICATION_PROGRAM};
pub use output::{ClingoOutput, Term, Witness};

/// Arguments every invocation needs: JSON output, all models, projection
pub const FIXED_ARGS: [&str; 3] = ["--outf=2", "-n", "0"];

const ACCEPTED_EXIT_CODES: [i32; 4] = [0, 10, 20, 30];

/// Unification algorithm backed by an answer set solver
pub struct AspProcessor<'g> {
    goal: &'g Goal,
    process: SolverProcess,
    minimize: bool,
    cancel: CancellationToken,
    pending: Option<VecDeque<Unifier>>,
    stats: SolverStats,
}

impl<'g> AspProcessor<'g> {
    pub fn new(
        goal: &'g Goal,
        process: SolverProcess,
        minimize: bool,
        cancel: CancellationToken,
    ) -> Self {
        let mut stats = SolverStats::new("asp");
        stats.atoms = goal.store().len();
        stats.variables = goal.store().variables().len();
        Self { goal, process, minimize, cancel, pending: None, stats }
    }

    pub fn from_config(
        goal: &'g Goal,
        asp: &AspConfig,
        limits: &LimitsConfig,
        minimize: bool,
        cancel: CancellationToken,
    ) -> Self {
        let process = SolverProcess::new(&asp.command)
            .args(Self::arguments(minimize, &asp.args))
            .poll_interval(limits.poll_interval())
            .timeout(limits.timeout());
        Self::new(goal, process, minimize, cancel)
    }

    /// Full argument list for clingo
    pub fn arguments(minimize: bool, extra: &[String]) -> Vec<String> {
        let mut args: Vec<String> = FIXED_ARGS.iter().map(|s| s.to_string()).collect();
        if minimize {
            // domRec blocks every superset of a reported model, equal projections included
            args.push("--heuristic=Domain".to_string());
            args.push("--enum-mode=domRec".to_string());
        } else {
            args.push("--project".to_string());
        }
        args.extend(extra.iter().cloned());
        args
    }

    fn run_solver(&mut self) -> UelResult<VecDeque<Unifier>> {
        let program = encode_goal(self.goal, self.minimize)?;
        let command = self.process.command_line();
        debug!(command = %command, bytes = program.len(), "calling clingo");

        self.stats.solver_calls += 1;
        let output = self.process.run(program, &self.cancel)?;
        let code = output.code();
        if !code.is_some_and(|c| ACCEPTED_EXIT_CODES.contains(&c)) {
            warn!(command = %command, status = ?code, "clingo failed");
            let mut err = UelError::external(format!(
                "{} exited with status {}",
                command,
                code.map_or_else(|| "signal".to_string(), |c| c.to_string())
            ))
            .with_context("solver", command.clone());
            if let Some(line) = output.stderr.lines().find(|l| !l.trim().is_empty()) {
                err = err.with_cause(line.trim().to_string());
            }
            return Err(err.in_goal(self.goal.id()));
        }

        let parsed = ClingoOutput::parse(&output.stdout_text())
            .map_err(|e| e.with_context("solver", command.clone()))?;
        if parsed.is_unsatisfiable() {
            info!(goal = self.goal.id(), "no answer sets");
            return Ok(VecDeque::new());
        }

        let store = self.goal.store();
        let witnesses = parsed.witnesses();
        let mut unifiers = VecDeque::with_capacity(witnesses.len());
        for witness in witnesses {
            let assignment = output::witness_assignment(store, witness)?;
            let mut unifier = Unifier::for_variables(store).projection(store.user_variables());
            for (var, atoms) in assignment {
                unifier.assign(var, atoms);
            }
            unifiers.push_back(unifier);
        }
        info!(
            goal = self.goal.id(),
            witnesses = unifiers.len(),
            seconds = parsed.time.map_or(0.0, |t| t.total),
            "clingo finished"
        );
        Ok(unifiers)
    }

    fn step(&mut self) -> UelResult<Option<Unifier>> {
        self.cancel.check()?;
        if self.pending.is_none() {
            let unifiers = self.run_solver()?;
            self.pending = Some(unifiers);
        }
        let next = self.pending.as_mut().and_then(VecDeque::pop_front);
        if next.is_some() {
            self.stats.candidates += 1;
        }
        Ok(next)
    }
}

impl<'g> UnificationAlgorithm for AspProcessor<'g> {
    fn name(&self) -> &'static str {
        "asp"
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
        self.pending = Some(VecDeque::new());
    }
}
