//! External SAT / MaxSAT solvers
//!
//! Plain formulas go to the SAT command as DIMACS CNF, weighted formulas to
//! the MaxSAT command as WCNF. Both are expected to follow the competition
//! output format (see [`crate::sat::output`]).

use tracing::{debug, warn};

use crate::config::{LimitsConfig, SatConfig};
use crate::core::{CancellationToken, SatBackend};
use crate::error::{UelError, UelResult};
use crate::process::SolverProcess;
use crate::sat::formula::{Formula, SatResult};
use crate::sat::output::parse_solver_output;

/// Exit codes used by competition solvers (plus 0 for solvers that don't)
const ACCEPTED_EXIT_CODES: [i32; 4] = [0, 10, 20, 30];

/// SAT backend that runs solver binaries
#[derive(Debug, Clone)]
pub struct ExternalSatBackend {
    sat: SolverProcess,
    maxsat: SolverProcess,
}

impl ExternalSatBackend {
    pub fn new(sat: SolverProcess, maxsat: SolverProcess) -> Self {
        Self { sat, maxsat }
    }

    pub fn from_config(sat: &SatConfig, limits: &LimitsConfig) -> Self {
        let process = |command: &str, args: &[String]| {
            SolverProcess::new(command)
                .args(args.iter().cloned())
                .poll_interval(limits.poll_interval())
                .timeout(limits.timeout())
        };
        Self::new(
            process(&sat.command, &sat.args),
            process(&sat.maxsat_command, &sat.maxsat_args),
        )
    }
}

impl SatBackend for ExternalSatBackend {
    fn name(&self) -> &str {
        "external"
    }

    fn solve(&mut self, formula: &Formula, cancel: &CancellationToken) -> UelResult<SatResult> {
        cancel.check()?;
        let (process, input) = if formula.is_weighted() {
            (&self.maxsat, formula.to_wcnf())
        } else {
            (&self.sat, formula.to_dimacs())
        };
        let command = process.command_line();
        debug!(command = %command, clauses = formula.clause_count(), "calling external solver");

        let output = process.run(input, cancel)?;
        let code = output.code();
        if !code.is_some_and(|c| ACCEPTED_EXIT_CODES.contains(&c)) {
            warn!(command = %command, status = ?code, "external solver failed");
            let mut err = UelError::external(format!(
                "{} exited with status {}",
                command,
                code.map_or_else(|| "signal".to_string(), |c| c.to_string())
            ))
            .with_context("solver", command.clone());
            if let Some(line) = output.stderr.lines().find(|l| !l.trim().is_empty()) {
                err = err.with_cause(line.trim().to_string());
            }
            return Err(err);
        }

        parse_solver_output(&output.stdout).map_err(|e| e.with_context("solver", command))
    }
}
