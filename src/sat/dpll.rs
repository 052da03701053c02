//! DPLL SAT Solver
//!
//! Implementation of the Davis-Putnam-Logemann-Loveland algorithm for
//! propositional satisfiability (SAT) solving, extended with branch and
//! bound for weighted formulas (MaxSAT).
//!
//! Features:
//! - Unit propagation with two watched literals
//! - Chronological backtracking over an explicit trail
//! - Lowest-index variable selection, false polarity first
//! - Incremental cost tracking for soft clauses

use tracing::trace;

use crate::core::{CancellationToken, SatBackend};
use crate::error::{UelError, UelResult};
use crate::sat::formula::{Formula, Lit, Model, SatResult, Var};

/// Decisions between two cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 256;

/// DPLL SAT Solver configuration
#[derive(Debug, Clone, Default)]
pub struct DpllConfig {
    /// Maximum number of decisions per call (0 = unlimited)
    pub max_decisions: usize,
}

/// Statistics of the internal solver
#[derive(Debug, Clone, Copy, Default)]
pub struct DpllStats {
    pub decisions: usize,
    pub propagations: usize,
    pub conflicts: usize,
}

/// DPLL SAT Solver
///
/// Formulas are loaded afresh on every call, so the same solver can be
/// reused while the caller keeps adding blocking clauses.
#[derive(Debug, Default)]
pub struct DpllSolver {
    config: DpllConfig,
    stats: DpllStats,
}

impl DpllSolver {
    pub fn new() -> Self {
        Self::with_config(DpllConfig::default())
    }

    pub fn with_config(config: DpllConfig) -> Self {
        DpllSolver { config, stats: DpllStats::default() }
    }

    /// Get statistics
    pub fn stats(&self) -> DpllStats {
        self.stats
    }

    /// Decide satisfiability of the hard clauses
    pub fn solve_formula(
        &mut self,
        formula: &Formula,
        cancel: &CancellationToken,
    ) -> UelResult<SatResult> {
        let mut search = Search::load(formula);
        let outcome = search.run(&self.config, cancel, &mut self.stats);
        self.stats.propagations += search.propagations;
        match outcome? {
            Outcome::Sat => Ok(SatResult::Sat(search.model(formula.num_vars(), None))),
            Outcome::Unsat => Ok(SatResult::Unsat),
            Outcome::Limit => Ok(SatResult::Unknown(format!(
                "resource limit: {} decisions",
                self.config.max_decisions
            ))),
        }
    }

    /// Find a model of the hard clauses that minimises the weight of
    /// falsified soft clauses
    pub fn solve_optimal(
        &mut self,
        formula: &Formula,
        cancel: &CancellationToken,
    ) -> UelResult<SatResult> {
        let mut search = Search::load(formula);
        let mut best: Option<Model> = None;

        loop {
            let outcome = search.run(&self.config, cancel, &mut self.stats);
            match outcome {
                Ok(Outcome::Sat) => {
                    let cost = search.cost;
                    trace!(cost, "improved model");
                    best = Some(search.model(formula.num_vars(), Some(cost)));
                    search.bound = Some(cost);
                    if cost == 0 || !search.backtrack() {
                        break;
                    }
                }
                Ok(Outcome::Unsat) => break,
                Ok(Outcome::Limit) => {
                    self.stats.propagations += search.propagations;
                    return Ok(SatResult::Unknown(format!(
                        "resource limit: {} decisions before proving optimality",
                        self.config.max_decisions
                    )));
                }
                Err(e) => {
                    self.stats.propagations += search.propagations;
                    return Err(e);
                }
            }
        }

        self.stats.propagations += search.propagations;
        Ok(match best {
            Some(model) => SatResult::Sat(model),
            None => SatResult::Unsat,
        })
    }
}

impl SatBackend for DpllSolver {
    fn name(&self) -> &str {
        "dpll"
    }

    fn solve(&mut self, formula: &Formula, cancel: &CancellationToken) -> UelResult<SatResult> {
        if formula.is_weighted() {
            self.solve_optimal(formula, cancel)
        } else {
            self.solve_formula(formula, cancel)
        }
    }

    fn decisions(&self) -> usize {
        self.stats.decisions
    }
}

// ============================================================================
// Search state
// ============================================================================

enum Outcome {
    Sat,
    Unsat,
    Limit,
}

/// Index of a literal in per-literal tables
fn code(lit: Lit) -> usize {
    (lit.var() as usize - 1) * 2 + usize::from(!lit.sign())
}

struct Search {
    num_vars: Var,
    /// Clauses with at least two literals; the first two are watched
    clauses: Vec<Vec<Lit>>,
    /// Clause indices watching each literal
    watches: Vec<Vec<usize>>,
    /// Unit clauses, asserted at level 0
    units: Vec<Lit>,
    /// An empty clause was loaded
    trivially_unsat: bool,
    /// Value per variable (index 0 unused)
    values: Vec<Option<bool>>,
    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    /// Decision literal per level and whether it was already flipped
    decisions: Vec<(Lit, bool)>,
    qhead: usize,
    /// Cost incurred when a literal becomes true
    penalty: Vec<u64>,
    cost: u64,
    /// Only models strictly cheaper than this are accepted
    bound: Option<u64>,
    initialised: bool,
    propagations: usize,
}

impl Search {
    fn load(formula: &Formula) -> Self {
        let base_vars = formula.num_vars();
        let relaxed = formula.soft().iter().filter(|(c, _)| c.literals.len() > 1).count();
        let num_vars = base_vars + relaxed as Var;
        let lit_count = num_vars as usize * 2;

        let mut search = Search {
            num_vars,
            clauses: Vec::new(),
            watches: vec![Vec::new(); lit_count],
            units: Vec::new(),
            trivially_unsat: false,
            values: vec![None; num_vars as usize + 1],
            trail: Vec::new(),
            trail_lim: Vec::new(),
            decisions: Vec::new(),
            qhead: 0,
            penalty: vec![0; lit_count],
            cost: 0,
            bound: None,
            initialised: false,
            propagations: 0,
        };

        for clause in formula.hard() {
            search.add_clause(clause.literals.clone());
        }

        let mut next_relax = base_vars;
        for (clause, weight) in formula.soft() {
            match clause.literals.as_slice() {
                [] => search.cost += weight,
                [lit] => search.penalty[code(lit.negated())] += weight,
                lits => {
                    next_relax += 1;
                    let relax = Lit::positive(next_relax);
                    let mut relaxed = lits.to_vec();
                    relaxed.push(relax);
                    search.add_clause(relaxed);
                    search.penalty[code(relax)] += weight;
                }
            }
        }
        search
    }

    fn add_clause(&mut self, mut lits: Vec<Lit>) {
        lits.sort();
        lits.dedup();
        // x ∨ ¬x
        if lits.windows(2).any(|w| w[0].var() == w[1].var()) {
            return;
        }
        match lits.len() {
            0 => self.trivially_unsat = true,
            1 => self.units.push(lits[0]),
            _ => {
                let index = self.clauses.len();
                self.watches[code(lits[0])].push(index);
                self.watches[code(lits[1])].push(index);
                self.clauses.push(lits);
            }
        }
    }

    fn value(&self, lit: Lit) -> Option<bool> {
        self.values[lit.var() as usize].map(|v| v == lit.sign())
    }

    fn enqueue(&mut self, lit: Lit) {
        self.values[lit.var() as usize] = Some(lit.sign());
        self.cost += self.penalty[code(lit)];
        self.trail.push(lit);
    }

    /// Undo all assignments above `level`
    fn cancel_until(&mut self, level: usize) {
        if self.trail_lim.len() <= level {
            return;
        }
        let keep = self.trail_lim[level];
        while self.trail.len() > keep {
            if let Some(lit) = self.trail.pop() {
                self.values[lit.var() as usize] = None;
                self.cost -= self.penalty[code(lit)];
            }
        }
        self.trail_lim.truncate(level);
        self.qhead = self.trail.len();
    }

    /// Flip the most recent unflipped decision; false when none is left
    fn backtrack(&mut self) -> bool {
        while let Some((lit, flipped)) = self.decisions.pop() {
            self.cancel_until(self.decisions.len());
            if !flipped {
                let flip = lit.negated();
                self.trail_lim.push(self.trail.len());
                self.decisions.push((flip, true));
                self.enqueue(flip);
                return true;
            }
        }
        false
    }

    fn over_bound(&self) -> bool {
        self.bound.is_some_and(|b| self.cost >= b)
    }

    /// Propagate pending assignments; true on conflict
    fn propagate(&mut self) -> bool {
        while self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            let false_lit = p.negated();
            let mut watchers = std::mem::take(&mut self.watches[code(false_lit)]);
            let mut conflict = false;
            let mut i = 0;

            while i < watchers.len() {
                let ci = watchers[i];
                if self.clauses[ci][0] == false_lit {
                    self.clauses[ci].swap(0, 1);
                }
                let first = self.clauses[ci][0];
                if self.value(first) == Some(true) {
                    i += 1;
                    continue;
                }

                let replacement = (2..self.clauses[ci].len())
                    .find(|&k| self.value(self.clauses[ci][k]) != Some(false));
                if let Some(k) = replacement {
                    self.clauses[ci].swap(1, k);
                    let watched = self.clauses[ci][1];
                    self.watches[code(watched)].push(ci);
                    watchers.swap_remove(i);
                    continue;
                }

                if self.value(first) == Some(false) {
                    conflict = true;
                    break;
                }
                self.propagations += 1;
                self.enqueue(first);
                i += 1;
            }

            self.watches[code(false_lit)] = watchers;
            if conflict {
                return true;
            }
        }
        false
    }

    fn pick_branch_var(&self) -> Option<Var> {
        (1..=self.num_vars).find(|&v| self.values[v as usize].is_none())
    }

    /// Assert the unit clauses at level 0; false if they conflict
    fn initialise(&mut self) -> bool {
        self.initialised = true;
        if self.trivially_unsat {
            return false;
        }
        for lit in std::mem::take(&mut self.units) {
            match self.value(lit) {
                Some(true) => {}
                Some(false) => return false,
                None => self.enqueue(lit),
            }
        }
        true
    }

    /// Search for the next model from the current state
    fn run(
        &mut self,
        config: &DpllConfig,
        cancel: &CancellationToken,
        stats: &mut DpllStats,
    ) -> UelResult<Outcome> {
        cancel.check()?;
        if !self.initialised && !self.initialise() {
            return Ok(Outcome::Unsat);
        }
        let mut local_decisions = 0usize;

        loop {
            if self.propagate() || self.over_bound() {
                stats.conflicts += 1;
                if !self.backtrack() {
                    return Ok(Outcome::Unsat);
                }
                continue;
            }

            let Some(var) = self.pick_branch_var() else {
                return Ok(Outcome::Sat);
            };

            local_decisions += 1;
            stats.decisions += 1;
            if config.max_decisions > 0 && local_decisions > config.max_decisions {
                return Ok(Outcome::Limit);
            }
            if local_decisions % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(UelError::cancelled());
            }

            let lit = Lit::negative(var);
            self.trail_lim.push(self.trail.len());
            self.decisions.push((lit, false));
            self.enqueue(lit);
        }
    }

    /// Values of the first `num_vars` variables (relaxation variables are dropped)
    fn model(&self, num_vars: Var, cost: Option<u64>) -> Model {
        let mut model = Model::new();
        for var in 1..=num_vars {
            model.assign(var, self.values[var as usize].unwrap_or(false));
        }
        model.cost = cost;
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sat::formula::SatClause;

    fn solve(formula: &Formula) -> SatResult {
        DpllSolver::new()
            .solve(formula, &CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn test_simple_sat() {
        let mut formula = Formula::new();
        // (x1 ∨ x2) ∧ (¬x1 ∨ x2) ∧ (x1 ∨ ¬x2)
        formula.add_clause(SatClause::new(vec![Lit::positive(1), Lit::positive(2)]));
        formula.add_clause(SatClause::new(vec![Lit::negative(1), Lit::positive(2)]));
        formula.add_clause(SatClause::new(vec![Lit::positive(1), Lit::negative(2)]));

        match solve(&formula) {
            SatResult::Sat(model) => {
                assert!(model.is_true(1));
                assert!(model.is_true(2));
                assert!(formula.is_satisfied_by(&model));
            }
            other => panic!("Should be satisfiable: {:?}", other),
        }
    }

    #[test]
    fn test_simple_unsat() {
        let mut formula = Formula::new();
        // (x1) ∧ (¬x1)
        formula.add_clause(SatClause::unit(Lit::positive(1)));
        formula.add_clause(SatClause::unit(Lit::negative(1)));
        assert!(matches!(solve(&formula), SatResult::Unsat));
    }

    #[test]
    fn test_empty_clause_is_unsat() {
        let mut formula = Formula::new();
        formula.declare(2);
        formula.add_clause(SatClause::new(Vec::new()));
        assert!(matches!(solve(&formula), SatResult::Unsat));
    }

    #[test]
    fn test_dimacs_parse() {
        let dimacs = r#"
c This is a comment
p cnf 3 2
1 -2 3 0
-1 2 0
"#;
        let formula = Formula::parse_dimacs(dimacs).unwrap();
        assert!(matches!(solve(&formula), SatResult::Sat(_)));
    }

    #[test]
    fn test_pigeonhole_unsat() {
        // three pigeons, two holes: p(i,h) = 2*i + h + 1
        let p = |i: u32, h: u32| 2 * i + h + 1;
        let mut formula = Formula::new();
        for i in 0..3 {
            formula.add_clause(SatClause::new(vec![Lit::positive(p(i, 0)), Lit::positive(p(i, 1))]));
        }
        for h in 0..2 {
            for i in 0..3 {
                for j in (i + 1)..3 {
                    formula.add_clause(SatClause::new(vec![
                        Lit::negative(p(i, h)),
                        Lit::negative(p(j, h)),
                    ]));
                }
            }
        }
        assert!(matches!(solve(&formula), SatResult::Unsat));
    }

    #[test]
    fn test_chain_propagation() {
        // x1 and x1 → x2 → ... → x6
        let mut formula = Formula::new();
        formula.add_clause(SatClause::unit(Lit::positive(1)));
        for v in 1..6 {
            formula.add_clause(SatClause::new(vec![Lit::negative(v), Lit::positive(v + 1)]));
        }
        match solve(&formula) {
            SatResult::Sat(model) => assert!((1..=6).all(|v| model.is_true(v))),
            other => panic!("Should be satisfiable: {:?}", other),
        }
    }

    #[test]
    fn test_optimal_prefers_cheaper_model() {
        // (x1 ∨ x2), soft ¬x1 weight 5, soft ¬x2 weight 1
        let mut formula = Formula::new();
        formula.add_clause(SatClause::new(vec![Lit::positive(1), Lit::positive(2)]));
        formula.add_soft(SatClause::unit(Lit::negative(1)), 5);
        formula.add_soft(SatClause::unit(Lit::negative(2)), 1);

        match solve(&formula) {
            SatResult::Sat(model) => {
                assert!(!model.is_true(1));
                assert!(model.is_true(2));
                assert_eq!(model.cost, Some(1));
            }
            other => panic!("Should be satisfiable: {:?}", other),
        }
    }

    #[test]
    fn test_optimal_with_non_unit_soft_clause() {
        // hard: ¬x1 ∨ ¬x2; soft: (x1 ∨ x2) weight 2, x1 weight 1
        let mut formula = Formula::new();
        formula.add_clause(SatClause::new(vec![Lit::negative(1), Lit::negative(2)]));
        formula.add_soft(SatClause::new(vec![Lit::positive(1), Lit::positive(2)]), 2);
        formula.add_soft(SatClause::unit(Lit::positive(1)), 1);

        match solve(&formula) {
            SatResult::Sat(model) => {
                assert!(model.is_true(1));
                assert_eq!(model.cost, Some(0));
                assert_eq!(model.max_var(), 2, "relaxation variables are hidden");
            }
            other => panic!("Should be satisfiable: {:?}", other),
        }
    }

    #[test]
    fn test_decision_limit() {
        let mut formula = Formula::new();
        for v in (1..40).step_by(2) {
            formula.add_clause(SatClause::new(vec![Lit::positive(v), Lit::positive(v + 1)]));
        }
        let mut solver = DpllSolver::with_config(DpllConfig { max_decisions: 3 });
        let result = solver.solve(&formula, &CancellationToken::new()).unwrap();
        assert!(matches!(result, SatResult::Unknown(_)));
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut formula = Formula::new();
        formula.add_clause(SatClause::unit(Lit::positive(1)));
        let token = CancellationToken::new();
        token.cancel();
        let err = DpllSolver::new().solve(&formula, &token).unwrap_err();
        assert!(err.is_cancelled());
    }
}
