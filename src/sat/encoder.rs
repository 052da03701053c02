//! SAT encoding of EL unification
//!
//! A goal is translated into a CNF formula whose models correspond to the
//! acyclic unifiers of the goal. The central literals are `[a ⊑ b]` for
//! every pair of atoms, read as "σ(a) is subsumed by σ(b)"; a model
//! assigns to each variable `X` all non-variable atoms `E` with `[X ⊑ E]`.
//!
//! Clause groups:
//! - per-axiom clauses for every positive constraint
//! - structural clauses for constants, existential restrictions and
//!   transitivity
//! - order clauses ruling out cyclic substitutions
//! - choice clauses for negative constraints, plus faithfulness clauses
//!   for literals with a variable on the right
//! - in minimal mode, soft unit clauses `¬[X ⊑ E]`

use std::collections::BTreeSet;

use tracing::debug;

use crate::atoms::AtomId;
use crate::error::{UelError, UelResult};
use crate::goal::{Goal, Unifier};
use crate::sat::formula::{Formula, Lit, Model, SatClause, Var};
use crate::sat::literal::LiteralTable;

/// Translates one goal into propositional logic and models back into unifiers
#[derive(Debug, Clone)]
pub struct SatEncoder<'g> {
    goal: &'g Goal,
    table: LiteralTable,
    /// All atoms of the goal
    atoms: Vec<AtomId>,
    /// Non-variable atoms other than ⊤: the candidates for substitutions
    candidates: Vec<AtomId>,
    variables: Vec<AtomId>,
    user_variables: Vec<AtomId>,
}

impl<'g> SatEncoder<'g> {
    pub fn new(goal: &'g Goal, minimal: bool) -> Self {
        let store = goal.store();
        let mut table = LiteralTable::new(minimal);
        let atoms: Vec<AtomId> = store.ids().collect();
        // Pair variables come first so decoding can check the range
        for &a in &atoms {
            for &b in &atoms {
                table.sub(a, b);
            }
        }
        Self {
            goal,
            table,
            candidates: store
                .non_variable_atoms()
                .into_iter()
                .filter(|&id| !store.is_top(id))
                .collect(),
            variables: store.variables().iter().copied().collect(),
            user_variables: store.user_variables().iter().copied().collect(),
            atoms,
        }
    }

    pub fn is_minimal(&self) -> bool {
        self.table.is_minimal()
    }

    pub fn literal_table(&self) -> &LiteralTable {
        &self.table
    }

    /// Build the complete formula for the goal
    pub fn encode(&mut self) -> UelResult<Formula> {
        let mut formula = Formula::new();
        self.add_axiom_clauses(&mut formula);
        self.add_structural_clauses(&mut formula);
        self.add_order_clauses(&mut formula);
        self.add_negative_clauses(&mut formula);
        if self.is_minimal() {
            self.add_minimality(&mut formula);
        }
        formula.declare(self.table.len() as Var);

        debug!(
            goal = self.goal.id(),
            atoms = self.atoms.len(),
            variables = formula.num_vars(),
            clauses = formula.clause_count(),
            minimal = self.is_minimal(),
            "encoded goal"
        );
        Ok(formula)
    }

    // ------------------------------------------------------------------------
    // Clause groups
    // ------------------------------------------------------------------------

    /// `L ⊑ R`: every candidate above some `Rj` is above some `Li`
    fn add_axiom_clauses(&mut self, formula: &mut Formula) {
        for pair in self.goal.subsumption_pairs() {
            for &c in &self.candidates {
                if pair.left.contains(&c) {
                    continue;
                }
                let below: Vec<Lit> = pair.left.iter().map(|&l| self.table.sub(l, c)).collect();
                for &r in &pair.right {
                    let mut literals = below.clone();
                    if r != c {
                        literals.push(self.table.dissub(r, c));
                    }
                    formula.add_clause(SatClause::new(literals));
                }
            }
        }
    }

    fn add_structural_clauses(&mut self, formula: &mut Formula) {
        let goal = self.goal;
        let store = goal.store();
        let top = store.top();
        let atoms = self.atoms.clone();

        for &a in &atoms {
            formula.add_clause(SatClause::unit(self.table.sub(a, a)));
            if let Some(top) = top {
                formula.add_clause(SatClause::unit(self.table.sub(a, top)));
            }
        }

        for &a in &atoms {
            for &b in &atoms {
                if a == b {
                    continue;
                }
                let a_const = store.is_constant(a);
                let b_const = store.is_constant(b);
                let b_top = store.is_top(b);
                match (store.is_existential(a), store.is_existential(b)) {
                    (false, false) if a_const && b_const && !b_top => {
                        formula.add_clause(SatClause::unit(self.table.dissub(a, b)));
                    }
                    (true, true) => self.add_existential_pair(formula, a, b),
                    (true, false) if b_const && !b_top => {
                        formula.add_clause(SatClause::unit(self.table.dissub(a, b)));
                    }
                    (false, true) if a_const => {
                        formula.add_clause(SatClause::unit(self.table.dissub(a, b)));
                    }
                    _ => {}
                }
            }
        }

        // [a ⊑ b] ∧ [b ⊑ c] → [a ⊑ c]
        for &a in &atoms {
            for &b in &atoms {
                if a == b {
                    continue;
                }
                for &c in &atoms {
                    if c == a || c == b {
                        continue;
                    }
                    let clause = vec![
                        self.table.dissub(a, b),
                        self.table.dissub(b, c),
                        self.table.sub(a, c),
                    ];
                    formula.add_clause(SatClause::new(clause));
                }
            }
        }
    }

    /// `[∃r.A ⊑ ∃r.B] ↔ [A ⊑ B]`; distinct roles never subsume
    fn add_existential_pair(&mut self, formula: &mut Formula, a: AtomId, b: AtomId) {
        let goal = self.goal;
        let store = goal.store();
        let (Some(role_a), Some(role_b)) = (store.role(a), store.role(b)) else {
            return;
        };
        let (Some(fa), Some(fb)) = (store.filler(a), store.filler(b)) else {
            return;
        };
        if role_a != role_b {
            formula.add_clause(SatClause::unit(self.table.dissub(a, b)));
            return;
        }
        let outer = self.table.sub(a, b);
        let inner = self.table.sub(fa, fb);
        formula.add_clause(SatClause::new(vec![outer.negated(), inner]));
        formula.add_clause(SatClause::new(vec![inner.negated(), outer]));
    }

    fn add_order_clauses(&mut self, formula: &mut Formula) {
        let goal = self.goal;
        let store = goal.store();
        let variables = self.variables.clone();

        for &x in &variables {
            formula.add_clause(SatClause::unit(self.table.order(x, x).negated()));
        }
        for &x in &variables {
            for &y in &variables {
                if x == y {
                    continue;
                }
                for &z in &variables {
                    if z == y {
                        continue;
                    }
                    let clause = vec![
                        self.table.order(x, y).negated(),
                        self.table.order(y, z).negated(),
                        self.table.order(x, z),
                    ];
                    formula.add_clause(SatClause::new(clause));
                }
            }
        }

        let existentials: Vec<(AtomId, AtomId)> = store
            .existentials()
            .iter()
            .filter_map(|&e| store.filler(e).map(|f| (e, f)))
            .filter(|&(_, f)| store.is_variable(f))
            .collect();
        for (e, y) in existentials {
            for &x in &variables {
                let clause = vec![self.table.dissub(x, e), self.table.order(x, y)];
                formula.add_clause(SatClause::new(clause));
            }
        }
    }

    fn add_negative_clauses(&mut self, formula: &mut Formula) {
        let constraints = self.goal.negative_constraints();
        if constraints.is_empty() {
            return;
        }
        for constraint in constraints {
            if constraint.symmetric {
                let g1 = self.table.fresh();
                let g2 = self.table.fresh();
                formula.add_clause(SatClause::new(vec![g1, g2]));
                self.add_dissubsumption(formula, &constraint.left, &constraint.right, Some(g1));
                self.add_dissubsumption(formula, &constraint.right, &constraint.left, Some(g2));
            } else {
                self.add_dissubsumption(formula, &constraint.left, &constraint.right, None);
            }
        }
        self.add_faithfulness(formula);
    }

    /// `L ⋢ R`: some candidate `E` is above some `Rj` but above no `Li`
    fn add_dissubsumption(
        &mut self,
        formula: &mut Formula,
        left: &BTreeSet<AtomId>,
        right: &BTreeSet<AtomId>,
        guard: Option<Lit>,
    ) {
        let mut witnesses = Vec::new();
        if let Some(guard) = guard {
            witnesses.push(guard.negated());
        }
        for &e in &self.candidates {
            let choice = self.table.fresh();
            witnesses.push(choice);
            for &l in left {
                let clause = vec![choice.negated(), self.table.dissub(l, e)];
                formula.add_clause(SatClause::new(clause));
            }
            let mut above = vec![choice.negated()];
            above.extend(right.iter().map(|&r| self.table.sub(r, e)));
            formula.add_clause(SatClause::new(above));
        }
        formula.add_clause(SatClause::new(witnesses));
    }

    /// `[A ⋢ Y]` needs a witness `E` with `[Y ⊑ E]` and `[A ⋢ E]`
    fn add_faithfulness(&mut self, formula: &mut Formula) {
        let goal = self.goal;
        let store = goal.store();
        let names: Vec<AtomId> = self
            .atoms
            .iter()
            .copied()
            .filter(|&a| !store.is_existential(a))
            .collect();
        let variables = self.variables.clone();

        for &a in &names {
            for &y in &variables {
                if a == y {
                    continue;
                }
                let mut clause = vec![self.table.sub(a, y)];
                for &e in &self.candidates {
                    let witness = self.table.fresh();
                    clause.push(witness);
                    let y_below = self.table.sub(y, e);
                    let a_not_below = self.table.dissub(a, e);
                    formula.add_clause(SatClause::new(vec![witness.negated(), y_below]));
                    formula.add_clause(SatClause::new(vec![witness.negated(), a_not_below]));
                }
                formula.add_clause(SatClause::new(clause));
            }
        }
    }

    /// Soft `¬[X ⊑ E]` for every user variable and candidate
    fn add_minimality(&mut self, formula: &mut Formula) {
        for &x in &self.user_variables {
            for &e in &self.candidates {
                formula.add_soft(SatClause::unit(self.table.dissub(x, e)), 1);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Decoding
    // ------------------------------------------------------------------------

    fn sub_literal(&self, a: AtomId, b: AtomId) -> UelResult<Lit> {
        self.table.lookup_sub(a, b).ok_or_else(|| {
            UelError::malformed_encoding(format!("no literal allocated for [{} ⊑ {}]", a, b))
        })
    }

    /// Read the unifier off a model
    pub fn decode(&self, model: &Model) -> UelResult<Unifier> {
        if model.max_var() as usize > self.table.len() {
            return Err(UelError::malformed_encoding(format!(
                "model mentions variable {} but only {} were allocated",
                model.max_var(),
                self.table.len()
            ))
            .in_goal(self.goal.id()));
        }
        let mut unifier = Unifier::for_variables(self.goal.store());
        for &x in &self.variables {
            for &e in &self.candidates {
                if model.eval_literal(self.sub_literal(x, e)?) {
                    unifier.assign(x, [e]);
                }
            }
        }
        Ok(unifier)
    }

    /// Clause excluding the user-variable part of `model` from later models
    ///
    /// Normal mode negates the complete valuation of `[X ⊑ E]`; minimal mode
    /// negates only the true literals, which also excludes every superset.
    pub fn blocking_clause(&self, model: &Model) -> UelResult<SatClause> {
        let mut literals = Vec::new();
        for &x in &self.user_variables {
            for &e in &self.candidates {
                let sub = self.sub_literal(x, e)?;
                let holds = model.eval_literal(sub);
                if holds {
                    literals.push(sub.negated());
                } else if !self.is_minimal() {
                    literals.push(sub);
                }
            }
        }
        Ok(SatClause::new(literals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::AtomStore;
    use crate::core::{CancellationToken, SatBackend};
    use crate::sat::dpll::DpllSolver;
    use crate::sat::formula::SatResult;

    fn scenario_one() -> (Goal, AtomId, AtomId, AtomId) {
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let b = store.constant("B").unwrap();
        let x = store.user_variable("X").unwrap();
        let mut goal = Goal::new("one", store);
        goal.add_equation([x], [a, b]).unwrap();
        (goal, x, a, b)
    }

    fn solve(formula: &Formula) -> SatResult {
        DpllSolver::new().solve(formula, &CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_encode_and_decode() {
        let (goal, x, a, b) = scenario_one();
        let mut encoder = SatEncoder::new(&goal, false);
        let formula = encoder.encode().unwrap();
        assert!(!formula.is_weighted());

        let SatResult::Sat(model) = solve(&formula) else {
            panic!("goal is unifiable");
        };
        let unifier = encoder.decode(&model).unwrap();
        assert_eq!(unifier.get(x), Some(&BTreeSet::from([a, b])));
        assert!(unifier.solves(&goal).unwrap());
    }

    #[test]
    fn test_blocking_exhausts_single_unifier() {
        let (goal, ..) = scenario_one();
        let mut encoder = SatEncoder::new(&goal, false);
        let mut formula = encoder.encode().unwrap();
        let SatResult::Sat(model) = solve(&formula) else {
            panic!("goal is unifiable");
        };
        formula.add_clause(encoder.blocking_clause(&model).unwrap());
        assert!(matches!(solve(&formula), SatResult::Unsat));
    }

    #[test]
    fn test_minimal_mode_is_weighted() {
        let (goal, ..) = scenario_one();
        let mut encoder = SatEncoder::new(&goal, true);
        let formula = encoder.encode().unwrap();
        assert!(formula.is_weighted());
        assert_eq!(formula.soft().len(), 2);
        assert!(formula.to_wcnf().starts_with("p wcnf"));
    }

    #[test]
    fn test_cyclic_goal_is_unsat() {
        let mut store = AtomStore::with_top();
        let x = store.user_variable("X").unwrap();
        let rx = store.existential("r", x).unwrap();
        let mut goal = Goal::new("cycle", store);
        goal.add_equation([x], [rx]).unwrap();

        let formula = SatEncoder::new(&goal, false).encode().unwrap();
        assert!(matches!(solve(&formula), SatResult::Unsat));
    }

    #[test]
    fn test_disequation_of_equal_sides_is_unsat() {
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let mut goal = Goal::new("diseq", store);
        goal.add_disequation([a], [a]).unwrap();

        let formula = SatEncoder::new(&goal, false).encode().unwrap();
        assert!(matches!(solve(&formula), SatResult::Unsat));
    }

    #[test]
    fn test_dissubsumption_excludes_atom() {
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let b = store.constant("B").unwrap();
        let x = store.user_variable("X").unwrap();
        let mut goal = Goal::new("neg", store);
        goal.add_subsumption([x], [a]).unwrap();
        goal.add_dissubsumption([x], [b]).unwrap();

        let mut encoder = SatEncoder::new(&goal, false);
        let mut formula = encoder.encode().unwrap();
        let mut seen = Vec::new();
        while let SatResult::Sat(model) = solve(&formula) {
            let unifier = encoder.decode(&model).unwrap();
            assert!(unifier.solves(&goal).unwrap());
            assert!(!unifier.get(x).unwrap().contains(&b));
            seen.push(unifier);
            formula.add_clause(encoder.blocking_clause(&model).unwrap());
        }
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_out_of_range_model_is_malformed() {
        let (goal, ..) = scenario_one();
        let mut encoder = SatEncoder::new(&goal, false);
        encoder.encode().unwrap();
        let model = Model::from_dimacs([100_000]).unwrap();
        let err = encoder.decode(&model).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::MalformedEncoding);
    }
}
