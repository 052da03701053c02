//! Propositional formulas
//!
//! Literals, clauses and (weighted) CNF formulas, plus their DIMACS and
//! WCNF text forms used to talk to external solvers.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use crate::error::{ErrorCode, UelError, UelResult};

/// A propositional variable (positive integer)
pub type Var = u32;

/// A literal is a variable with a sign (positive or negative)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit {
    /// The variable (1-indexed)
    var: Var,
    /// True if positive, false if negated
    sign: bool,
}

impl Lit {
    pub fn new(var: Var, sign: bool) -> Self {
        Lit { var, sign }
    }

    pub fn positive(var: Var) -> Self {
        Lit { var, sign: true }
    }

    pub fn negative(var: Var) -> Self {
        Lit { var, sign: false }
    }

    pub fn var(&self) -> Var {
        self.var
    }

    pub fn sign(&self) -> bool {
        self.sign
    }

    pub fn negated(&self) -> Self {
        Lit { var: self.var, sign: !self.sign }
    }

    /// Parse from DIMACS format (non-zero integer)
    pub fn from_dimacs(val: i32) -> Self {
        if val > 0 {
            Lit::positive(val.unsigned_abs())
        } else {
            Lit::negative(val.unsigned_abs())
        }
    }

    pub fn to_dimacs(&self) -> i64 {
        if self.sign {
            i64::from(self.var)
        } else {
            -i64::from(self.var)
        }
    }
}

impl std::ops::Not for Lit {
    type Output = Lit;

    fn not(self) -> Lit {
        self.negated()
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign {
            write!(f, "{}", self.var)
        } else {
            write!(f, "-{}", self.var)
        }
    }
}

/// A clause is a disjunction of literals
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SatClause {
    pub literals: Vec<Lit>,
}

impl SatClause {
    pub fn new(literals: Vec<Lit>) -> Self {
        SatClause { literals }
    }

    pub fn unit(lit: Lit) -> Self {
        SatClause { literals: vec![lit] }
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn is_unit(&self) -> bool {
        self.literals.len() == 1
    }

    pub fn unit_literal(&self) -> Option<Lit> {
        if self.is_unit() {
            self.literals.first().copied()
        } else {
            None
        }
    }

    /// Parse from DIMACS format (space-separated integers ending with 0)
    pub fn from_dimacs(line: &str) -> Option<Self> {
        let parts: Vec<i32> = line
            .split_whitespace()
            .map(|s| s.parse().ok())
            .collect::<Option<Vec<_>>>()?;

        let (&last, body) = parts.split_last()?;
        if last != 0 || body.contains(&0) {
            return None;
        }
        Some(SatClause::new(body.iter().map(|&v| Lit::from_dimacs(v)).collect()))
    }

    fn write_dimacs(&self, out: &mut String) {
        for lit in &self.literals {
            let _ = write!(out, "{} ", lit);
        }
        out.push_str("0\n");
    }
}

impl fmt::Display for SatClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lits: Vec<String> = self.literals.iter().map(|l| l.to_string()).collect();
        write!(f, "({})", lits.join(" ∨ "))
    }
}

/// A satisfying assignment returned by a backend
///
/// Variables the solver did not report are treated as false.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    values: BTreeMap<Var, bool>,
    /// Total weight of falsified soft clauses, when the formula was weighted
    pub cost: Option<u64>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from signed DIMACS values (`-3` means variable 3 is false)
    pub fn from_dimacs(values: impl IntoIterator<Item = i64>) -> UelResult<Self> {
        let mut model = Model::new();
        for value in values {
            if value == 0 {
                continue;
            }
            let var = Var::try_from(value.unsigned_abs()).map_err(|_| {
                UelError::solver_output(format!("variable {} out of range", value))
            })?;
            model.assign(var, value > 0);
        }
        Ok(model)
    }

    pub fn assign(&mut self, var: Var, value: bool) {
        self.values.insert(var, value);
    }

    pub fn get(&self, var: Var) -> Option<bool> {
        self.values.get(&var).copied()
    }

    pub fn is_true(&self, var: Var) -> bool {
        self.get(var).unwrap_or(false)
    }

    pub fn eval_literal(&self, lit: Lit) -> bool {
        self.is_true(lit.var()) == lit.sign()
    }

    pub fn satisfies(&self, clause: &SatClause) -> bool {
        clause.literals.iter().any(|&l| self.eval_literal(l))
    }

    /// Variables assigned true, in increasing order
    pub fn true_vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.values.iter().filter(|(_, &b)| b).map(|(&v, _)| v)
    }

    /// Largest variable mentioned by the model
    pub fn max_var(&self) -> Var {
        self.values.keys().next_back().copied().unwrap_or(0)
    }

    pub fn to_vec(&self) -> Vec<(Var, bool)> {
        self.values.iter().map(|(&v, &b)| (v, b)).collect()
    }
}

/// Result of SAT solving
#[derive(Debug, Clone)]
pub enum SatResult {
    /// Satisfiable with the given model (optimal for weighted formulas)
    Sat(Model),
    /// Unsatisfiable
    Unsat,
    /// Unknown (resource limit reached)
    Unknown(String),
}

impl SatResult {
    pub fn is_sat(&self) -> bool {
        matches!(self, SatResult::Sat(_))
    }
}

/// A CNF formula with optional weighted soft clauses
#[derive(Debug, Clone, Default)]
pub struct Formula {
    num_vars: Var,
    hard: Vec<SatClause>,
    soft: Vec<(SatClause, u64)>,
}

impl Formula {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure the variable count covers `var`
    pub fn declare(&mut self, var: Var) {
        self.num_vars = self.num_vars.max(var);
    }

    pub fn num_vars(&self) -> Var {
        self.num_vars
    }

    pub fn add_clause(&mut self, clause: SatClause) {
        for lit in &clause.literals {
            self.declare(lit.var());
        }
        self.hard.push(clause);
    }

    /// Add a soft clause; weights of zero are ignored
    pub fn add_soft(&mut self, clause: SatClause, weight: u64) {
        if weight == 0 {
            return;
        }
        for lit in &clause.literals {
            self.declare(lit.var());
        }
        self.soft.push((clause, weight));
    }

    pub fn hard(&self) -> &[SatClause] {
        &self.hard
    }

    pub fn soft(&self) -> &[(SatClause, u64)] {
        &self.soft
    }

    pub fn is_weighted(&self) -> bool {
        !self.soft.is_empty()
    }

    pub fn clause_count(&self) -> usize {
        self.hard.len() + self.soft.len()
    }

    /// Weight marking hard clauses in WCNF (exceeds the sum of all soft weights)
    pub fn top_weight(&self) -> u64 {
        self.soft
            .iter()
            .fold(1u64, |acc, (_, w)| acc.saturating_add(*w))
    }

    /// Sum of the weights of soft clauses falsified by `model`
    pub fn cost(&self, model: &Model) -> u64 {
        self.soft
            .iter()
            .filter(|(c, _)| !model.satisfies(c))
            .map(|(_, w)| *w)
            .sum()
    }

    /// Whether `model` satisfies every hard clause
    pub fn is_satisfied_by(&self, model: &Model) -> bool {
        self.hard.iter().all(|c| model.satisfies(c))
    }

    /// DIMACS CNF text of the hard clauses
    pub fn to_dimacs(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "p cnf {} {}", self.num_vars, self.hard.len());
        for clause in &self.hard {
            clause.write_dimacs(&mut out);
        }
        out
    }

    /// WCNF text: hard clauses weighted with [`Formula::top_weight`]
    pub fn to_wcnf(&self) -> String {
        let top = self.top_weight();
        let mut out = String::new();
        let _ = writeln!(
            out,
            "p wcnf {} {} {}",
            self.num_vars,
            self.clause_count(),
            top
        );
        for clause in &self.hard {
            let _ = write!(out, "{} ", top);
            clause.write_dimacs(&mut out);
        }
        for (clause, weight) in &self.soft {
            let _ = write!(out, "{} ", weight);
            clause.write_dimacs(&mut out);
        }
        out
    }

    /// Parse DIMACS CNF text
    pub fn parse_dimacs(input: &str) -> UelResult<Self> {
        let mut formula = Formula::new();
        for (number, line) in input.lines().enumerate() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('c') || line.starts_with('%') {
                continue;
            }

            if line.starts_with("p cnf") {
                let declared = line
                    .split_whitespace()
                    .nth(2)
                    .and_then(|s| s.parse::<Var>().ok())
                    .ok_or_else(|| {
                        UelError::new(ErrorCode::InvalidFormat, "invalid DIMACS problem line")
                            .at(format!("line {}", number + 1))
                    })?;
                formula.declare(declared);
                continue;
            }

            let clause = SatClause::from_dimacs(line).ok_or_else(|| {
                UelError::new(ErrorCode::InvalidFormat, format!("invalid clause: {}", line))
                    .at(format!("line {}", number + 1))
            })?;
            formula.add_clause(clause);
        }
        Ok(formula)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_weighted() {
            f.write_str(&self.to_wcnf())
        } else {
            f.write_str(&self.to_dimacs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimacs_output() {
        let mut formula = Formula::new();
        formula.add_clause(SatClause::new(vec![Lit::positive(1), Lit::negative(3)]));
        formula.add_clause(SatClause::unit(Lit::positive(2)));
        assert_eq!(formula.to_dimacs(), "p cnf 3 2\n1 -3 0\n2 0\n");
    }

    #[test]
    fn test_wcnf_output() {
        let mut formula = Formula::new();
        formula.add_clause(SatClause::new(vec![Lit::positive(1), Lit::positive(2)]));
        formula.add_soft(SatClause::unit(Lit::negative(1)), 1);
        formula.add_soft(SatClause::unit(Lit::negative(2)), 2);
        assert_eq!(formula.top_weight(), 4);
        assert_eq!(
            formula.to_wcnf(),
            "p wcnf 2 3 4\n4 1 2 0\n1 -1 0\n2 -2 0\n"
        );
    }

    #[test]
    fn test_parse_dimacs() {
        let formula = Formula::parse_dimacs("c comment\np cnf 5 1\n1 -2 0\n").unwrap();
        assert_eq!(formula.num_vars(), 5);
        assert_eq!(formula.hard().len(), 1);

        let err = Formula::parse_dimacs("p cnf 2 1\n1 x 0\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFormat);
    }

    #[test]
    fn test_model_cost() {
        let mut formula = Formula::new();
        formula.add_soft(SatClause::unit(Lit::negative(1)), 3);
        formula.add_soft(SatClause::unit(Lit::negative(2)), 5);
        let model = Model::from_dimacs([1, -2]).unwrap();
        assert_eq!(formula.cost(&model), 3);
        assert!(model.is_true(1));
        assert!(!model.is_true(7));
        assert_eq!(model.true_vars().collect::<Vec<_>>(), vec![1]);
    }
}
