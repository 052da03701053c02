//! Solver statistics

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;

/// Counters collected by a unification processor
#[derive(Clone, Debug, Default, Serialize)]
pub struct SolverStats {
    /// Processor name
    pub processor: String,
    /// Atoms in the goal
    pub atoms: usize,
    /// Variables in the goal
    pub variables: usize,
    /// Propositional variables allocated (SAT)
    pub literals: usize,
    /// Clauses in the current formula (SAT)
    pub clauses: usize,
    /// Calls to the underlying solver (SAT/ASP)
    pub solver_calls: usize,
    /// Candidate unifiers produced
    pub candidates: usize,
    /// Candidates rejected by a validation step
    pub rejected: usize,
    /// DPLL decisions
    pub decisions: usize,
    /// Rule applications (rule engine)
    pub rule_applications: usize,
    /// Choice points created (rule engine)
    pub choice_points: usize,
    /// Backtracks (rule engine)
    pub backtracks: usize,
    /// Time spent inside the processor
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SolverStats {
    pub fn new(processor: &str) -> Self {
        Self {
            processor: processor.to_string(),
            ..Default::default()
        }
    }

    /// Non-zero counters in a stable order, for display
    pub fn entries(&self) -> IndexMap<&'static str, String> {
        let mut map = IndexMap::new();
        map.insert("processor", self.processor.clone());
        let counters = [
            ("atoms", self.atoms),
            ("variables", self.variables),
            ("literals", self.literals),
            ("clauses", self.clauses),
            ("solver calls", self.solver_calls),
            ("candidates", self.candidates),
            ("rejected", self.rejected),
            ("decisions", self.decisions),
            ("rule applications", self.rule_applications),
            ("choice points", self.choice_points),
            ("backtracks", self.backtracks),
        ];
        for (name, value) in counters {
            if value > 0 {
                map.insert(name, value.to_string());
            }
        }
        map.insert("elapsed", format!("{:.3}s", self.elapsed.as_secs_f64()));
        map
    }
}

impl fmt::Display for SolverStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.entries() {
            writeln!(f, "{:<18} {}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_skip_zero_counters() {
        let mut stats = SolverStats::new("sat");
        stats.clauses = 12;
        let entries = stats.entries();
        assert_eq!(entries.get("processor").map(String::as_str), Some("sat"));
        assert_eq!(entries.get("clauses").map(String::as_str), Some("12"));
        assert!(!entries.contains_key("backtracks"));
        assert!(stats.to_string().contains("clauses"));
    }
}
