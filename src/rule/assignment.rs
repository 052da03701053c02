//! Partial assignments built by the rule engine
//!
//! For every variable `X` the engine collects a set `S_X` of non-variable
//! atoms; the final unifier maps `X` to the conjunction of `S_X`.

use std::collections::{BTreeMap, BTreeSet};

use crate::atoms::{AtomId, AtomStore};
use crate::goal::Unifier;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Assignment {
    subsumers: BTreeMap<AtomId, BTreeSet<AtomId>>,
}

impl Assignment {
    /// Empty assignment for every variable of the store
    pub fn new(store: &AtomStore) -> Self {
        let subsumers = store
            .variables()
            .iter()
            .map(|&x| (x, BTreeSet::new()))
            .collect();
        Self { subsumers }
    }

    pub fn subsumers(&self, var: AtomId) -> Option<&BTreeSet<AtomId>> {
        self.subsumers.get(&var)
    }

    pub fn contains(&self, var: AtomId, atom: AtomId) -> bool {
        self.subsumers.get(&var).is_some_and(|s| s.contains(&atom))
    }

    /// Add `atom` to `S_var`; false if it was already there
    pub fn add(&mut self, var: AtomId, atom: AtomId) -> bool {
        self.subsumers.entry(var).or_default().insert(atom)
    }

    /// Whether adding `atom` to `S_var` would make the assignment cyclic
    ///
    /// `X` depends on `Y` if `S_X` contains `∃r.Y`. The new atom introduces
    /// a dependency on its filler; the assignment becomes cyclic if `var` is
    /// reachable from that filler.
    pub fn makes_cyclic(&self, var: AtomId, atom: AtomId, store: &AtomStore) -> bool {
        let Some(start) = store.filler(atom).filter(|&f| store.is_variable(f)) else {
            return false;
        };
        let mut stack = vec![start];
        let mut visited = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == var {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            for &dep in self.subsumers.get(&current).into_iter().flatten() {
                if let Some(next) = store.filler(dep).filter(|&f| store.is_variable(f)) {
                    stack.push(next);
                }
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.subsumers.values().all(BTreeSet::is_empty)
    }

    pub fn to_unifier(&self, store: &AtomStore) -> Unifier {
        let mut unifier = Unifier::for_variables(store);
        for (&var, atoms) in &self.subsumers {
            unifier.assign(var, atoms.iter().copied());
        }
        unifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_detection() {
        let mut store = AtomStore::new();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let y = store.user_variable("Y").unwrap();
        let rx = store.existential("r", x).unwrap();
        let ry = store.existential("r", y).unwrap();
        let ra = store.existential("r", a).unwrap();

        let mut assignment = Assignment::new(&store);
        assert!(assignment.makes_cyclic(x, rx, &store));
        assert!(!assignment.makes_cyclic(x, ry, &store));
        assert!(!assignment.makes_cyclic(x, ra, &store));

        // X ⊑ ∃r.Y, then Y ⊑ ∃r.X closes the cycle
        assert!(assignment.add(x, ry));
        assert!(!assignment.add(x, ry));
        assert!(assignment.makes_cyclic(y, rx, &store));
    }

    #[test]
    fn test_to_unifier() {
        let mut store = AtomStore::new();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let mut assignment = Assignment::new(&store);
        assert!(assignment.is_empty());
        assignment.add(x, a);
        let unifier = assignment.to_unifier(&store);
        assert_eq!(unifier.get(x), Some(&BTreeSet::from([a])));
    }
}
