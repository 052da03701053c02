//! Unifiers and their validation
//!
//! A unifier assigns to every variable of a goal a conjunction of
//! non-variable atoms. Applying it exhaustively turns every atom into a
//! ground EL concept, which is how unifiers are checked against the goal.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::atoms::{Atom, AtomId, AtomStore};
use crate::el::{self, Concept};
use crate::error::{ErrorCode, UelError, UelResult};
use crate::goal::{Connective, Definition, Goal};

/// A substitution for the variables of a goal
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Unifier {
    substitution: BTreeMap<AtomId, BTreeSet<AtomId>>,
}

impl Unifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a unifier that maps every variable of `store`, defaulting to ⊤
    pub fn for_variables(store: &AtomStore) -> Self {
        let substitution = store
            .variables()
            .iter()
            .map(|&v| (v, BTreeSet::new()))
            .collect();
        Self { substitution }
    }

    pub fn assign(&mut self, var: AtomId, atoms: impl IntoIterator<Item = AtomId>) {
        self.substitution.entry(var).or_default().extend(atoms);
    }

    pub fn get(&self, var: AtomId) -> Option<&BTreeSet<AtomId>> {
        self.substitution.get(&var)
    }

    pub fn variables(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.substitution.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.substitution.len()
    }

    pub fn is_empty(&self) -> bool {
        self.substitution.is_empty()
    }

    /// One non-primitive definition per variable
    pub fn definitions(&self) -> Vec<Definition> {
        self.substitution
            .iter()
            .map(|(&var, atoms)| Definition::new(var, atoms.clone(), false))
            .collect()
    }

    /// Restriction to the given variables (used for deduplication)
    pub fn projection(&self, vars: &BTreeSet<AtomId>) -> Unifier {
        let substitution = self
            .substitution
            .iter()
            .filter(|(v, _)| vars.contains(v))
            .map(|(&v, atoms)| (v, atoms.clone()))
            .collect();
        Unifier { substitution }
    }

    // ------------------------------------------------------------------------
    // Grounding
    // ------------------------------------------------------------------------

    /// Apply the substitution exhaustively to one atom.
    ///
    /// Fails with `CyclicAssignment` if a variable occurs in its own
    /// expansion, so a successful result always terminates.
    pub fn ground_atom(&self, store: &AtomStore, id: AtomId) -> UelResult<Concept> {
        let mut stack = Vec::new();
        self.ground(store, id, &mut stack)
    }

    /// Apply the substitution to a conjunction of atoms
    pub fn ground_conjunction(
        &self,
        store: &AtomStore,
        atoms: &BTreeSet<AtomId>,
    ) -> UelResult<Concept> {
        let parts = atoms
            .iter()
            .map(|&id| self.ground_atom(store, id))
            .collect::<UelResult<Vec<_>>>()?;
        Ok(Concept::conjunction(parts))
    }

    fn ground(&self, store: &AtomStore, id: AtomId, stack: &mut Vec<AtomId>) -> UelResult<Concept> {
        match store.get(id) {
            None => Err(UelError::unknown_atom(id)),
            Some(Atom::Exists { role, filler }) => {
                let role = store.role_name(*role).unwrap_or("?");
                Ok(Concept::exists(role, self.ground(store, *filler, stack)?))
            }
            Some(Atom::Name(name)) => {
                if store.is_top(id) {
                    return Ok(Concept::Top);
                }
                if !store.is_variable(id) {
                    return Ok(Concept::atomic(name));
                }
                if stack.contains(&id) {
                    return Err(UelError::new(
                        ErrorCode::CyclicAssignment,
                        format!("{} occurs in its own substitution", name),
                    ));
                }
                stack.push(id);
                let mut parts = Vec::new();
                for &atom in self.get(id).into_iter().flatten() {
                    parts.push(self.ground(store, atom, stack)?);
                }
                stack.pop();
                Ok(Concept::conjunction(parts))
            }
        }
    }

    /// Ground every variable of `vars`, in order
    pub fn ground_variables(
        &self,
        store: &AtomStore,
        vars: &BTreeSet<AtomId>,
    ) -> UelResult<Vec<Concept>> {
        vars.iter().map(|&var| self.ground_atom(store, var)).collect()
    }

    /// Canonical form of the unifier.
    ///
    /// Every variable `X` is mapped to all constants and existential
    /// restrictions `E` of the store with `σ(X) ⊑ σ(E)`. The result is
    /// equivalent to `self`, and equivalent unifiers share one closure.
    pub fn closure(&self, store: &AtomStore) -> UelResult<Unifier> {
        let candidates = store
            .non_variable_atoms()
            .into_iter()
            .filter(|&id| !store.is_top(id))
            .map(|id| self.ground_atom(store, id).map(|concept| (id, concept)))
            .collect::<UelResult<Vec<(AtomId, Concept)>>>()?;
        let mut substitution = BTreeMap::new();
        for &var in self.substitution.keys() {
            let value = self.ground_atom(store, var)?;
            let atoms = candidates
                .iter()
                .filter(|(_, concept)| el::subsumes(&value, concept))
                .map(|&(id, _)| id)
                .collect();
            substitution.insert(var, atoms);
        }
        Ok(Unifier { substitution })
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Indices (in [`Goal::axioms`] order) of the axioms this unifier violates
    pub fn violations(&self, goal: &Goal) -> UelResult<Vec<usize>> {
        let store = goal.store();
        let mut violated = Vec::new();
        for (index, axiom) in goal.axioms().iter().enumerate() {
            let left = self
                .ground_conjunction(store, &axiom.left)
                .map_err(|e| e.in_goal(goal.id()).at_axiom(index))?;
            let right = self
                .ground_conjunction(store, &axiom.right)
                .map_err(|e| e.in_goal(goal.id()).at_axiom(index))?;
            let holds = match axiom.connective {
                Connective::Subsumption => el::subsumes(&left, &right),
                Connective::Equivalence => el::equivalent(&left, &right),
                Connective::Dissubsumption => !el::subsumes(&left, &right),
                Connective::Disequivalence => !el::equivalent(&left, &right),
            };
            if !holds {
                violated.push(index);
            }
        }
        Ok(violated)
    }

    /// Whether the unifier solves every axiom of the goal
    pub fn solves(&self, goal: &Goal) -> UelResult<bool> {
        Ok(self.violations(goal)?.is_empty())
    }

    /// `X := A ⊓ ∃r.B` lines, one per variable in `vars` (all if `None`)
    pub fn render(&self, store: &AtomStore, vars: Option<&BTreeSet<AtomId>>) -> String {
        self.substitution
            .iter()
            .filter(|(v, _)| vars.map_or(true, |set| set.contains(v)))
            .map(|(&var, atoms)| {
                let rhs = if atoms.is_empty() {
                    crate::atoms::TOP_NAME.to_string()
                } else {
                    atoms
                        .iter()
                        .map(|&a| store.render(a))
                        .collect::<Vec<_>>()
                        .join(" ⊓ ")
                };
                format!("{} := {}", store.render(var), rhs)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_and_solve() {
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let b = store.constant("B").unwrap();
        let x = store.user_variable("X").unwrap();
        let mut goal = Goal::new("g", store);
        goal.add_equation([x], [a, b]).unwrap();

        let mut good = Unifier::for_variables(goal.store());
        good.assign(x, [a, b]);
        assert!(good.solves(&goal).unwrap());

        let mut bad = Unifier::for_variables(goal.store());
        bad.assign(x, [a]);
        assert_eq!(bad.violations(&goal).unwrap(), vec![0]);
    }

    #[test]
    fn test_cyclic_unifier_is_detected() {
        let mut store = AtomStore::new();
        let x = store.user_variable("X").unwrap();
        let rx = store.existential("r", x).unwrap();
        let mut unifier = Unifier::new();
        unifier.assign(x, [rx]);
        let err = unifier.ground_atom(&store, x).unwrap_err();
        assert_eq!(err.code, ErrorCode::CyclicAssignment);
    }

    #[test]
    fn test_nested_grounding() {
        let mut store = AtomStore::new();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let y = store.user_variable("Y").unwrap();
        let rx = store.existential("r", x).unwrap();
        let mut unifier = Unifier::for_variables(&store);
        unifier.assign(x, [a]);
        unifier.assign(y, [rx]);
        let grounded = unifier.ground_atom(&store, y).unwrap();
        assert_eq!(grounded.to_string(), "∃r.A");
    }

    #[test]
    fn test_projection_and_render() {
        let mut store = AtomStore::new();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let f = store
            .name("F", crate::atoms::AtomKind::FlatteningVariable)
            .unwrap();
        let mut unifier = Unifier::for_variables(&store);
        unifier.assign(x, [a]);
        unifier.assign(f, [a]);

        let users = store.user_variables().clone();
        let projected = unifier.projection(&users);
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.render(&store, None), "X := A");
        assert_eq!(unifier.definitions().len(), 2);
        assert!(unifier.definitions().iter().all(|d| !d.primitive));
    }

    #[test]
    fn test_closure_identifies_equivalent_unifiers() {
        // Y := ∃r.X and Y := ∃r.A ⊓ ∃r.X agree once X := A
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let y = store.user_variable("Y").unwrap();
        let ra = store.existential("r", a).unwrap();
        let rx = store.existential("r", x).unwrap();

        let mut bare = Unifier::for_variables(&store);
        bare.assign(x, [a]);
        bare.assign(y, [rx]);
        let mut full = Unifier::for_variables(&store);
        full.assign(x, [a]);
        full.assign(y, [ra, rx]);
        assert_ne!(bare, full);

        let closed = bare.closure(&store).unwrap();
        assert_eq!(closed, full.closure(&store).unwrap());
        assert_eq!(closed.get(x), Some(&BTreeSet::from([a])));
        assert_eq!(closed.get(y), Some(&BTreeSet::from([ra, rx])));
    }

    #[test]
    fn test_closure_of_top() {
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let y = store.user_variable("Y").unwrap();
        let ry = store.existential("r", y).unwrap();
        store.existential("r", a).unwrap();

        // X := ∃r.Y with Y := ⊤ is ∃r.⊤, which no other atom matches
        let mut unifier = Unifier::for_variables(&store);
        unifier.assign(x, [ry]);
        let closed = unifier.closure(&store).unwrap();
        assert_eq!(closed.get(x), Some(&BTreeSet::from([ry])));
        assert_eq!(closed.get(y), Some(&BTreeSet::new()));
        let users = store.user_variables().clone();
        assert_eq!(closed.ground_variables(&store, &users).unwrap()[0].to_string(), "∃r.⊤");
    }
}
