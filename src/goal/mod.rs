//! Goals: flattened EL unification problems
//!
//! A goal is a set of axioms over the atoms of one [`AtomStore`]:
//! definitions, equations (≡), subsumptions (⊑), disequations (≢) and
//! dissubsumptions (⋢). Every side of an axiom is a conjunction, represented
//! as a set of atom ids; the top concept is dropped from conjunctions.
//!
//! Solvers only see a goal through `&Goal`.

pub mod document;
pub mod unifier;

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::atoms::{AtomId, AtomKind, AtomStore};
use crate::error::{UelError, UelResult};

pub use document::{AtomSpec, AxiomSpec, GoalDocument};
pub use unifier::Unifier;

/// Connective of a goal axiom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connective {
    Equivalence,
    Subsumption,
    Disequivalence,
    Dissubsumption,
}

impl Connective {
    pub fn symbol(&self) -> &'static str {
        match self {
            Connective::Equivalence => "≡",
            Connective::Subsumption => "⊑",
            Connective::Disequivalence => "≢",
            Connective::Dissubsumption => "⋢",
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, Connective::Disequivalence | Connective::Dissubsumption)
    }
}

/// An axiom `left ∘ right` between two conjunctions of atoms
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Axiom {
    pub left: BTreeSet<AtomId>,
    pub right: BTreeSet<AtomId>,
    pub connective: Connective,
}

impl Axiom {
    pub fn new(left: BTreeSet<AtomId>, right: BTreeSet<AtomId>, connective: Connective) -> Self {
        Self { left, right, connective }
    }

    pub fn atoms(&self) -> impl Iterator<Item = AtomId> + '_ {
        self.left.iter().chain(self.right.iter()).copied()
    }
}

// Hashing only looks at the two sides
impl Hash for Axiom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.left.hash(state);
        self.right.hash(state);
    }
}

/// A (possibly primitive) concept definition `defined ≡ definiens`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Definition {
    pub defined: AtomId,
    pub definiens: BTreeSet<AtomId>,
    /// Primitive definitions only state `defined ⊑ definiens`
    pub primitive: bool,
}

impl Definition {
    pub fn new(defined: AtomId, definiens: BTreeSet<AtomId>, primitive: bool) -> Self {
        Self { defined, definiens, primitive }
    }

    pub fn left(&self) -> BTreeSet<AtomId> {
        BTreeSet::from([self.defined])
    }
}

/// One positive constraint `left ⊑ right` derived from the goal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsumptionPair {
    pub left: BTreeSet<AtomId>,
    pub right: BTreeSet<AtomId>,
    /// Index of the originating axiom in [`Goal::axioms`]
    pub source: usize,
}

/// One negative constraint derived from the goal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegativeConstraint {
    pub left: BTreeSet<AtomId>,
    pub right: BTreeSet<AtomId>,
    /// Disequations are satisfied by a dissubsumption in either direction
    pub symmetric: bool,
    pub source: usize,
}

/// A unification problem
#[derive(Debug, Clone)]
pub struct Goal {
    id: String,
    store: AtomStore,
    definitions: IndexSet<Definition>,
    equations: IndexSet<Axiom>,
    subsumptions: IndexSet<Axiom>,
    disequations: IndexSet<Axiom>,
    dissubsumptions: IndexSet<Axiom>,
}

impl Goal {
    pub fn new(id: impl Into<String>, store: AtomStore) -> Self {
        Self {
            id: id.into(),
            store,
            definitions: IndexSet::new(),
            equations: IndexSet::new(),
            subsumptions: IndexSet::new(),
            disequations: IndexSet::new(),
            dissubsumptions: IndexSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn store(&self) -> &AtomStore {
        &self.store
    }

    /// Mutable access for the builder phase; solvers never get this
    pub fn store_mut(&mut self) -> &mut AtomStore {
        &mut self.store
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    pub fn add_equation(
        &mut self,
        left: impl IntoIterator<Item = AtomId>,
        right: impl IntoIterator<Item = AtomId>,
    ) -> UelResult<()> {
        self.add_axiom(left, right, Connective::Equivalence)
    }

    pub fn add_subsumption(
        &mut self,
        left: impl IntoIterator<Item = AtomId>,
        right: impl IntoIterator<Item = AtomId>,
    ) -> UelResult<()> {
        self.add_axiom(left, right, Connective::Subsumption)
    }

    pub fn add_disequation(
        &mut self,
        left: impl IntoIterator<Item = AtomId>,
        right: impl IntoIterator<Item = AtomId>,
    ) -> UelResult<()> {
        self.add_axiom(left, right, Connective::Disequivalence)
    }

    pub fn add_dissubsumption(
        &mut self,
        left: impl IntoIterator<Item = AtomId>,
        right: impl IntoIterator<Item = AtomId>,
    ) -> UelResult<()> {
        self.add_axiom(left, right, Connective::Dissubsumption)
    }

    /// Add an axiom after checking that all of its atoms are registered
    pub fn add_axiom(
        &mut self,
        left: impl IntoIterator<Item = AtomId>,
        right: impl IntoIterator<Item = AtomId>,
        connective: Connective,
    ) -> UelResult<()> {
        let index = self.axiom_count();
        let left = self.conjunction(left, index)?;
        let right = self.conjunction(right, index)?;
        let axiom = Axiom::new(left, right, connective);
        let set = match connective {
            Connective::Equivalence => &mut self.equations,
            Connective::Subsumption => &mut self.subsumptions,
            Connective::Disequivalence => &mut self.disequations,
            Connective::Dissubsumption => &mut self.dissubsumptions,
        };
        set.insert(axiom);
        Ok(())
    }

    /// Add a definition; a constant on the left becomes a definition variable
    pub fn add_definition(
        &mut self,
        defined: AtomId,
        definiens: impl IntoIterator<Item = AtomId>,
        primitive: bool,
    ) -> UelResult<()> {
        let index = self.axiom_count();
        if !self.store.contains(defined) {
            return Err(UelError::unknown_atom(defined).in_goal(&self.id).at_axiom(index));
        }
        if !self.store.get(defined).is_some_and(|a| a.is_name()) || self.store.is_top(defined) {
            return Err(UelError::type_mismatch(format!(
                "{} cannot be defined",
                self.store.render(defined)
            ))
            .in_goal(&self.id)
            .at_axiom(index));
        }
        let definiens = self.conjunction(definiens, index)?;
        if self.store.is_constant(defined) {
            self.store.classify_as(defined, AtomKind::DefinitionVariable)?;
        }
        self.definitions.insert(Definition::new(defined, definiens, primitive));
        Ok(())
    }

    fn conjunction(
        &self,
        atoms: impl IntoIterator<Item = AtomId>,
        index: usize,
    ) -> UelResult<BTreeSet<AtomId>> {
        let mut set = BTreeSet::new();
        for id in atoms {
            if !self.store.contains(id) {
                return Err(UelError::unknown_atom(id).in_goal(&self.id).at_axiom(index));
            }
            if !self.store.is_top(id) {
                set.insert(id);
            }
        }
        Ok(set)
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    pub fn definitions(&self) -> &IndexSet<Definition> {
        &self.definitions
    }

    pub fn equations(&self) -> &IndexSet<Axiom> {
        &self.equations
    }

    pub fn subsumptions(&self) -> &IndexSet<Axiom> {
        &self.subsumptions
    }

    pub fn disequations(&self) -> &IndexSet<Axiom> {
        &self.disequations
    }

    pub fn dissubsumptions(&self) -> &IndexSet<Axiom> {
        &self.dissubsumptions
    }

    pub fn axiom_count(&self) -> usize {
        self.definitions.len()
            + self.equations.len()
            + self.subsumptions.len()
            + self.disequations.len()
            + self.dissubsumptions.len()
    }

    pub fn has_negative_constraints(&self) -> bool {
        !self.disequations.is_empty() || !self.dissubsumptions.is_empty()
    }

    /// All axioms in a fixed order: definitions (as equations or
    /// subsumptions), equations, subsumptions, disequations, dissubsumptions.
    /// Axiom indices in error contexts refer to this order.
    pub fn axioms(&self) -> Vec<Axiom> {
        let definitions = self.definitions.iter().map(|d| {
            let connective = if d.primitive {
                Connective::Subsumption
            } else {
                Connective::Equivalence
            };
            Axiom::new(d.left(), d.definiens.clone(), connective)
        });
        definitions
            .chain(self.equations.iter().cloned())
            .chain(self.subsumptions.iter().cloned())
            .chain(self.disequations.iter().cloned())
            .chain(self.dissubsumptions.iter().cloned())
            .collect()
    }

    /// Positive constraints normalised to one-directional subsumptions
    pub fn subsumption_pairs(&self) -> Vec<SubsumptionPair> {
        let mut pairs = Vec::new();
        for (source, axiom) in self.axioms().into_iter().enumerate() {
            match axiom.connective {
                Connective::Equivalence => {
                    pairs.push(SubsumptionPair {
                        left: axiom.right.clone(),
                        right: axiom.left.clone(),
                        source,
                    });
                    pairs.push(SubsumptionPair { left: axiom.left, right: axiom.right, source });
                }
                Connective::Subsumption => {
                    pairs.push(SubsumptionPair { left: axiom.left, right: axiom.right, source });
                }
                Connective::Disequivalence | Connective::Dissubsumption => {}
            }
        }
        pairs
    }

    /// Negative constraints, indexed consistently with [`Goal::axioms`]
    pub fn negative_constraints(&self) -> Vec<NegativeConstraint> {
        self.axioms()
            .into_iter()
            .enumerate()
            .filter(|(_, axiom)| axiom.connective.is_negative())
            .map(|(source, axiom)| NegativeConstraint {
                symmetric: axiom.connective == Connective::Disequivalence,
                left: axiom.left,
                right: axiom.right,
                source,
            })
            .collect()
    }

    /// Render an axiom with atom names
    pub fn render_axiom(&self, axiom: &Axiom) -> String {
        format!(
            "{} {} {}",
            self.render_conjunction(&axiom.left),
            axiom.connective.symbol(),
            self.render_conjunction(&axiom.right)
        )
    }

    pub fn render_conjunction(&self, atoms: &BTreeSet<AtomId>) -> String {
        if atoms.is_empty() {
            return crate::atoms::TOP_NAME.to_string();
        }
        atoms
            .iter()
            .map(|&id| self.store.render(id))
            .collect::<Vec<_>>()
            .join(" ⊓ ")
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "goal {}", self.id)?;
        for axiom in self.axioms() {
            writeln!(f, "  {}", self.render_axiom(&axiom))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn store_with(names: &[&str], vars: &[&str]) -> AtomStore {
        let mut store = AtomStore::with_top();
        for n in names {
            store.constant(n).unwrap();
        }
        for v in vars {
            store.user_variable(v).unwrap();
        }
        store
    }

    #[test]
    fn test_unknown_atom_is_rejected() {
        let mut goal = Goal::new("g", store_with(&["A"], &["X"]));
        let err = goal.add_subsumption([99], [1]).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownAtom);
        assert_eq!(err.context_field("goal"), Some("g"));
        assert_eq!(err.context_field("axiom"), Some("0"));
    }

    #[test]
    fn test_top_is_dropped_from_conjunctions() {
        let store = store_with(&["A"], &["X"]);
        let top = store.top().unwrap();
        let a = store.name_id("A").unwrap();
        let x = store.name_id("X").unwrap();
        let mut goal = Goal::new("g", store);
        goal.add_subsumption([x, top], [a]).unwrap();
        let sub = &goal.subsumptions()[0];
        assert_eq!(sub.left, BTreeSet::from([x]));
    }

    #[test]
    fn test_subsumption_pairs_normalise_equations() {
        let store = store_with(&["A", "B"], &["X"]);
        let a = store.name_id("A").unwrap();
        let b = store.name_id("B").unwrap();
        let x = store.name_id("X").unwrap();
        let mut goal = Goal::new("g", store);
        goal.add_equation([x], [a, b]).unwrap();
        goal.add_subsumption([x], [a]).unwrap();

        let pairs = goal.subsumption_pairs();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].left, BTreeSet::from([a, b]));
        assert_eq!(pairs[0].right, BTreeSet::from([x]));
        assert_eq!(pairs[2].source, 1);
    }

    #[test]
    fn test_definition_makes_defined_name_variable() {
        let store = store_with(&["A", "B"], &[]);
        let a = store.name_id("A").unwrap();
        let b = store.name_id("B").unwrap();
        let mut goal = Goal::new("g", store);
        goal.add_definition(a, [b], true).unwrap();

        assert!(goal.store().definition_variables().contains(&a));
        let pairs = goal.subsumption_pairs();
        assert_eq!(pairs.len(), 1, "primitive definitions are one-directional");
        assert_eq!(goal.axioms()[0].connective, Connective::Subsumption);
    }

    #[test]
    fn test_existential_cannot_be_defined() {
        let mut store = store_with(&["A"], &[]);
        let a = store.name_id("A").unwrap();
        let ra = store.existential("r", a).unwrap();
        let mut goal = Goal::new("g", store);
        let err = goal.add_definition(ra, [a], false).unwrap_err();
        assert_eq!(err.code, ErrorCode::TypeMismatch);
    }

    #[test]
    fn test_negative_constraints_indexing() {
        let store = store_with(&["A", "B"], &["X"]);
        let a = store.name_id("A").unwrap();
        let b = store.name_id("B").unwrap();
        let x = store.name_id("X").unwrap();
        let mut goal = Goal::new("g", store);
        goal.add_subsumption([x], [a]).unwrap();
        goal.add_dissubsumption([x], [b]).unwrap();
        goal.add_disequation([a], [a]).unwrap();

        assert!(goal.has_negative_constraints());
        let negs = goal.negative_constraints();
        assert_eq!(negs.len(), 2);
        assert!(negs[0].symmetric);
        assert_eq!(negs[0].source, 1);
        assert_eq!(negs[1].source, 2);
    }

    #[test]
    fn test_display() {
        let store = store_with(&["A", "B"], &["X"]);
        let a = store.name_id("A").unwrap();
        let b = store.name_id("B").unwrap();
        let x = store.name_id("X").unwrap();
        let mut goal = Goal::new("demo", store);
        goal.add_equation([x], [a, b]).unwrap();
        assert!(goal.to_string().contains("X ≡ A ⊓ B"));
    }
}
