//! Atom Store
//!
//! Interns the flat atoms of a unification problem into dense integer ids:
//! concept names and existential restrictions `∃r.A` whose filler `A` is a
//! concept name already in the store. Roles live in their own table.
//!
//! Every concept name carries a classification (constant or one of three
//! variable kinds). The derived id sets are plain index sets kept in sync by
//! [`AtomStore::reclassify`]; there are no listeners.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, UelError, UelResult};
use crate::uel_bail;

/// Dense identifier of an atom
pub type AtomId = usize;

/// Dense identifier of a role name
pub type RoleId = usize;

/// Name used for the designated top concept
pub const TOP_NAME: &str = "⊤";

/// A flat EL atom
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Atom {
    /// A concept name (constant or variable, see [`AtomKind`])
    Name(String),
    /// An existential restriction over a concept name
    Exists { role: RoleId, filler: AtomId },
}

impl Atom {
    pub fn name(name: impl Into<String>) -> Self {
        Atom::Name(name.into())
    }

    pub fn exists(role: RoleId, filler: AtomId) -> Self {
        Atom::Exists { role, filler }
    }

    pub fn is_name(&self) -> bool {
        matches!(self, Atom::Name(_))
    }

    pub fn is_existential(&self) -> bool {
        matches!(self, Atom::Exists { .. })
    }
}

/// Classification of an atom id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomKind {
    /// Concept name that is not substituted
    Constant,
    /// Variable whose substitution is reported to the user
    #[serde(rename = "user")]
    UserVariable,
    /// Concept name made variable by a definition
    #[serde(rename = "definition")]
    DefinitionVariable,
    /// Fresh name introduced by flattening
    #[serde(rename = "flattening")]
    FlatteningVariable,
    /// Existential restriction (never reclassified)
    Existential,
}

impl AtomKind {
    pub fn is_variable(&self) -> bool {
        matches!(
            self,
            AtomKind::UserVariable | AtomKind::DefinitionVariable | AtomKind::FlatteningVariable
        )
    }
}

/// Interning table for atoms and roles
#[derive(Debug, Clone, Default)]
pub struct AtomStore {
    atoms: IndexSet<Atom>,
    kinds: Vec<AtomKind>,
    roles: IndexSet<String>,
    top: Option<AtomId>,

    constants: BTreeSet<AtomId>,
    existentials: BTreeSet<AtomId>,
    variables: BTreeSet<AtomId>,
    user_variables: BTreeSet<AtomId>,
    definition_variables: BTreeSet<AtomId>,
    flattening_variables: BTreeSet<AtomId>,
}

impl AtomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose first atom is the top concept
    pub fn with_top() -> Self {
        let mut store = Self::new();
        store.intern_top();
        store
    }

    // ------------------------------------------------------------------------
    // Interning
    // ------------------------------------------------------------------------

    /// Intern an atom, returning the existing id if it is already present.
    ///
    /// New concept names start out as constants. Existential restrictions
    /// must refer to a known role and to a concept name already in the store.
    pub fn intern(&mut self, atom: Atom) -> UelResult<AtomId> {
        if let Some(id) = self.atoms.get_index_of(&atom) {
            return Ok(id);
        }
        let kind = self.initial_kind(&atom)?;
        let (id, _) = self.atoms.insert_full(atom);
        self.kinds.push(kind);
        self.reclassify(id);
        Ok(id)
    }

    /// Associate an explicit id with an atom.
    ///
    /// Fails with `AtomConflict` if the id is already bound to a different
    /// atom or the atom is already bound to a different id.
    pub fn insert_with_id(&mut self, id: AtomId, atom: Atom) -> UelResult<()> {
        if let Some(existing) = self.atoms.get_index(id) {
            if *existing == atom {
                return Ok(());
            }
            return Err(UelError::conflict(format!(
                "atom id {} is already bound to {}",
                id,
                self.render(id)
            ))
            .with_context("id", id.to_string()));
        }
        if let Some(other) = self.atoms.get_index_of(&atom) {
            return Err(UelError::conflict(format!(
                "atom is already bound to id {}, cannot rebind it to {}",
                other, id
            )));
        }
        if id != self.atoms.len() {
            uel_bail!(
                ErrorCode::InvalidValue,
                "atom ids are dense: expected {}, got {}",
                self.atoms.len(),
                id
            );
        }
        self.intern(atom).map(|_| ())
    }

    /// Intern a role name
    pub fn intern_role(&mut self, name: &str) -> RoleId {
        match self.roles.get_index_of(name) {
            Some(id) => id,
            None => self.roles.insert_full(name.to_string()).0,
        }
    }

    /// Intern a concept name with the given classification.
    ///
    /// An existing name keeps its id and is reclassified.
    pub fn name(&mut self, name: &str, kind: AtomKind) -> UelResult<AtomId> {
        let id = self.intern(Atom::name(name))?;
        self.classify_as(id, kind)?;
        Ok(id)
    }

    pub fn constant(&mut self, name: &str) -> UelResult<AtomId> {
        self.name(name, AtomKind::Constant)
    }

    pub fn user_variable(&mut self, name: &str) -> UelResult<AtomId> {
        self.name(name, AtomKind::UserVariable)
    }

    /// Intern `∃role.filler`
    pub fn existential(&mut self, role: &str, filler: AtomId) -> UelResult<AtomId> {
        let role = self.intern_role(role);
        self.intern(Atom::exists(role, filler))
    }

    /// Intern the designated top concept
    pub fn intern_top(&mut self) -> AtomId {
        if let Some(top) = self.top {
            return top;
        }
        let id = match self.atoms.get_index_of(&Atom::name(TOP_NAME)) {
            Some(id) => id,
            None => {
                let (id, _) = self.atoms.insert_full(Atom::name(TOP_NAME));
                self.kinds.push(AtomKind::Constant);
                id
            }
        };
        self.kinds[id] = AtomKind::Constant;
        self.top = Some(id);
        self.reclassify(id);
        id
    }

    fn initial_kind(&self, atom: &Atom) -> UelResult<AtomKind> {
        match atom {
            Atom::Name(_) => Ok(AtomKind::Constant),
            Atom::Exists { role, filler } => {
                if *role >= self.roles.len() {
                    uel_bail!(ErrorCode::UnknownAtom, "unknown role id {}", role);
                }
                match self.atoms.get_index(*filler) {
                    Some(Atom::Name(_)) => Ok(AtomKind::Existential),
                    Some(Atom::Exists { .. }) => Err(UelError::type_mismatch(format!(
                        "filler {} of an existential restriction must be a concept name",
                        filler
                    ))),
                    None => Err(UelError::unknown_atom(*filler)),
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------------

    /// Set the classification of a concept name
    pub fn classify_as(&mut self, id: AtomId, kind: AtomKind) -> UelResult<()> {
        match self.atoms.get_index(id) {
            None => return Err(UelError::unknown_atom(id)),
            Some(Atom::Exists { .. }) => {
                return Err(UelError::type_mismatch(format!(
                    "{} is an existential restriction and cannot be reclassified",
                    self.render(id)
                )))
            }
            Some(Atom::Name(_)) => {}
        }
        if kind == AtomKind::Existential {
            return Err(UelError::type_mismatch(format!(
                "concept name {} cannot be classified as an existential restriction",
                self.render(id)
            )));
        }
        if Some(id) == self.top && kind != AtomKind::Constant {
            return Err(UelError::type_mismatch("the top concept is always a constant"));
        }
        if self.kinds[id] != kind {
            self.kinds[id] = kind;
            self.reclassify(id);
        }
        Ok(())
    }

    /// Turn a constant into a user variable (no-op for variables)
    pub fn flip_to_variable(&mut self, id: AtomId) -> UelResult<()> {
        if self.is_variable(id) {
            return Ok(());
        }
        self.classify_as(id, AtomKind::UserVariable)
    }

    /// Turn a variable into a constant (no-op for constants)
    pub fn flip_to_constant(&mut self, id: AtomId) -> UelResult<()> {
        self.classify_as(id, AtomKind::Constant)
    }

    /// Recompute the derived index sets for one id from its stored kind
    pub fn reclassify(&mut self, id: AtomId) {
        self.constants.remove(&id);
        self.existentials.remove(&id);
        self.variables.remove(&id);
        self.user_variables.remove(&id);
        self.definition_variables.remove(&id);
        self.flattening_variables.remove(&id);

        let Some(kind) = self.kinds.get(id).copied() else {
            return;
        };
        match kind {
            AtomKind::Constant => {
                self.constants.insert(id);
            }
            AtomKind::Existential => {
                self.existentials.insert(id);
            }
            AtomKind::UserVariable => {
                self.variables.insert(id);
                self.user_variables.insert(id);
            }
            AtomKind::DefinitionVariable => {
                self.variables.insert(id);
                self.definition_variables.insert(id);
            }
            AtomKind::FlatteningVariable => {
                self.variables.insert(id);
                self.flattening_variables.insert(id);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn contains(&self, id: AtomId) -> bool {
        id < self.atoms.len()
    }

    pub fn get(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get_index(id)
    }

    pub fn id_of(&self, atom: &Atom) -> Option<AtomId> {
        self.atoms.get_index_of(atom)
    }

    pub fn name_id(&self, name: &str) -> Option<AtomId> {
        self.id_of(&Atom::name(name))
    }

    pub fn kind(&self, id: AtomId) -> Option<AtomKind> {
        self.kinds.get(id).copied()
    }

    pub fn top(&self) -> Option<AtomId> {
        self.top
    }

    pub fn is_top(&self, id: AtomId) -> bool {
        self.top == Some(id)
    }

    pub fn is_variable(&self, id: AtomId) -> bool {
        self.variables.contains(&id)
    }

    pub fn is_user_variable(&self, id: AtomId) -> bool {
        self.user_variables.contains(&id)
    }

    pub fn is_constant(&self, id: AtomId) -> bool {
        self.constants.contains(&id)
    }

    pub fn is_existential(&self, id: AtomId) -> bool {
        self.existentials.contains(&id)
    }

    /// Constant, or existential restriction over a constant
    pub fn is_ground(&self, id: AtomId) -> bool {
        match self.get(id) {
            Some(Atom::Name(_)) => self.is_constant(id),
            Some(Atom::Exists { filler, .. }) => self.is_constant(*filler),
            None => false,
        }
    }

    /// Role of an existential restriction
    pub fn role(&self, id: AtomId) -> Option<RoleId> {
        match self.get(id) {
            Some(Atom::Exists { role, .. }) => Some(*role),
            _ => None,
        }
    }

    /// Filler of an existential restriction
    pub fn filler(&self, id: AtomId) -> Option<AtomId> {
        match self.get(id) {
            Some(Atom::Exists { filler, .. }) => Some(*filler),
            _ => None,
        }
    }

    pub fn role_name(&self, role: RoleId) -> Option<&str> {
        self.roles.get_index(role).map(String::as_str)
    }

    pub fn role_id(&self, name: &str) -> Option<RoleId> {
        self.roles.get_index_of(name)
    }

    pub fn ids(&self) -> std::ops::Range<AtomId> {
        0..self.atoms.len()
    }

    pub fn constants(&self) -> &BTreeSet<AtomId> {
        &self.constants
    }

    pub fn existentials(&self) -> &BTreeSet<AtomId> {
        &self.existentials
    }

    pub fn variables(&self) -> &BTreeSet<AtomId> {
        &self.variables
    }

    pub fn user_variables(&self) -> &BTreeSet<AtomId> {
        &self.user_variables
    }

    pub fn definition_variables(&self) -> &BTreeSet<AtomId> {
        &self.definition_variables
    }

    pub fn flattening_variables(&self) -> &BTreeSet<AtomId> {
        &self.flattening_variables
    }

    pub fn roles(&self) -> impl Iterator<Item = (RoleId, &str)> {
        self.roles.iter().enumerate().map(|(i, r)| (i, r.as_str()))
    }

    /// Constants and existential restrictions, in id order
    pub fn non_variable_atoms(&self) -> Vec<AtomId> {
        self.constants.union(&self.existentials).copied().collect()
    }

    /// Human-readable form of an atom, e.g. `∃hasPart.Wheel`
    pub fn render(&self, id: AtomId) -> String {
        match self.get(id) {
            Some(Atom::Name(name)) => name.clone(),
            Some(Atom::Exists { role, filler }) => format!(
                "∃{}.{}",
                self.role_name(*role).unwrap_or("?"),
                self.render(*filler)
            ),
            None => format!("<{}>", id),
        }
    }
}

impl fmt::Display for AtomStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in self.ids() {
            let kind = self.kinds[id];
            writeln!(f, "{:>4}  {:<12?} {}", id, kind, self.render(id))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_idempotent() {
        let mut store = AtomStore::new();
        let a = store.constant("A").unwrap();
        let again = store.intern(Atom::name("A")).unwrap();
        assert_eq!(a, again);
        assert_eq!(store.len(), 1);

        let ra = store.existential("r", a).unwrap();
        assert_eq!(store.existential("r", a).unwrap(), ra);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_classification_sets() {
        let mut store = AtomStore::new();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let f = store.name("F1", AtomKind::FlatteningVariable).unwrap();
        let rx = store.existential("r", x).unwrap();

        assert!(store.constants().contains(&a));
        assert!(store.variables().contains(&x));
        assert!(store.user_variables().contains(&x));
        assert!(store.flattening_variables().contains(&f));
        assert!(!store.user_variables().contains(&f));
        assert!(store.existentials().contains(&rx));
        assert_eq!(store.non_variable_atoms(), vec![a, rx]);
    }

    #[test]
    fn test_flip_updates_exactly_one_set() {
        let mut store = AtomStore::new();
        let a = store.constant("A").unwrap();
        store.flip_to_variable(a).unwrap();
        assert!(store.is_variable(a));
        assert!(store.is_user_variable(a));
        assert!(!store.is_constant(a));

        store.flip_to_constant(a).unwrap();
        assert!(store.is_constant(a));
        assert!(store.variables().is_empty());
    }

    #[test]
    fn test_reclassify_existential_is_type_mismatch() {
        let mut store = AtomStore::new();
        let a = store.constant("A").unwrap();
        let ra = store.existential("r", a).unwrap();
        let err = store.flip_to_variable(ra).unwrap_err();
        assert_eq!(err.code, ErrorCode::TypeMismatch);
    }

    #[test]
    fn test_insert_with_id_conflict() {
        let mut store = AtomStore::new();
        store.insert_with_id(0, Atom::name("A")).unwrap();
        store.insert_with_id(0, Atom::name("A")).unwrap();

        let err = store.insert_with_id(0, Atom::name("B")).unwrap_err();
        assert_eq!(err.code, ErrorCode::AtomConflict);

        let err = store.insert_with_id(1, Atom::name("A")).unwrap_err();
        assert_eq!(err.code, ErrorCode::AtomConflict);

        let err = store.insert_with_id(5, Atom::name("C")).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
    }

    #[test]
    fn test_existential_filler_must_be_name() {
        let mut store = AtomStore::new();
        let a = store.constant("A").unwrap();
        let ra = store.existential("r", a).unwrap();
        let err = store.existential("s", ra).unwrap_err();
        assert_eq!(err.code, ErrorCode::TypeMismatch);

        let err = store.existential("s", 42).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownAtom);
    }

    #[test]
    fn test_top_and_ground() {
        let mut store = AtomStore::with_top();
        let top = store.top().unwrap();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let ra = store.existential("r", a).unwrap();
        let rx = store.existential("r", x).unwrap();

        assert!(store.is_top(top));
        assert!(store.is_ground(ra));
        assert!(!store.is_ground(rx));
        assert!(store.classify_as(top, AtomKind::UserVariable).is_err());
        assert_eq!(store.render(rx), "∃r.X");
    }
}
