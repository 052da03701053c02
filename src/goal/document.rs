//! JSON goal documents
//!
//! The CLI and the tests describe goals as JSON:
//!
//! ```json
//! {
//!   "id": "example",
//!   "atoms": [{ "name": "X", "kind": "user" }],
//!   "equations": [{ "left": ["X"], "right": ["A", { "exists": { "role": "r", "filler": "B" } }] }]
//! }
//! ```
//!
//! Concept names that are not declared in `atoms` are constants. The names
//! `⊤`, `top` and `owl:Thing` denote the top concept.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::atoms::{Atom, AtomId, AtomKind, AtomStore, TOP_NAME};
use crate::error::{ErrorCode, UelError, UelResult};
use crate::goal::{Axiom, Goal};

/// Declaration of a concept name and its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomSpec {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: AtomKind,
}

fn default_kind() -> AtomKind {
    AtomKind::Constant
}

/// `∃role.filler`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistsSpec {
    pub role: String,
    pub filler: String,
}

/// Reference to an atom inside an axiom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AtomRef {
    Name(String),
    Exists { exists: ExistsSpec },
}

/// `left ∘ right` with the connective given by the list it appears in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxiomSpec {
    #[serde(default)]
    pub left: Vec<AtomRef>,
    #[serde(default)]
    pub right: Vec<AtomRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionSpec {
    pub defined: String,
    #[serde(default)]
    pub definiens: Vec<AtomRef>,
    #[serde(default)]
    pub primitive: bool,
}

/// Serializable description of a goal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalDocument {
    pub id: String,
    pub atoms: Vec<AtomSpec>,
    /// Shorthand for atoms of kind `user`
    pub variables: Vec<String>,
    pub definitions: Vec<DefinitionSpec>,
    pub equations: Vec<AxiomSpec>,
    pub subsumptions: Vec<AxiomSpec>,
    pub disequations: Vec<AxiomSpec>,
    pub dissubsumptions: Vec<AxiomSpec>,
}

fn is_top_name(name: &str) -> bool {
    matches!(name, TOP_NAME | "top" | "owl:Thing")
}

impl GoalDocument {
    pub fn from_json(text: &str) -> UelResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> UelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build the goal, interning every atom the document mentions
    pub fn into_goal(self) -> UelResult<Goal> {
        let id = if self.id.is_empty() { "goal".to_string() } else { self.id.clone() };
        let mut store = AtomStore::with_top();

        for spec in &self.atoms {
            if is_top_name(&spec.name) {
                continue;
            }
            if spec.kind == AtomKind::Existential {
                return Err(UelError::new(
                    ErrorCode::InvalidValue,
                    format!("atom {} is declared with kind existential", spec.name),
                ));
            }
            store.name(&spec.name, spec.kind)?;
        }
        for name in &self.variables {
            store.user_variable(name)?;
        }

        let mut goal = Goal::new(id, store);
        for def in &self.definitions {
            let defined = intern_name(goal.store_mut(), &def.defined)?;
            let definiens = intern_refs(goal.store_mut(), &def.definiens)?;
            goal.add_definition(defined, definiens, def.primitive)?;
        }
        let groups = [
            (&self.equations, crate::goal::Connective::Equivalence),
            (&self.subsumptions, crate::goal::Connective::Subsumption),
            (&self.disequations, crate::goal::Connective::Disequivalence),
            (&self.dissubsumptions, crate::goal::Connective::Dissubsumption),
        ];
        for (specs, connective) in groups {
            for spec in specs {
                let left = intern_refs(goal.store_mut(), &spec.left)?;
                let right = intern_refs(goal.store_mut(), &spec.right)?;
                goal.add_axiom(left, right, connective)?;
            }
        }
        Ok(goal)
    }
}

fn intern_name(store: &mut AtomStore, name: &str) -> UelResult<AtomId> {
    if is_top_name(name) {
        return Ok(store.intern_top());
    }
    store.intern(Atom::name(name))
}

fn intern_refs(store: &mut AtomStore, refs: &[AtomRef]) -> UelResult<BTreeSet<AtomId>> {
    let mut ids = BTreeSet::new();
    for r in refs {
        let id = match r {
            AtomRef::Name(name) => intern_name(store, name)?,
            AtomRef::Exists { exists } => {
                let filler = intern_name(store, &exists.filler)?;
                store.existential(&exists.role, filler)?
            }
        };
        ids.insert(id);
    }
    Ok(ids)
}

impl Goal {
    /// Parse a goal from a JSON document
    pub fn from_json(text: &str) -> UelResult<Goal> {
        GoalDocument::from_json(text)?.into_goal()
    }

    /// Describe this goal as a document
    pub fn to_document(&self) -> GoalDocument {
        let store = self.store();
        let to_ref = |id: AtomId| match store.get(id) {
            Some(Atom::Exists { role, filler }) => AtomRef::Exists {
                exists: ExistsSpec {
                    role: store.role_name(*role).unwrap_or_default().to_string(),
                    filler: store.render(*filler),
                },
            },
            _ => AtomRef::Name(store.render(id)),
        };
        let to_spec = |axiom: &Axiom| AxiomSpec {
            left: axiom.left.iter().map(|&id| to_ref(id)).collect(),
            right: axiom.right.iter().map(|&id| to_ref(id)).collect(),
        };

        let atoms = store
            .ids()
            .filter(|&id| store.get(id).is_some_and(Atom::is_name) && !store.is_top(id))
            .filter_map(|id| {
                store.kind(id).map(|kind| AtomSpec { name: store.render(id), kind })
            })
            .collect();

        GoalDocument {
            id: self.id().to_string(),
            atoms,
            variables: Vec::new(),
            definitions: self
                .definitions()
                .iter()
                .map(|d| DefinitionSpec {
                    defined: store.render(d.defined),
                    definiens: d.definiens.iter().map(|&id| to_ref(id)).collect(),
                    primitive: d.primitive,
                })
                .collect(),
            equations: self.equations().iter().map(to_spec).collect(),
            subsumptions: self.subsumptions().iter().map(to_spec).collect(),
            disequations: self.disequations().iter().map(to_spec).collect(),
            dissubsumptions: self.dissubsumptions().iter().map(to_spec).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "id": "cars",
        "variables": ["X"],
        "atoms": [{ "name": "Y", "kind": "flattening" }],
        "equations": [
            { "left": ["X"], "right": ["Car", { "exists": { "role": "has", "filler": "Y" } }] }
        ],
        "subsumptions": [{ "left": ["Y"], "right": ["Wheel", "top"] }],
        "dissubsumptions": [{ "left": ["X"], "right": ["Boat"] }]
    }"#;

    #[test]
    fn test_parse_document() {
        let goal = Goal::from_json(DOC).unwrap();
        let store = goal.store();
        assert_eq!(goal.id(), "cars");
        assert_eq!(store.user_variables().len(), 1);
        assert_eq!(store.flattening_variables().len(), 1);
        assert!(store.name_id("Car").is_some_and(|id| store.is_constant(id)));
        assert_eq!(goal.equations().len(), 1);
        // top is dropped from the right side
        assert_eq!(goal.subsumptions()[0].right.len(), 1);
        assert!(goal.has_negative_constraints());
    }

    #[test]
    fn test_document_roundtrip() {
        let goal = Goal::from_json(DOC).unwrap();
        let doc = goal.to_document();
        let again = doc.clone().into_goal().unwrap();
        assert_eq!(again.axioms().len(), goal.axioms().len());
        assert_eq!(again.to_document(), doc);
    }

    #[test]
    fn test_malformed_json() {
        let err = Goal::from_json("{ \"equations\": 3 }").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidFormat);
    }

    #[test]
    fn test_existential_kind_rejected() {
        let err = Goal::from_json(r#"{ "atoms": [{ "name": "A", "kind": "existential" }] }"#)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidValue);
    }
}
