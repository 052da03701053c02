//! Flat subsumptions `A1 ⊓ … ⊓ An ⊑ B`

use std::collections::BTreeSet;
use std::fmt;

use crate::atoms::{AtomId, AtomStore};
use crate::goal::Goal;

/// A subsumption between a conjunction of atoms and a single atom
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlatSubsumption {
    /// Sorted, duplicate-free body atoms (empty means ⊤)
    body: Vec<AtomId>,
    head: AtomId,
    solved: bool,
}

impl FlatSubsumption {
    pub fn new(body: impl IntoIterator<Item = AtomId>, head: AtomId) -> Self {
        let body: BTreeSet<AtomId> = body.into_iter().collect();
        Self { body: body.into_iter().collect(), head, solved: false }
    }

    /// One flat subsumption per right-hand atom of every positive constraint
    pub fn from_goal(goal: &Goal) -> Vec<FlatSubsumption> {
        goal.subsumption_pairs()
            .into_iter()
            .flat_map(|pair| {
                let left = pair.left;
                pair.right
                    .into_iter()
                    .map(move |head| FlatSubsumption::new(left.iter().copied(), head))
            })
            .collect()
    }

    pub fn body(&self) -> &[AtomId] {
        &self.body
    }

    pub fn head(&self) -> AtomId {
        self.head
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }

    pub fn mark_solved(&mut self) {
        self.solved = true;
    }

    /// Identity ignoring the solved flag
    pub fn key(&self) -> (Vec<AtomId>, AtomId) {
        (self.body.clone(), self.head)
    }

    pub fn body_contains(&self, atom: AtomId) -> bool {
        self.body.binary_search(&atom).is_ok()
    }

    /// Top-level variables of the body
    pub fn body_variables<'a>(&'a self, store: &'a AtomStore) -> impl Iterator<Item = AtomId> + 'a {
        self.body.iter().copied().filter(move |&a| store.is_variable(a))
    }

    /// Whether every atom is a constant or an existential over a constant
    pub fn is_ground(&self, store: &AtomStore) -> bool {
        store.is_ground(self.head) && self.body.iter().all(|&a| store.is_ground(a))
    }

    pub fn render(&self, store: &AtomStore) -> String {
        let body = if self.body.is_empty() {
            crate::atoms::TOP_NAME.to_string()
        } else {
            self.body
                .iter()
                .map(|&a| store.render(a))
                .collect::<Vec<_>>()
                .join(" ⊓ ")
        };
        format!("{} ⊑ {}", body, store.render(self.head))
    }
}

impl fmt::Display for FlatSubsumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ⊑ {}", self.body, self.head)?;
        if self.solved {
            write!(f, " (solved)")?;
        }
        Ok(())
    }
}
