//! Propositional literals of the SAT encoding
//!
//! Every propositional variable is owned by one [`LiteralTable`], which the
//! encoder creates per goal. Variable numbers are table indices plus one.

use std::fmt;

use indexmap::IndexSet;

use crate::atoms::{AtomId, AtomStore};
use crate::sat::formula::{Lit, Var};

/// Meaning of a propositional variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Literal {
    /// `[a ⊑ b]`
    Subsumption(AtomId, AtomId),
    /// `[a ⋢ b]`
    Dissubsumption(AtomId, AtomId),
    /// `[x > y]`: `y` occurs in the substitution of `x`
    Order(AtomId, AtomId),
    /// Auxiliary choice variable
    Choice(usize),
}

impl Literal {
    /// Render with atom names
    pub fn render(&self, store: &AtomStore) -> String {
        match *self {
            Literal::Subsumption(a, b) => format!("[{} ⊑ {}]", store.render(a), store.render(b)),
            Literal::Dissubsumption(a, b) => {
                format!("[{} ⋢ {}]", store.render(a), store.render(b))
            }
            Literal::Order(x, y) => format!("[{} > {}]", store.render(x), store.render(y)),
            Literal::Choice(n) => format!("c{}", n),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Subsumption(a, b) => write!(f, "[{} ⊑ {}]", a, b),
            Literal::Dissubsumption(a, b) => write!(f, "[{} ⋢ {}]", a, b),
            Literal::Order(x, y) => write!(f, "[{} > {}]", x, y),
            Literal::Choice(n) => write!(f, "c{}", n),
        }
    }
}

/// Allocates propositional variables for literals
///
/// Pair variables read as `[a ⋢ b]` in normal mode and as `[a ⊑ b]` in
/// minimal mode. [`LiteralTable::sub`] and [`LiteralTable::dissub`] hide
/// the reading, so encoding rules are written once for both modes.
#[derive(Debug, Clone)]
pub struct LiteralTable {
    literals: IndexSet<Literal>,
    minimal: bool,
    choices: usize,
}

impl LiteralTable {
    pub fn new(minimal: bool) -> Self {
        Self { literals: IndexSet::new(), minimal, choices: 0 }
    }

    pub fn is_minimal(&self) -> bool {
        self.minimal
    }

    fn intern(&mut self, literal: Literal) -> Var {
        let (index, _) = self.literals.insert_full(literal);
        index as Var + 1
    }

    fn pair(&self, a: AtomId, b: AtomId) -> Literal {
        if self.minimal {
            Literal::Subsumption(a, b)
        } else {
            Literal::Dissubsumption(a, b)
        }
    }

    /// Signed literal standing for `[a ⊑ b]`
    pub fn sub(&mut self, a: AtomId, b: AtomId) -> Lit {
        let var = self.intern(self.pair(a, b));
        Lit::new(var, self.minimal)
    }

    /// Signed literal standing for `[a ⋢ b]`
    pub fn dissub(&mut self, a: AtomId, b: AtomId) -> Lit {
        self.sub(a, b).negated()
    }

    /// `[x > y]`
    pub fn order(&mut self, x: AtomId, y: AtomId) -> Lit {
        Lit::positive(self.intern(Literal::Order(x, y)))
    }

    /// A fresh auxiliary variable
    pub fn fresh(&mut self) -> Lit {
        let n = self.choices;
        self.choices += 1;
        Lit::positive(self.intern(Literal::Choice(n)))
    }

    /// `[a ⊑ b]` without allocating
    pub fn lookup_sub(&self, a: AtomId, b: AtomId) -> Option<Lit> {
        self.literals
            .get_index_of(&self.pair(a, b))
            .map(|index| Lit::new(index as Var + 1, self.minimal))
    }

    /// Meaning of a variable
    pub fn literal(&self, var: Var) -> Option<&Literal> {
        let index = (var as usize).checked_sub(1)?;
        self.literals.get_index(index)
    }

    /// Number of allocated variables
    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Var, &Literal)> {
        self.literals
            .iter()
            .enumerate()
            .map(|(i, l)| (i as Var + 1, l))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_depends_on_mode() {
        let mut normal = LiteralTable::new(false);
        let sub = normal.sub(1, 2);
        assert!(!sub.sign(), "normal mode variables read as dissubsumption");
        assert_eq!(normal.literal(sub.var()), Some(&Literal::Dissubsumption(1, 2)));
        assert_eq!(normal.dissub(1, 2), sub.negated());

        let mut minimal = LiteralTable::new(true);
        let sub = minimal.sub(1, 2);
        assert!(sub.sign());
        assert_eq!(minimal.literal(sub.var()), Some(&Literal::Subsumption(1, 2)));
    }

    #[test]
    fn test_allocation_is_dense_and_stable() {
        let mut table = LiteralTable::new(true);
        let a = table.sub(0, 1);
        let b = table.order(2, 3);
        let c = table.fresh();
        let d = table.fresh();
        assert_eq!((a.var(), b.var(), c.var(), d.var()), (1, 2, 3, 4));
        assert_eq!(table.sub(0, 1), a);
        assert_eq!(table.lookup_sub(0, 1), Some(a));
        assert_eq!(table.lookup_sub(5, 5), None);
        assert_eq!(table.literal(0), None);
        assert_eq!(table.literal(5), None);
        assert_eq!(table.len(), 4);
    }
}
