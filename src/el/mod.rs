//! Ground EL concepts and structural subsumption
//!
//! EL concepts are built from concept names, the top concept, conjunction
//! and existential restriction. Subsumption between ground EL concepts
//! without a TBox is decided structurally:
//!
//! `C ⊑ D` iff for every top-level atom `d` of `D` there is a top-level atom
//! `c` of `C` with `c = d` for names, or `c = ∃r.C'`, `d = ∃r.D'` and
//! `C' ⊑ D'`.
//!
//! This checker is independent of both solvers and is used to validate
//! their unifiers.

use std::fmt;

/// A ground EL concept
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Concept {
    /// Top concept (⊤)
    Top,
    /// Atomic concept (named class)
    Atomic(String),
    /// Conjunction (C ⊓ D)
    And(Box<Concept>, Box<Concept>),
    /// Existential restriction (∃R.C)
    Exists(String, Box<Concept>),
}

impl Concept {
    pub fn atomic(name: &str) -> Self {
        Concept::Atomic(name.to_string())
    }

    pub fn and(c1: Concept, c2: Concept) -> Self {
        Concept::And(Box::new(c1), Box::new(c2))
    }

    pub fn exists(role: &str, c: Concept) -> Self {
        Concept::Exists(role.to_string(), Box::new(c))
    }

    /// Conjunction of a list of concepts; the empty conjunction is ⊤
    pub fn conjunction(concepts: impl IntoIterator<Item = Concept>) -> Self {
        concepts
            .into_iter()
            .filter(|c| *c != Concept::Top)
            .reduce(Concept::and)
            .unwrap_or(Concept::Top)
    }

    /// Top-level atoms (names and existentials), with ⊤ dropped
    pub fn conjuncts(&self) -> Vec<&Concept> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<&'a Concept>) {
        match self {
            Concept::Top => {}
            Concept::And(c1, c2) => {
                c1.collect_conjuncts(out);
                c2.collect_conjuncts(out);
            }
            atom => out.push(atom),
        }
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concept::Top => write!(f, "⊤"),
            Concept::Atomic(name) => write!(f, "{}", name),
            Concept::And(..) => {
                let parts: Vec<String> = self.conjuncts().iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join(" ⊓ "))
            }
            Concept::Exists(role, filler) => match **filler {
                Concept::And(..) => write!(f, "∃{}.({})", role, filler),
                _ => write!(f, "∃{}.{}", role, filler),
            },
        }
    }
}

/// Decide `c ⊑ d` for ground EL concepts
pub fn subsumes(c: &Concept, d: &Concept) -> bool {
    let left = c.conjuncts();
    d.conjuncts()
        .into_iter()
        .all(|goal| left.iter().any(|atom| atom_subsumes(atom, goal)))
}

/// Decide `c ≡ d` for ground EL concepts
pub fn equivalent(c: &Concept, d: &Concept) -> bool {
    subsumes(c, d) && subsumes(d, c)
}

fn atom_subsumes(c: &Concept, d: &Concept) -> bool {
    match (c, d) {
        (Concept::Atomic(a), Concept::Atomic(b)) => a == b,
        (Concept::Exists(r, c1), Concept::Exists(s, d1)) => r == s && subsumes(c1, d1),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a() -> Concept {
        Concept::atomic("A")
    }

    fn b() -> Concept {
        Concept::atomic("B")
    }

    #[test]
    fn test_conjunction_subsumption() {
        let ab = Concept::and(a(), b());
        assert!(subsumes(&ab, &a()));
        assert!(subsumes(&ab, &b()));
        assert!(!subsumes(&a(), &ab));
    }

    #[test]
    fn test_top() {
        assert!(subsumes(&a(), &Concept::Top));
        assert!(!subsumes(&Concept::Top, &a()));
        assert!(subsumes(&Concept::Top, &Concept::Top));
        assert_eq!(Concept::conjunction(vec![]), Concept::Top);
    }

    #[test]
    fn test_existential_subsumption() {
        let ra = Concept::exists("r", a());
        let rab = Concept::exists("r", Concept::and(a(), b()));
        let sa = Concept::exists("s", a());
        let r_top = Concept::exists("r", Concept::Top);

        assert!(subsumes(&rab, &ra));
        assert!(!subsumes(&ra, &rab));
        assert!(!subsumes(&ra, &sa));
        assert!(subsumes(&ra, &r_top));
        assert!(!subsumes(&r_top, &ra));
        assert!(!subsumes(&ra, &a()));
    }

    #[test]
    fn test_equivalence_ignores_order_and_duplicates() {
        let c1 = Concept::and(a(), Concept::and(b(), a()));
        let c2 = Concept::and(b(), a());
        assert!(equivalent(&c1, &c2));
        assert_eq!(c1.conjuncts().len(), 3);
    }

    #[test]
    fn test_display() {
        let c = Concept::and(a(), Concept::exists("r", Concept::and(a(), b())));
        assert_eq!(c.to_string(), "A ⊓ ∃r.(A ⊓ B)");
    }
}
