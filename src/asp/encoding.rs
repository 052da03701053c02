//! Goal → answer set program
//!
//! Atoms are written as ground terms: constants `a<id>`, variables `x<id>`
//! and existential restrictions `exists(r<role>, <filler>)`. Every axiom `I`
//! contributes one connective fact and a `hasatom(Atom, Side, I)` fact per
//! atom, side 1 being the left-hand side. The fixed program below guesses
//! the subsumers of every variable and checks all axioms.

use std::fmt::Write as _;

use crate::atoms::{Atom, AtomId, AtomStore};
use crate::error::{UelError, UelResult};
use crate::goal::{Connective, Goal};

/// Rules shared by every goal
pub const UNIFICATION_PROGRAM: &str = r#"
side(1). side(2).

atom(A) :- hasatom(A, _, _).
atom(F) :- hasatom(exists(_, F), _, _).
atom(A) :- var(A).
atom(A) :- const(A).
nonvar(A) :- const(A).
nonvar(exists(R, F)) :- atom(exists(R, F)).

% guess the non-variable subsumers of every variable
{ subs(X, A) : nonvar(A), not top(A) } :- var(X).

% acyclic substitutions only
dep(X, Y) :- subs(X, exists(_, Y)), var(Y).
dep(X, Z) :- dep(X, Y), dep(Y, Z).
:- dep(X, X).

% subsumption between atoms under the substitution
sub(A, A) :- atom(A).
sub(A, T) :- atom(A), top(T).
sub(X, D) :- var(X), subs(X, E), sub(E, D), nonvar(D).
sub(C, D) :- atom(C), var(D), sub(C, E) : subs(D, E).
sub(exists(R, F), exists(R, G)) :- atom(exists(R, F)), atom(exists(R, G)), sub(F, G).

% side S of axiom I is subsumed by the non-variable atom E
lsub(I, S, E) :- hasatom(C, S, I), sub(C, E), nonvar(E).

% side S of axiom I is not subsumed by side T
nsub(I, S, T) :- side(S), side(T), S != T, hasatom(D, T, I), nonvar(D), not lsub(I, S, D).
nsub(I, S, T) :- side(S), side(T), S != T, hasatom(D, T, I), var(D), subs(D, E), not lsub(I, S, E).

:- eq(I), nsub(I, 1, 2).
:- eq(I), nsub(I, 2, 1).
:- sub(I), nsub(I, 1, 2).
:- dissub(I), not nsub(I, 1, 2).
:- diseq(I), not nsub(I, 1, 2), not nsub(I, 2, 1).

relsubs(X, A) :- subs(X, A), relevant(X).
#show relsubs/2.
"#;

/// Appended in minimal mode: with domain-recursive enumeration clingo only
/// reports models whose relevant `subs/2` atoms are subset-minimal
pub const MINIMIZE_PROGRAM: &str = "#heuristic subs(X, A) : relevant(X), nonvar(A). [1, false]\n";

/// Ground term of an atom
pub fn atom_term(store: &AtomStore, id: AtomId) -> UelResult<String> {
    match store.get(id) {
        Some(Atom::Name(_)) if store.is_variable(id) => Ok(format!("x{}", id)),
        Some(Atom::Name(_)) => Ok(format!("a{}", id)),
        Some(Atom::Exists { role, filler }) => {
            Ok(format!("exists(r{},{})", role, atom_term(store, *filler)?))
        }
        None => Err(UelError::unknown_atom(id)),
    }
}

/// Render the facts of a goal followed by the fixed program
pub fn encode_goal(goal: &Goal, minimize: bool) -> UelResult<String> {
    let store = goal.store();
    let mut out = String::new();

    for (index, axiom) in goal.axioms().iter().enumerate() {
        let predicate = match axiom.connective {
            Connective::Equivalence => "eq",
            Connective::Subsumption => "sub",
            Connective::Disequivalence => "diseq",
            Connective::Dissubsumption => "dissub",
        };
        let _ = writeln!(out, "{}({}).", predicate, index);
        for (side, atoms) in [(1, &axiom.left), (2, &axiom.right)] {
            for &atom in atoms {
                if store.is_top(atom) {
                    continue;
                }
                let _ = writeln!(out, "hasatom({},{},{}).", atom_term(store, atom)?, side, index);
            }
        }
    }

    for &var in store.user_variables() {
        let _ = writeln!(out, "relevant(x{}).", var);
    }
    for &var in store.variables() {
        let _ = writeln!(out, "var(x{}).", var);
    }
    for &constant in store.constants() {
        let _ = writeln!(out, "const(a{}).", constant);
    }
    if let Some(top) = store.top() {
        let _ = writeln!(out, "top(a{}).", top);
    }

    out.push_str(UNIFICATION_PROGRAM);
    if minimize {
        out.push_str(MINIMIZE_PROGRAM);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facts() {
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let rx = store.existential("r", x).unwrap();
        let mut goal = Goal::new("facts", store);
        goal.add_equation([x], [a]).unwrap();
        goal.add_dissubsumption([rx], [a]).unwrap();

        assert_eq!(atom_term(goal.store(), rx).unwrap(), "exists(r0,x2)");

        let program = encode_goal(&goal, false).unwrap();
        assert!(program.contains("eq(0)."));
        assert!(program.contains("hasatom(x2,1,0)."));
        assert!(program.contains("hasatom(a1,2,0)."));
        assert!(program.contains("dissub(1)."));
        assert!(program.contains("hasatom(exists(r0,x2),1,1)."));
        assert!(program.contains("relevant(x2)."));
        assert!(program.contains("const(a1)."));
        assert!(program.contains("top(a0)."));
        assert!(program.contains("#show relsubs/2."));
        assert!(!program.contains("#heuristic"));
        let minimal = encode_goal(&goal, true).unwrap();
        assert!(minimal.ends_with(MINIMIZE_PROGRAM));
        assert!(!minimal.contains("#minimize"));
    }
}
