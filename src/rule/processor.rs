//! Backtracking search over rule applications
//!
//! The search state is cloned into every choice point, so backtracking is a
//! pop followed by the next untried option on the restored snapshot.
//!
//! The rules only add atoms that the positive subsumptions force. A complete
//! derivation that still violates a dissubsumption or disequation becomes a
//! refinement point instead: each option adds one more non-variable atom to
//! some `S_X` and the search continues from there.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, trace};

use crate::atoms::{AtomId, AtomStore};
use crate::core::{CancellationToken, SolverStats, UnificationAlgorithm};
use crate::error::{ErrorCode, UelResult};
use crate::goal::{Goal, Unifier};
use crate::rule::assignment::Assignment;
use crate::rule::rules::{Application, Rule, RuleResult};
use crate::rule::subsumption::FlatSubsumption;

/// Flat subsumptions plus the assignment built so far
#[derive(Debug, Clone)]
pub struct SearchState {
    subs: Vec<FlatSubsumption>,
    index: HashSet<(Vec<AtomId>, AtomId)>,
    assignment: Assignment,
}

impl SearchState {
    pub fn new(goal: &Goal) -> Self {
        let store = goal.store();
        let mut state = Self {
            subs: Vec::new(),
            index: HashSet::new(),
            assignment: Assignment::new(store),
        };
        for sub in FlatSubsumption::from_goal(goal) {
            state.add_subsumption(sub, store);
        }
        state
    }

    pub fn subsumptions(&self) -> &[FlatSubsumption] {
        &self.subs
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Index of the first unsolved subsumption
    pub fn first_unsolved(&self) -> Option<usize> {
        self.subs.iter().position(|s| !s.is_solved())
    }

    /// Identity of the state for pruning repeated refinements
    fn fingerprint(&self) -> (Assignment, Vec<((Vec<AtomId>, AtomId), bool)>) {
        let mut subs: Vec<_> = self.subs.iter().map(|s| (s.key(), s.is_solved())).collect();
        subs.sort();
        (self.assignment.clone(), subs)
    }

    /// Add a subsumption unless it is trivial or already known.
    ///
    /// Subsumptions with a variable head are solved on arrival and expanded
    /// over the current subsumers of that variable.
    fn add_subsumption(&mut self, sub: FlatSubsumption, store: &AtomStore) {
        let head = sub.head();
        if store.is_top(head) {
            return;
        }
        let mut sub = if sub.body().iter().any(|&a| store.is_top(a)) {
            FlatSubsumption::new(sub.body().iter().copied().filter(|&a| !store.is_top(a)), head)
        } else {
            sub
        };
        if !self.index.insert(sub.key()) {
            return;
        }
        if !store.is_variable(head) {
            self.subs.push(sub);
            return;
        }
        sub.mark_solved();
        let body = sub.body().to_vec();
        self.subs.push(sub);
        let subsumers: Vec<AtomId> = self
            .assignment
            .subsumers(head)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        for atom in subsumers {
            self.add_subsumption(FlatSubsumption::new(body.iter().copied(), atom), store);
        }
    }

    /// Add `atom` to `S_var` and expand every subsumption with head `var`
    fn add_subsumer(&mut self, var: AtomId, atom: AtomId, store: &AtomStore) {
        if !self.assignment.add(var, atom) {
            return;
        }
        let bodies: Vec<Vec<AtomId>> = self
            .subs
            .iter()
            .filter(|s| s.head() == var)
            .map(|s| s.body().to_vec())
            .collect();
        for body in bodies {
            self.add_subsumption(FlatSubsumption::new(body, atom), store);
        }
    }

    /// Record the result of applying a rule to subsumption `index`
    fn commit(&mut self, index: usize, result: RuleResult, store: &AtomStore) -> bool {
        if !result.successful {
            return false;
        }
        if let Some(sub) = self.subs.get_mut(index) {
            sub.mark_solved();
        }
        for (var, atom) in result.new_subsumers {
            self.add_subsumer(var, atom, store);
        }
        for sub in result.new_subsumptions {
            self.add_subsumption(sub, store);
        }
        true
    }

    /// Apply eager rules until nothing changes; false if one of them failed
    fn saturate(&mut self, store: &AtomStore, stats: &mut SolverStats) -> bool {
        loop {
            let mut changed = false;
            let mut index = 0;
            while index < self.subs.len() {
                if !self.subs[index].is_solved() {
                    let sub = &self.subs[index];
                    let applied = Rule::EAGER.iter().find_map(|rule| {
                        rule.first_application(sub, &self.assignment, store)
                            .map(|app| (*rule, rule.apply(sub, &self.assignment, store, &app)))
                    });
                    if let Some((rule, result)) = applied {
                        stats.rule_applications += 1;
                        trace!(rule = %rule, sub = %self.subs[index].render(store), "eager rule");
                        if !self.commit(index, result, store) {
                            return false;
                        }
                        changed = true;
                    }
                }
                index += 1;
            }
            if !changed {
                return true;
            }
        }
    }
}

/// One option of a choice point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    /// Apply a nondeterministic rule to subsumption `sub`
    Apply { sub: usize, rule: Rule, application: Application },
    /// Add `atom` to `S_var`
    Refine { var: AtomId, atom: AtomId },
}

/// A branching point: the state before the choice and the untried options
#[derive(Debug)]
struct ChoicePoint {
    snapshot: SearchState,
    options: Vec<Choice>,
    next: usize,
}

/// Unification algorithm driven by the rule calculus
pub struct RuleProcessor<'g> {
    goal: &'g Goal,
    cancel: CancellationToken,
    current: Option<SearchState>,
    stack: Vec<ChoicePoint>,
    refined: HashSet<(Assignment, Vec<((Vec<AtomId>, AtomId), bool)>)>,
    initialised: bool,
    exhausted: bool,
    stats: SolverStats,
}

impl<'g> RuleProcessor<'g> {
    pub fn new(goal: &'g Goal, cancel: CancellationToken) -> Self {
        let mut stats = SolverStats::new("rule");
        stats.atoms = goal.store().len();
        stats.variables = goal.store().variables().len();
        Self {
            goal,
            cancel,
            current: None,
            stack: Vec::new(),
            refined: HashSet::new(),
            initialised: false,
            exhausted: false,
            stats,
        }
    }

    fn initialise(&mut self) {
        let goal = self.goal;
        let store = goal.store();
        let mut state = SearchState::new(goal);
        debug!(
            goal = self.goal.id(),
            subsumptions = state.subsumptions().len(),
            "rule engine initialised"
        );
        if state.saturate(store, &mut self.stats) {
            self.current = Some(state);
        }
        self.initialised = true;
    }

    /// Restore the most recent choice point with an untried option
    fn backtrack(&mut self) -> UelResult<Option<SearchState>> {
        let goal = self.goal;
        let store = goal.store();
        while let Some(point) = self.stack.last_mut() {
            self.cancel.check()?;
            let Some(&choice) = point.options.get(point.next) else {
                self.stack.pop();
                self.stats.backtracks += 1;
                continue;
            };
            point.next += 1;
            let mut state = point.snapshot.clone();
            let committed = match choice {
                Choice::Apply { sub, rule, application } => {
                    let result = rule.apply(&state.subs[sub], &state.assignment, store, &application);
                    self.stats.rule_applications += 1;
                    state.commit(sub, result, store)
                }
                Choice::Refine { var, atom } => {
                    state.add_subsumer(var, atom, store);
                    true
                }
            };
            if !committed || !state.saturate(store, &mut self.stats) {
                continue;
            }
            if matches!(choice, Choice::Refine { .. }) && !self.refined.insert(state.fingerprint()) {
                trace!("refinement reached an explored state");
                continue;
            }
            return Ok(Some(state));
        }
        Ok(None)
    }

    fn push(&mut self, snapshot: SearchState, options: Vec<Choice>) {
        self.stats.choice_points += 1;
        self.stack.push(ChoicePoint { snapshot, options, next: 0 });
    }

    fn branch(&mut self, state: SearchState, index: usize) {
        let goal = self.goal;
        let store = goal.store();
        let sub = &state.subs[index];
        let options: Vec<Choice> = Rule::NONDETERMINISTIC
            .iter()
            .flat_map(|&rule| {
                rule.applications(sub, &state.assignment, store)
                    .into_iter()
                    .map(move |application| Choice::Apply { sub: index, rule, application })
            })
            .collect();
        trace!(
            sub = %sub.render(store),
            options = options.len(),
            depth = self.stack.len(),
            "choice point"
        );
        self.push(state, options);
    }

    /// Branch over every atom that can still be added to some variable
    fn refine(&mut self, state: SearchState) {
        let goal = self.goal;
        let store = goal.store();
        let candidates: Vec<AtomId> = store
            .non_variable_atoms()
            .into_iter()
            .filter(|&id| !store.is_top(id))
            .collect();
        let mut options = Vec::new();
        for &var in store.variables() {
            for &atom in &candidates {
                if !state.assignment.contains(var, atom)
                    && !state.assignment.makes_cyclic(var, atom, store)
                {
                    options.push(Choice::Refine { var, atom });
                }
            }
        }
        if options.is_empty() {
            return;
        }
        trace!(options = options.len(), depth = self.stack.len(), "refinement point");
        self.push(state, options);
    }

    fn step(&mut self) -> UelResult<Option<Unifier>> {
        if self.exhausted {
            return Ok(None);
        }
        if !self.initialised {
            self.initialise();
        }
        let goal = self.goal;
        loop {
            self.cancel.check()?;
            let state = match self.current.take() {
                Some(state) => state,
                None => match self.backtrack()? {
                    Some(state) => state,
                    None => {
                        debug!(
                            goal = goal.id(),
                            candidates = self.stats.candidates,
                            backtracks = self.stats.backtracks,
                            "rule search exhausted"
                        );
                        self.exhausted = true;
                        return Ok(None);
                    }
                },
            };

            if let Some(index) = state.first_unsolved() {
                self.branch(state, index);
                continue;
            }

            let unifier = state.assignment.to_unifier(goal.store());
            match unifier.violations(goal) {
                Ok(violated) if violated.is_empty() => {
                    self.stats.candidates += 1;
                    return Ok(Some(unifier));
                }
                Ok(violated) => {
                    debug!(axioms = ?violated, "candidate violates the goal");
                    self.stats.rejected += 1;
                    let axioms = goal.axioms();
                    let only_negative = violated
                        .iter()
                        .all(|&i| axioms.get(i).is_some_and(|a| a.connective.is_negative()));
                    if only_negative {
                        self.refine(state);
                    }
                }
                Err(e) if e.code == ErrorCode::CyclicAssignment => {
                    self.stats.rejected += 1;
                }
                Err(e) => return Err(e.in_goal(goal.id())),
            }
        }
    }
}

impl<'g> UnificationAlgorithm for RuleProcessor<'g> {
    fn name(&self) -> &'static str {
        "rule"
    }

    fn next_candidate(&mut self) -> UelResult<Option<Unifier>> {
        let started = Instant::now();
        let result = self.step();
        self.stats.elapsed += started.elapsed();
        result
    }

    fn stats(&self) -> SolverStats {
        self.stats.clone()
    }

    fn cleanup(&mut self) {
        self.stack.clear();
        self.refined.clear();
        self.current = None;
        self.exhausted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn collect(goal: &Goal) -> Vec<Unifier> {
        let mut processor = RuleProcessor::new(goal, CancellationToken::new());
        let mut out = Vec::new();
        while let Some(u) = processor.next_candidate().unwrap() {
            out.push(u);
        }
        out
    }

    #[test]
    fn test_equation_with_conjunction() {
        // X ≡ A ⊓ B
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let b = store.constant("B").unwrap();
        let x = store.user_variable("X").unwrap();
        let mut goal = Goal::new("conj", store);
        goal.add_equation([x], [a, b]).unwrap();

        let unifiers = collect(&goal);
        assert!(!unifiers.is_empty());
        for u in &unifiers {
            assert_eq!(u.get(x), Some(&BTreeSet::from([a, b])));
        }
    }

    #[test]
    fn test_decomposition_gives_minimal_unifier() {
        // ∃r.X ⊑ ∃r.A
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let rx = store.existential("r", x).unwrap();
        let ra = store.existential("r", a).unwrap();
        let mut goal = Goal::new("exists", store);
        goal.add_subsumption([rx], [ra]).unwrap();

        let unifiers = collect(&goal);
        assert_eq!(unifiers.len(), 1);
        assert_eq!(unifiers[0].get(x), Some(&BTreeSet::from([a])));
    }

    #[test]
    fn test_two_upper_bounds() {
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let b = store.constant("B").unwrap();
        let x = store.user_variable("X").unwrap();
        let mut goal = Goal::new("bounds", store);
        goal.add_subsumption([x], [a]).unwrap();
        goal.add_subsumption([x], [b]).unwrap();

        let unifiers = collect(&goal);
        assert_eq!(unifiers.len(), 1);
        assert_eq!(unifiers[0].get(x), Some(&BTreeSet::from([a, b])));
        assert!(unifiers[0].solves(&goal).unwrap());
    }

    #[test]
    fn test_disequation_of_constant_with_itself() {
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let mut goal = Goal::new("diseq", store);
        goal.add_disequation([a], [a]).unwrap();

        let mut processor = RuleProcessor::new(&goal, CancellationToken::new());
        assert!(processor.next_candidate().unwrap().is_none());
        assert_eq!(processor.stats().rejected, 1);
    }

    #[test]
    fn test_cyclic_equation_has_no_unifier() {
        // X ≡ ∃r.X
        let mut store = AtomStore::with_top();
        let x = store.user_variable("X").unwrap();
        let rx = store.existential("r", x).unwrap();
        let mut goal = Goal::new("cyclic", store);
        goal.add_equation([x], [rx]).unwrap();

        assert!(collect(&goal).is_empty());
    }

    #[test]
    fn test_choice_between_variables() {
        // X ⊓ Y ⊑ A: either variable may take A
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let y = store.user_variable("Y").unwrap();
        let mut goal = Goal::new("choice", store);
        goal.add_subsumption([x, y], [a]).unwrap();

        let mut processor = RuleProcessor::new(&goal, CancellationToken::new());
        let mut found = Vec::new();
        while let Some(u) = processor.next_candidate().unwrap() {
            found.push((u.get(x).cloned().unwrap_or_default(), u.get(y).cloned().unwrap_or_default()));
        }
        assert_eq!(
            found,
            vec![
                (BTreeSet::from([a]), BTreeSet::new()),
                (BTreeSet::new(), BTreeSet::from([a]))
            ]
        );
        let stats = processor.stats();
        assert_eq!(stats.choice_points, 1);
        assert!(stats.backtracks >= 1);
    }

    #[test]
    fn test_dissubsumption_refines_assignment() {
        // A ⋢ X: X needs an atom that A does not have
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let b = store.constant("B").unwrap();
        let x = store.user_variable("X").unwrap();
        let mut goal = Goal::new("refine", store);
        goal.add_dissubsumption([a], [x]).unwrap();

        let mut processor = RuleProcessor::new(&goal, CancellationToken::new());
        let mut found = BTreeSet::new();
        while let Some(u) = processor.next_candidate().unwrap() {
            assert!(u.solves(&goal).unwrap());
            found.insert(u.get(x).cloned().unwrap_or_default());
        }
        assert_eq!(found, BTreeSet::from([BTreeSet::from([b]), BTreeSet::from([a, b])]));
        let stats = processor.stats();
        assert!(stats.rejected >= 2);
        assert!(stats.choice_points >= 2);
    }

    #[test]
    fn test_refinement_keeps_positive_constraints() {
        // X ⊑ A and ∃r.A ⋢ ∃r.X: X must become strictly more specific than A
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let b = store.constant("B").unwrap();
        let x = store.user_variable("X").unwrap();
        let ra = store.existential("r", a).unwrap();
        let rx = store.existential("r", x).unwrap();
        let mut goal = Goal::new("strict", store);
        goal.add_subsumption([x], [a]).unwrap();
        goal.add_dissubsumption([ra], [rx]).unwrap();

        let found = collect(&goal);
        assert!(!found.is_empty());
        for u in &found {
            assert!(u.solves(&goal).unwrap());
            let atoms = u.get(x).unwrap();
            assert!(atoms.contains(&a));
            assert!(atoms.len() >= 2);
        }
        assert!(found.iter().any(|u| u.get(x) == Some(&BTreeSet::from([a, b]))));
        assert!(found.iter().any(|u| u.get(x) == Some(&BTreeSet::from([a, ra]))));
    }

    #[test]
    fn test_cancelled_search() {
        let mut store = AtomStore::with_top();
        let a = store.constant("A").unwrap();
        let x = store.user_variable("X").unwrap();
        let mut goal = Goal::new("cancel", store);
        goal.add_subsumption([x], [a]).unwrap();

        let token = CancellationToken::new();
        let mut processor = RuleProcessor::new(&goal, token.clone());
        token.cancel();
        assert!(processor.next_candidate().unwrap_err().is_cancelled());
    }
}
