//! Inference rules of the rule-based unification algorithm
//!
//! Eager rules are deterministic and applied to a fixpoint before every
//! choice. The two nondeterministic rules enumerate their applications with
//! [`Rule::first_application`] / [`Rule::next_application`]; the search
//! branches over that sequence.

use std::fmt;

use crate::atoms::{AtomId, AtomStore};
use crate::rule::assignment::Assignment;
use crate::rule::subsumption::FlatSubsumption;

/// The closed set of rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    EagerGroundSolving,
    EagerSolving1,
    EagerSolving2,
    EagerConflict,
    EagerExtension,
    Decomposition,
    Extension,
}

/// One way of applying a rule to a subsumption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Application {
    /// The subsumption holds as it is
    Solve,
    /// The subsumption can never hold under the current assignment
    Fail,
    /// Add the head to the subsumers of `var`
    Extend { var: AtomId },
    /// Reduce `∃r.D ⊑ ∃r.C` to `D ⊑ C`, where `atom` is the body atom `∃r.D`
    Decompose { atom: AtomId },
}

/// Effect of applying a rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleResult {
    pub new_subsumptions: Vec<FlatSubsumption>,
    /// `(variable, atom)` pairs to add to the assignment
    pub new_subsumers: Vec<(AtomId, AtomId)>,
    pub successful: bool,
}

impl RuleResult {
    fn success() -> Self {
        Self { successful: true, ..Self::default() }
    }

    fn failure() -> Self {
        Self::default()
    }
}

impl Rule {
    pub const EAGER: [Rule; 5] = [
        Rule::EagerGroundSolving,
        Rule::EagerSolving1,
        Rule::EagerSolving2,
        Rule::EagerConflict,
        Rule::EagerExtension,
    ];

    pub const NONDETERMINISTIC: [Rule; 2] = [Rule::Decomposition, Rule::Extension];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::EagerGroundSolving => "eager ground solving",
            Rule::EagerSolving1 => "eager solving 1",
            Rule::EagerSolving2 => "eager solving 2",
            Rule::EagerConflict => "eager conflict",
            Rule::EagerExtension => "eager extension",
            Rule::Decomposition => "decomposition",
            Rule::Extension => "extension",
        }
    }

    pub fn is_eager(&self) -> bool {
        !matches!(self, Rule::Decomposition | Rule::Extension)
    }

    pub fn first_application(
        &self,
        sub: &FlatSubsumption,
        assignment: &Assignment,
        store: &AtomStore,
    ) -> Option<Application> {
        match self {
            Rule::EagerGroundSolving => {
                if !sub.is_ground(store) {
                    return None;
                }
                Some(if ground_holds(sub, store) {
                    Application::Solve
                } else {
                    Application::Fail
                })
            }
            Rule::EagerSolving1 => sub.body_contains(sub.head()).then_some(Application::Solve),
            Rule::EagerSolving2 => sub
                .body_variables(store)
                .any(|x| assignment.contains(x, sub.head()))
                .then_some(Application::Solve),
            Rule::EagerConflict => {
                let head = sub.head();
                if store.is_variable(head) || sub.body_variables(store).next().is_some() {
                    return None;
                }
                let conflict = if store.is_constant(head) {
                    !store.is_top(head) && !sub.body_contains(head)
                } else {
                    let role = store.role(head);
                    !sub.body().iter().any(|&a| store.role(a) == role)
                };
                conflict.then_some(Application::Fail)
            }
            Rule::EagerExtension => {
                let mut vars = sub.body_variables(store);
                let var = vars.next()?;
                if vars.next().is_some() {
                    return None;
                }
                sub.body()
                    .iter()
                    .all(|&a| a == var || assignment.contains(var, a))
                    .then_some(Application::Extend { var })
            }
            Rule::Decomposition => self.decompositions(sub, store, None).next(),
            Rule::Extension => self.extensions(sub, assignment, store, None).next(),
        }
    }

    /// The application following `previous`; eager rules have only one
    pub fn next_application(
        &self,
        sub: &FlatSubsumption,
        assignment: &Assignment,
        store: &AtomStore,
        previous: &Application,
    ) -> Option<Application> {
        match (self, previous) {
            (Rule::Decomposition, Application::Decompose { atom }) => {
                self.decompositions(sub, store, Some(*atom)).next()
            }
            (Rule::Extension, Application::Extend { var }) => {
                self.extensions(sub, assignment, store, Some(*var)).next()
            }
            _ => None,
        }
    }

    /// All applications in order
    pub fn applications(
        &self,
        sub: &FlatSubsumption,
        assignment: &Assignment,
        store: &AtomStore,
    ) -> Vec<Application> {
        let mut out = Vec::new();
        let mut current = self.first_application(sub, assignment, store);
        while let Some(application) = current {
            current = self.next_application(sub, assignment, store, &application);
            out.push(application);
        }
        out
    }

    pub fn apply(
        &self,
        sub: &FlatSubsumption,
        assignment: &Assignment,
        store: &AtomStore,
        application: &Application,
    ) -> RuleResult {
        match application {
            Application::Solve => RuleResult::success(),
            Application::Fail => RuleResult::failure(),
            Application::Extend { var } => {
                let head = sub.head();
                if assignment.makes_cyclic(*var, head, store) {
                    return RuleResult::failure();
                }
                RuleResult {
                    new_subsumers: vec![(*var, head)],
                    successful: true,
                    ..RuleResult::default()
                }
            }
            Application::Decompose { atom } => {
                match (store.filler(*atom), store.filler(sub.head())) {
                    (Some(d), Some(c)) if store.role(*atom) == store.role(sub.head()) => {
                        RuleResult {
                            new_subsumptions: vec![FlatSubsumption::new([d], c)],
                            successful: true,
                            ..RuleResult::default()
                        }
                    }
                    _ => RuleResult::failure(),
                }
            }
        }
    }

    /// Body atoms `∃r.D` with the role of the head `∃r.C`, after `after`
    fn decompositions<'a>(
        &self,
        sub: &'a FlatSubsumption,
        store: &'a AtomStore,
        after: Option<AtomId>,
    ) -> impl Iterator<Item = Application> + 'a {
        let role = store.role(sub.head());
        sub.body()
            .iter()
            .copied()
            .filter(move |&a| after.map_or(true, |prev| a > prev))
            .filter(move |&a| role.is_some() && store.role(a) == role)
            .map(|atom| Application::Decompose { atom })
    }

    /// Body variables that can take the head without a cycle, after `after`
    fn extensions<'a>(
        &self,
        sub: &'a FlatSubsumption,
        assignment: &'a Assignment,
        store: &'a AtomStore,
        after: Option<AtomId>,
    ) -> impl Iterator<Item = Application> + 'a {
        sub.body_variables(store)
            .filter(move |&x| after.map_or(true, |prev| x > prev))
            .filter(move |&x| !assignment.makes_cyclic(x, sub.head(), store))
            .map(|var| Application::Extend { var })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a ground flat subsumption holds
fn ground_holds(sub: &FlatSubsumption, store: &AtomStore) -> bool {
    let head = sub.head();
    if store.is_top(head) || sub.body_contains(head) {
        return true;
    }
    // ∃r.⊤ is implied by any ∃r.D
    match store.filler(head) {
        Some(filler) if store.is_top(filler) => {
            let role = store.role(head);
            sub.body().iter().any(|&a| store.role(a) == role)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        store: AtomStore,
        a: AtomId,
        b: AtomId,
        x: AtomId,
        y: AtomId,
        ra: AtomId,
        rx: AtomId,
        rtop: AtomId,
        sa: AtomId,
    }

    fn fixture() -> Fixture {
        let mut store = AtomStore::with_top();
        let top = store.top().unwrap();
        let a = store.constant("A").unwrap();
        let b = store.constant("B").unwrap();
        let x = store.user_variable("X").unwrap();
        let y = store.user_variable("Y").unwrap();
        let ra = store.existential("r", a).unwrap();
        let rx = store.existential("r", x).unwrap();
        let rtop = store.existential("r", top).unwrap();
        let sa = store.existential("s", a).unwrap();
        Fixture { store, a, b, x, y, ra, rx, rtop, sa }
    }

    #[test]
    fn test_eager_ground_solving() {
        let f = fixture();
        let assignment = Assignment::new(&f.store);
        let rule = Rule::EagerGroundSolving;

        let holds = FlatSubsumption::new([f.a, f.b], f.a);
        assert_eq!(rule.first_application(&holds, &assignment, &f.store), Some(Application::Solve));

        let fails = FlatSubsumption::new([f.a], f.b);
        assert_eq!(rule.first_application(&fails, &assignment, &f.store), Some(Application::Fail));

        let exists_top = FlatSubsumption::new([f.ra], f.rtop);
        assert_eq!(
            rule.first_application(&exists_top, &assignment, &f.store),
            Some(Application::Solve)
        );

        let not_ground = FlatSubsumption::new([f.x], f.a);
        assert_eq!(rule.first_application(&not_ground, &assignment, &f.store), None);
    }

    #[test]
    fn test_eager_solving() {
        let f = fixture();
        let mut assignment = Assignment::new(&f.store);
        let sub = FlatSubsumption::new([f.x, f.y], f.a);
        assert_eq!(Rule::EagerSolving1.first_application(&sub, &assignment, &f.store), None);
        assert_eq!(Rule::EagerSolving2.first_application(&sub, &assignment, &f.store), None);

        assignment.add(f.y, f.a);
        assert_eq!(
            Rule::EagerSolving2.first_application(&sub, &assignment, &f.store),
            Some(Application::Solve)
        );

        let reflexive = FlatSubsumption::new([f.x, f.rx], f.rx);
        assert_eq!(
            Rule::EagerSolving1.first_application(&reflexive, &assignment, &f.store),
            Some(Application::Solve)
        );
    }

    #[test]
    fn test_eager_conflict() {
        let f = fixture();
        let assignment = Assignment::new(&f.store);
        let rule = Rule::EagerConflict;

        // ∃r.X ⊑ A: no variable on top level, constant head missing
        let constant_head = FlatSubsumption::new([f.rx], f.a);
        assert_eq!(rule.first_application(&constant_head, &assignment, &f.store), Some(Application::Fail));

        // ∃r.X ⊑ ∃s.A: role s missing
        let role_missing = FlatSubsumption::new([f.rx], f.sa);
        assert_eq!(rule.first_application(&role_missing, &assignment, &f.store), Some(Application::Fail));

        let decomposable = FlatSubsumption::new([f.rx], f.ra);
        assert_eq!(rule.first_application(&decomposable, &assignment, &f.store), None);

        let with_variable = FlatSubsumption::new([f.x], f.a);
        assert_eq!(rule.first_application(&with_variable, &assignment, &f.store), None);
    }

    #[test]
    fn test_eager_extension() {
        let f = fixture();
        let mut assignment = Assignment::new(&f.store);
        let rule = Rule::EagerExtension;

        let single = FlatSubsumption::new([f.x], f.a);
        assert_eq!(
            rule.first_application(&single, &assignment, &f.store),
            Some(Application::Extend { var: f.x })
        );

        let with_other = FlatSubsumption::new([f.x, f.b], f.a);
        assert_eq!(rule.first_application(&with_other, &assignment, &f.store), None);
        assignment.add(f.x, f.b);
        assert_eq!(
            rule.first_application(&with_other, &assignment, &f.store),
            Some(Application::Extend { var: f.x })
        );

        let two_vars = FlatSubsumption::new([f.x, f.y], f.a);
        assert_eq!(rule.first_application(&two_vars, &assignment, &f.store), None);

        // X ⊑ ∃r.X is cyclic
        let cyclic = FlatSubsumption::new([f.x], f.rx);
        let application = rule.first_application(&cyclic, &assignment, &f.store).unwrap();
        assert!(!rule.apply(&cyclic, &assignment, &f.store, &application).successful);
    }

    #[test]
    fn test_decomposition_applications() {
        let f = fixture();
        let assignment = Assignment::new(&f.store);
        let sub = FlatSubsumption::new([f.rx, f.ra, f.sa], f.ra);
        let applications = Rule::Decomposition.applications(&sub, &assignment, &f.store);
        assert_eq!(
            applications,
            vec![
                Application::Decompose { atom: f.ra },
                Application::Decompose { atom: f.rx }
            ]
        );

        let result = Rule::Decomposition.apply(&sub, &assignment, &f.store, &applications[1]);
        assert!(result.successful);
        assert_eq!(result.new_subsumptions, vec![FlatSubsumption::new([f.x], f.a)]);
    }

    #[test]
    fn test_extension_skips_cycles() {
        let f = fixture();
        let mut assignment = Assignment::new(&f.store);
        let sub = FlatSubsumption::new([f.x, f.y], f.rx);
        // X itself is excluded, Y remains
        assert_eq!(
            Rule::Extension.applications(&sub, &assignment, &f.store),
            vec![Application::Extend { var: f.y }]
        );

        assignment.add(f.x, f.rtop);
        let plain = FlatSubsumption::new([f.x, f.y], f.a);
        let applications = Rule::Extension.applications(&plain, &assignment, &f.store);
        assert_eq!(applications.len(), 2);
        let result = Rule::Extension.apply(&plain, &assignment, &f.store, &applications[0]);
        assert_eq!(result.new_subsumers, vec![(f.x, f.a)]);
    }
}
