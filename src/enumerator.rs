//! Unifier enumeration
//!
//! [`UnifierEnumerator`] owns one unification processor for a goal and
//! surfaces its candidates one at a time. Every candidate is replaced by its
//! closure ([`Unifier::closure`]), so equivalent unifiers look the same, and
//! candidates that agree with an earlier one on the user variables are
//! skipped.
//!
//! In minimal mode the processor is drained on the first call and only the
//! most general unifiers are kept: those for which no other candidate is
//! more general on every user variable.

use std::collections::{BTreeSet, HashSet, VecDeque};

use tracing::{debug, info};

use crate::asp::AspProcessor;
use crate::atoms::{AtomId, AtomStore};
use crate::config::{ProcessorKind, SatBackendKind, UelConfig};
use crate::core::{CancellationToken, SolverStats, UnificationAlgorithm};
use crate::el;
use crate::error::{UelError, UelResult};
use crate::goal::{Goal, Unifier};
use crate::rule::RuleProcessor;
use crate::sat::{DpllConfig, ExternalSatBackend, SatProcessor};

/// Lifecycle of an enumerator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumeratorState {
    /// No processor built yet
    Uninitialized,
    /// Processor built; more unifiers may follow
    Ready,
    /// The processor has nothing left (or was cancelled)
    Exhausted,
}

pub struct UnifierEnumerator<'g> {
    goal: &'g Goal,
    config: UelConfig,
    cancel: CancellationToken,
    state: EnumeratorState,
    processor: Option<Box<dyn UnificationAlgorithm + 'g>>,
    current: Option<Unifier>,
    seen: HashSet<Unifier>,
    /// Most general unifiers still to surface (minimal mode)
    pending: Option<VecDeque<Unifier>>,
    surfaced: usize,
    duplicates: usize,
}

impl<'g> UnifierEnumerator<'g> {
    pub fn new(goal: &'g Goal, config: UelConfig) -> Self {
        Self {
            goal,
            config,
            cancel: CancellationToken::new(),
            state: EnumeratorState::Uninitialized,
            processor: None,
            current: None,
            seen: HashSet::new(),
            pending: None,
            surfaced: 0,
            duplicates: 0,
        }
    }

    /// Enumerate with an already constructed processor
    pub fn with_processor(goal: &'g Goal, processor: Box<dyn UnificationAlgorithm + 'g>) -> Self {
        let mut enumerator = Self::new(goal, UelConfig::default());
        enumerator.processor = Some(processor);
        enumerator.state = EnumeratorState::Ready;
        enumerator
    }

    pub fn state(&self) -> EnumeratorState {
        self.state
    }

    pub fn goal(&self) -> &Goal {
        self.goal
    }

    /// Token that cancels this enumeration from another thread
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of candidates skipped as duplicates
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Number of unifiers surfaced so far
    pub fn count(&self) -> usize {
        self.surfaced
    }

    fn build_processor(&self) -> Box<dyn UnificationAlgorithm + 'g> {
        let goal = self.goal;
        let config = &self.config;
        let minimize = config.solver.minimize;
        let cancel = self.cancel.clone();
        match config.solver.processor {
            ProcessorKind::Sat => match config.sat.backend {
                SatBackendKind::Internal => {
                    let dpll = DpllConfig { max_decisions: config.sat.max_decisions };
                    Box::new(SatProcessor::with_dpll(goal, minimize, dpll, cancel))
                }
                SatBackendKind::External => {
                    let backend = ExternalSatBackend::from_config(&config.sat, &config.limits);
                    Box::new(SatProcessor::with_backend(goal, minimize, Box::new(backend), cancel))
                }
            },
            ProcessorKind::Rule => Box::new(RuleProcessor::new(goal, cancel)),
            ProcessorKind::Asp => Box::new(AspProcessor::from_config(
                goal,
                &self.config.asp,
                &self.config.limits,
                minimize,
                cancel,
            )),
        }
    }

    /// Advance to the next unseen unifier.
    ///
    /// Returns `false` once the processor is exhausted, and on every call
    /// after that. Cancellation surfaces as an error with
    /// [`crate::error::ErrorCode::Cancelled`] and exhausts the enumerator.
    pub fn compute_next_unifier(&mut self) -> UelResult<bool> {
        if self.state == EnumeratorState::Uninitialized {
            let processor = self.build_processor();
            debug!(goal = self.goal.id(), processor = processor.name(), "processor built");
            self.processor = Some(processor);
            self.state = EnumeratorState::Ready;
        }
        if self.state == EnumeratorState::Exhausted {
            return Ok(false);
        }

        let next = match self.advance() {
            Ok(next) => next,
            Err(e) => {
                if e.is_cancelled() {
                    info!(goal = self.goal.id(), "enumeration cancelled");
                }
                self.finish();
                return Err(e);
            }
        };
        let Some(unifier) = next else {
            self.finish();
            info!(goal = self.goal.id(), unifiers = self.surfaced, "enumeration finished");
            return Ok(false);
        };
        self.surfaced += 1;
        debug!(
            goal = self.goal.id(),
            index = self.surfaced,
            unifier = %unifier
                .render(self.goal.store(), Some(self.goal.store().user_variables()))
                .replace('\n', "; "),
            "unifier found"
        );
        self.current = Some(unifier);
        Ok(true)
    }

    fn advance(&mut self) -> UelResult<Option<Unifier>> {
        if !self.config.solver.minimize {
            return self.next_fresh();
        }
        if self.pending.is_none() {
            let mut candidates = Vec::new();
            while let Some(unifier) = self.next_fresh()? {
                candidates.push(unifier);
            }
            let total = candidates.len();
            let goal = self.goal;
            let store = goal.store();
            let kept = most_general(candidates, store, store.user_variables())?;
            debug!(goal = self.goal.id(), candidates = total, kept = kept.len(), "most general unifiers");
            self.pending = Some(kept.into());
        }
        Ok(self.pending.as_mut().and_then(VecDeque::pop_front))
    }

    /// Next canonical candidate that differs from all earlier ones
    fn next_fresh(&mut self) -> UelResult<Option<Unifier>> {
        let goal = self.goal;
        let store = goal.store();
        let user_variables = store.user_variables();
        let Some(processor) = self.processor.as_mut() else {
            return Err(UelError::internal("enumerator is ready without a processor"));
        };
        while let Some(candidate) = processor.next_candidate()? {
            let unifier = candidate.closure(store).map_err(|e| e.in_goal(goal.id()))?;
            if self.seen.insert(unifier.projection(user_variables)) {
                return Ok(Some(unifier));
            }
            self.duplicates += 1;
        }
        Ok(None)
    }

    fn finish(&mut self) {
        if let Some(processor) = self.processor.as_mut() {
            processor.cleanup();
        }
        self.pending = Some(VecDeque::new());
        self.current = None;
        self.state = EnumeratorState::Exhausted;
    }

    /// The unifier found by the last successful [`Self::compute_next_unifier`]
    pub fn unifier(&self) -> UelResult<&Unifier> {
        match (&self.current, self.state) {
            (Some(unifier), EnumeratorState::Ready) => Ok(unifier),
            (_, EnumeratorState::Exhausted) => Err(UelError::illegal_state(
                "no unifier available: the enumeration is exhausted",
            )),
            _ => Err(UelError::illegal_state(
                "no unifier available: call compute_next_unifier first",
            )),
        }
    }

    /// Drain the remaining unifiers (at most `limit` if given)
    pub fn collect_remaining(&mut self, limit: Option<usize>) -> UelResult<Vec<Unifier>> {
        let mut out = Vec::new();
        while limit.map_or(true, |l| out.len() < l) && self.compute_next_unifier()? {
            out.push(self.unifier()?.clone());
        }
        Ok(out)
    }

    /// Processor statistics (empty before the first call)
    pub fn stats(&self) -> SolverStats {
        self.processor
            .as_ref()
            .map(|p| p.stats())
            .unwrap_or_else(|| SolverStats::new(self.config.solver.processor.as_str()))
    }
}

/// Drop every unifier that another one generalises on `vars`.
///
/// `u` generalises `v` if `σ_v(X) ⊑ σ_u(X)` for every `X` in `vars`. Of two
/// equivalent unifiers the earlier one is kept.
fn most_general(
    unifiers: Vec<Unifier>,
    store: &AtomStore,
    vars: &BTreeSet<AtomId>,
) -> UelResult<Vec<Unifier>> {
    let grounded = unifiers
        .iter()
        .map(|u| u.ground_variables(store, vars))
        .collect::<UelResult<Vec<_>>>()?;
    let generalises = |i: usize, j: usize| {
        grounded[i]
            .iter()
            .zip(&grounded[j])
            .all(|(general, specific)| el::subsumes(specific, general))
    };
    let dominated = |j: usize| {
        (0..grounded.len())
            .filter(|&i| i != j)
            .any(|i| generalises(i, j) && (i < j || !generalises(j, i)))
    };
    let keep: Vec<bool> = (0..grounded.len()).map(|j| !dominated(j)).collect();
    Ok(unifiers
        .into_iter()
        .zip(keep)
        .filter_map(|(u, keep)| keep.then_some(u))
        .collect())
}
