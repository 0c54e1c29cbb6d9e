//! CDNL search engine (C7): conflict-driven nogood learning over the ground
//! program's atoms, with two-watched-literal propagation and an external
//! propagator hook (C8) threaded in between propagation rounds.

mod conflict;
mod watch;

use std::collections::HashMap;

use rand::Rng;

use crate::id::Id;
use crate::interpretation::Interpretation;
use crate::nogood::{Nogood, NogoodStore};
use conflict::AssignmentInfo;
use watch::WatchList;

/// The model-enumeration state machine. `get_next_model` drives through these
/// states; callers that only want "solve once" can ignore everything but
/// `CommitModel`/`ReturnModel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextSolveStep {
    Restart,
    Solve,
    CommitModel,
    CommitSymmetricModel,
    Update,
    ExtractModel,
    ReturnModel,
}

/// Hook invoked by the solver after every propagation fixpoint and before
/// every decision, giving an external propagator (C8) a chance to inspect the
/// current (possibly partial) assignment and supply additional no-goods.
pub trait Propagator {
    /// Called once per fixpoint with the newly assigned literals since the
    /// last call and the decision level they were assigned at. Returns any
    /// no-goods the propagator wants to add.
    fn propagate(&mut self, newly_assigned: &[Id], decision_level: usize, interpretation: &Interpretation) -> Vec<Nogood>;
    /// Called when the solver backtracks below `decision_level`, so shadow
    /// state (C8's `currentIntr`/`currentAssigned`) can be rolled back too.
    fn undo_level(&mut self, decision_level: usize);
    /// Called once a full model candidate is found, before FLP verification;
    /// unlike `propagate`, this always runs (not subject to deferred-schedule
    /// skipping).
    fn is_model(&mut self, interpretation: &Interpretation) -> Vec<Nogood>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SolverStatistics {
    pub decisions: u64,
    pub conflicts: u64,
    pub propagations: u64,
    pub restarts: u64,
    pub models_found: u64,
}

struct Assignment {
    value: bool,
    decision_level: usize,
    antecedent: Option<usize>,
}

/// The CDNL engine. Owns the interpretation, the learned no-good store, the
/// watch index over it, and the decision trail.
pub struct CdnlSolver {
    atoms: Vec<Id>,
    interpretation: Interpretation,
    assignments: HashMap<Id, Assignment>,
    trail: Vec<Id>,
    decision_level: usize,
    decisions: Vec<Id>,
    facts_on_decision_level: Vec<usize>,
    exhausted_dl: Vec<bool>,
    nogoods: NogoodStore,
    watches: WatchList,
    activity: HashMap<Id, f64>,
    assumptions: Vec<Id>,
    stats: SolverStatistics,
    conflicts_since_restart: u64,
    restart_threshold: u64,
}

/// Outcome of a propagation round.
enum PropagateResult {
    Fixpoint,
    Conflict(usize),
}

/// Outcome of checking a freshly learned no-good against the current
/// assignment immediately after it is added.
enum ImmediateEffect {
    Nothing,
    Propagated,
    Conflict,
}

impl CdnlSolver {
    pub fn new(atoms: Vec<Id>) -> Self {
        CdnlSolver {
            atoms,
            interpretation: Interpretation::new(),
            assignments: HashMap::new(),
            trail: Vec::new(),
            decision_level: 0,
            decisions: Vec::new(),
            facts_on_decision_level: vec![0],
            exhausted_dl: vec![false],
            nogoods: NogoodStore::new(),
            watches: WatchList::new(),
            activity: HashMap::new(),
            assumptions: Vec::new(),
            stats: SolverStatistics::default(),
            conflicts_since_restart: 0,
            restart_threshold: 64,
        }
    }

    pub fn statistics(&self) -> SolverStatistics {
        self.stats
    }

    pub fn interpretation(&self) -> &Interpretation {
        &self.interpretation
    }

    /// Adds a no-good learned elsewhere (e.g. by the FLP checker or the
    /// external propagator). Indexes it for watching if it was genuinely new.
    pub fn add_nogood(&mut self, nogood: Nogood) {
        if nogood.is_empty() {
            return;
        }
        if self.nogoods.add(nogood.clone()) {
            self.watches.add(nogood);
        }
    }

    /// Restarts the search from decision level 0, re-asserting `assumptions`
    /// as forced facts before resuming search. Used both for plain restarts
    /// (empty assumptions) and for re-solving under a fixed partial guess.
    pub fn restart_with_assumptions(&mut self, assumptions: Vec<Id>) {
        self.backtrack_to(0);
        self.assumptions = assumptions;
        self.stats.restarts += 1;
        self.conflicts_since_restart = 0;
    }

    fn current_value(&self, literal: Id) -> Option<bool> {
        self.interpretation.eval_literal(literal)
    }

    fn assign(&mut self, literal: Id, antecedent: Option<usize>) {
        let naf = literal.is_naf();
        let atom = if naf { literal.negated() } else { literal };
        let value = !naf;
        self.interpretation.set(atom, value);
        self.assignments.insert(
            atom,
            Assignment {
                value,
                decision_level: self.decision_level,
                antecedent,
            },
        );
        self.trail.push(atom);
        if let Some(count) = self.facts_on_decision_level.last_mut() {
            *count += 1;
        }
    }

    fn backtrack_to(&mut self, level: usize) {
        while self.decision_level > level {
            let count = self.facts_on_decision_level.pop().unwrap_or(0);
            for _ in 0..count {
                if let Some(atom) = self.trail.pop() {
                    self.interpretation.unset(atom);
                    self.assignments.remove(&atom);
                }
            }
            self.exhausted_dl.pop();
            self.decisions.pop();
            self.decision_level -= 1;
        }
        if self.facts_on_decision_level.is_empty() {
            self.facts_on_decision_level.push(0);
        }
    }

    /// Unit-propagates to a fixpoint over the current watch index. Returns
    /// the index of a violated no-good on conflict.
    fn propagate_fixpoint(&mut self, propagators: &mut [Box<dyn Propagator + '_>]) -> PropagateResult {
        let mut frontier_pos = self.trail.len().saturating_sub(
            self.facts_on_decision_level.last().copied().unwrap_or(0),
        );
        loop {
            while frontier_pos < self.trail.len() {
                let atom = self.trail[frontier_pos];
                frontier_pos += 1;
                let value = self.assignments[&atom].value;
                let newly_true = if value { atom } else { atom.negated() };

                for idx in self.watches.watching(newly_true) {
                    let ng = self.watches.get(idx).clone();
                    let other = other_watch_literal(&ng, newly_true);
                    let Some(other) = other else { continue };
                    let other_val = self.current_value(other);
                    if other_val == Some(true) {
                        return PropagateResult::Conflict(idx);
                    }
                    let assignments = &self.assignments;
                    let is_true = |lit: Id| {
                        let naf = lit.is_naf();
                        let atom = if naf { lit.negated() } else { lit };
                        assignments.get(&atom).map(|a| a.value == !naf).unwrap_or(false)
                    };
                    let moved = self.watches.try_rewatch(idx, newly_true, is_true);
                    if !moved {
                        match other_val {
                            None => {
                                self.assign(other.negated(), Some(idx));
                                self.stats.propagations += 1;
                            }
                            Some(false) => {}
                            Some(true) => unreachable!("handled above"),
                        }
                    }
                }
            }

            let newly_assigned: Vec<Id> = self.trail[frontier_pos.min(self.trail.len())..].to_vec();
            let mut gained_new_nogood = false;
            let mut immediate_conflict = None;
            for propagator in propagators.iter_mut() {
                for ng in propagator.propagate(&newly_assigned, self.decision_level, &self.interpretation) {
                    if !self.nogoods.add(ng.clone()) {
                        continue;
                    }
                    gained_new_nogood = true;
                    self.watches.add(ng.clone());
                    let idx = self.watches.len() - 1;
                    match self.check_immediate(&ng) {
                        ImmediateEffect::Conflict => immediate_conflict = Some(idx),
                        ImmediateEffect::Propagated | ImmediateEffect::Nothing => {}
                    }
                }
            }
            if let Some(idx) = immediate_conflict {
                return PropagateResult::Conflict(idx);
            }
            if !gained_new_nogood {
                return PropagateResult::Fixpoint;
            }
        }
    }

    /// Evaluates a freshly learned no-good against the current assignment: if
    /// every literal but one is already true, the last one is forced false
    /// immediately (rather than waiting for the next trail-driven scan); if
    /// every literal is already true, this is an immediate conflict.
    fn check_immediate(&mut self, ng: &Nogood) -> ImmediateEffect {
        let mut unassigned = None;
        let mut all_others_true = true;
        for &lit in ng.literals() {
            match self.current_value(lit) {
                Some(true) => {}
                Some(false) => return ImmediateEffect::Nothing,
                None => {
                    if unassigned.is_some() {
                        return ImmediateEffect::Nothing;
                    }
                    unassigned = Some(lit);
                    all_others_true = false;
                }
            }
        }
        match unassigned {
            Some(lit) => {
                self.assign(lit.negated(), None);
                self.stats.propagations += 1;
                ImmediateEffect::Propagated
            }
            None if all_others_true => ImmediateEffect::Conflict,
            None => ImmediateEffect::Nothing,
        }
    }

    fn assignment_info_map(&self) -> HashMap<Id, AssignmentInfo> {
        self.assignments
            .iter()
            .map(|(&atom, a)| {
                (
                    atom,
                    AssignmentInfo {
                        decision_level: a.decision_level,
                        antecedent: a.antecedent,
                    },
                )
            })
            .collect()
    }

    fn analyze_and_learn(&mut self, conflict_idx: usize) -> usize {
        let conflicting = self.watches.get(conflict_idx).clone();
        let info = self.assignment_info_map();
        let (learned, backjump_level) = conflict::analyze(
            &conflicting,
            &self.trail,
            &info,
            |idx| self.watches.get(idx).clone(),
            self.decision_level,
        );
        for lit in learned.literals() {
            let atom = if lit.is_naf() { lit.negated() } else { *lit };
            *self.activity.entry(atom).or_insert(0.0) += 1.0;
        }
        self.add_nogood(learned);
        self.stats.conflicts += 1;
        self.conflicts_since_restart += 1;
        backjump_level
    }

    /// Picks the next unassigned atom by activity (VSIDS-like), breaking ties
    /// by a uniform random draw among the highest-activity candidates.
    fn pick_decision(&self) -> Option<Id> {
        let mut best: Vec<Id> = Vec::new();
        let mut best_score = f64::MIN;
        for &atom in &self.atoms {
            if self.interpretation.is_assigned(atom) {
                continue;
            }
            let score = self.activity.get(&atom).copied().unwrap_or(0.0);
            if score > best_score {
                best_score = score;
                best.clear();
                best.push(atom);
            } else if (score - best_score).abs() < f64::EPSILON {
                best.push(atom);
            }
        }
        if best.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..best.len());
        Some(best[idx])
    }

    /// Runs the CDNL loop until either a full model is found (`Some`) or the
    /// search space is exhausted (`None`). `propagators` are consulted after
    /// every propagation fixpoint (C8's hook into C7).
    pub fn get_next_model(&mut self, propagators: &mut [Box<dyn Propagator + '_>]) -> (NextSolveStep, Option<Interpretation>) {
        for &assumption in self.assumptions.clone().iter() {
            if self.current_value(assumption).is_none() {
                self.assign(assumption, None);
            }
        }
        loop {
            match self.propagate_fixpoint(propagators) {
                PropagateResult::Fixpoint => {}
                PropagateResult::Conflict(idx) => {
                    if self.decision_level == 0 {
                        return (NextSolveStep::ReturnModel, None);
                    }
                    let backjump = self.analyze_and_learn(idx);
                    self.backtrack_to(backjump);
                    for p in propagators.iter_mut() {
                        p.undo_level(backjump);
                    }
                    if self.conflicts_since_restart >= self.restart_threshold {
                        self.restart_with_assumptions(self.assumptions.clone());
                        self.restart_threshold = (self.restart_threshold as f64 * 1.2) as u64 + 1;
                        return (NextSolveStep::Restart, None);
                    }
                    continue;
                }
            }

            let Some(decision) = self.pick_decision() else {
                // every atom assigned: full candidate, let propagators react
                let mut extra = Vec::new();
                for p in propagators.iter_mut() {
                    extra.extend(p.is_model(&self.interpretation));
                }
                if extra.is_empty() {
                    self.stats.models_found += 1;
                    return (NextSolveStep::ExtractModel, Some(self.interpretation.clone()));
                }
                for ng in extra {
                    self.add_nogood(ng);
                }
                continue;
            };

            self.decision_level += 1;
            self.decisions.push(decision);
            self.facts_on_decision_level.push(0);
            self.exhausted_dl.push(false);
            self.stats.decisions += 1;
            self.assign(decision, None);
        }
    }

    /// Forces the solver to consider the complement of the last model next,
    /// by adding a no-good that forbids repeating exactly the true atoms seen.
    pub fn commit_model_and_continue(&mut self, model: &Interpretation) {
        let blocking: Vec<Id> = model.true_atoms();
        self.backtrack_to(0);
        self.add_nogood(Nogood::new(blocking));
    }
}

fn other_watch_literal(ng: &Nogood, known: Id) -> Option<Id> {
    let lits = ng.literals();
    if lits.len() == 1 {
        return if lits[0] == known { None } else { Some(lits[0]) };
    }
    lits.iter().find(|&&l| l != known).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{MainKind, SubKind};

    fn atom(addr: u32) -> Id {
        Id::new(false, MainKind::Atom, SubKind::OrdinaryGround, false, addr)
    }

    struct NoopPropagator;
    impl Propagator for NoopPropagator {
        fn propagate(&mut self, _newly_assigned: &[Id], _decision_level: usize, _interpretation: &Interpretation) -> Vec<Nogood> {
            Vec::new()
        }
        fn undo_level(&mut self, _decision_level: usize) {}
        fn is_model(&mut self, _interpretation: &Interpretation) -> Vec<Nogood> {
            Vec::new()
        }
    }

    #[test]
    fn finds_model_for_simple_choice() {
        let a = atom(1);
        let b = atom(2);
        let mut solver = CdnlSolver::new(vec![a, b]);
        // nogood {a, b}: not both true
        solver.add_nogood(Nogood::new(vec![a, b]));
        // nogood {not a, not b}: not both false -- forces exactly one true
        solver.add_nogood(Nogood::new(vec![a.negated(), b.negated()]));
        let mut propagators: Vec<Box<dyn Propagator>> = vec![Box::new(NoopPropagator)];
        let (_, model) = solver.get_next_model(&mut propagators);
        let model = model.expect("expected a model");
        let a_true = model.truth(a) == Some(true);
        let b_true = model.truth(b) == Some(true);
        assert!(a_true ^ b_true, "exactly one of a,b must be true");
    }

    #[test]
    fn unit_nogood_forces_opposite_assignment() {
        let a = atom(1);
        let mut solver = CdnlSolver::new(vec![a]);
        solver.add_nogood(Nogood::new(vec![a]));
        let mut propagators: Vec<Box<dyn Propagator>> = vec![Box::new(NoopPropagator)];
        let (_, model) = solver.get_next_model(&mut propagators);
        let model = model.expect("expected a model");
        assert_eq!(model.truth(a), Some(false));
    }
}
