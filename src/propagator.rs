//! External propagator (C8): the bridge between the CDNL engine's partial
//! assignment and the plugins. Maintains a shadow view of the interpretation
//! restricted to each external atom's input mask, and only re-evaluates a
//! plugin once enough input atoms have changed (deferred-propagation
//! scheduling), rather than on every single literal assignment.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::HexResult;
use crate::ground::{consistency_nogood, ExternalEvaluationCache, Guess};
use crate::id::Id;
use crate::interpretation::Interpretation;
use crate::nogood::Nogood;
use crate::plugin::{InputType, NogoodContainer, PluginAtom, PluginTable, Query};
use crate::registry::{ExternalAtomValue, Registry};
use crate::solver::Propagator as PropagatorTrait;

/// Knobs controlling how eagerly the propagator re-evaluates plugins, named
/// after dlvhex's `--claspdefer-ms`/`--claspdefer-n` options.
#[derive(Debug, Clone, Copy)]
pub struct DeferConfig {
    /// Minimum wall-clock time that must elapse between two evaluations of
    /// the same external atom.
    pub min_elapsed: Duration,
    /// Minimum number of propagation opportunities (fixpoint rounds) to skip
    /// before re-evaluating, even if `min_elapsed` has passed.
    pub min_skipped: u32,
}

impl Default for DeferConfig {
    fn default() -> Self {
        DeferConfig {
            min_elapsed: Duration::from_millis(0),
            min_skipped: 0,
        }
    }
}

struct ExternalOccurrence {
    atom_id: Id,
    value: ExternalAtomValue,
    guess: Guess,
    input_mask: Vec<Id>,
    last_evaluated_true_count: Option<usize>,
    last_evaluated_at: Option<Instant>,
    skipped_since_eval: u32,
}

/// Shadow assignment the propagator tracks independently of the solver's own
/// interpretation, so it can tell exactly which input atoms changed since the
/// last evaluation and roll back cleanly on `undo_level`.
#[derive(Default)]
struct ShadowState {
    current_intr: HashMap<Id, bool>,
    /// per-decision-level snapshot of which atoms were newly shadowed, so
    /// `undo_level` can roll back precisely.
    changes_by_level: Vec<Vec<Id>>,
}

/// The external propagator. Evaluates every registered external atom's
/// occurrence against the shadow interpretation and emits consistency
/// no-goods (C5) when a guess disagrees with the plugin's answer.
pub struct ExternalPropagator<'a> {
    registry: &'a Registry,
    plugins: &'a PluginTable,
    occurrences: Vec<ExternalOccurrence>,
    shadow: ShadowState,
    cache: ExternalEvaluationCache,
    defer: DeferConfig,
    current_level: usize,
}

impl<'a> ExternalPropagator<'a> {
    pub fn new(registry: &'a Registry, plugins: &'a PluginTable, defer: DeferConfig) -> Self {
        ExternalPropagator {
            registry,
            plugins,
            occurrences: Vec::new(),
            shadow: ShadowState::default(),
            cache: ExternalEvaluationCache::new(),
            defer,
            current_level: 0,
        }
    }

    pub fn register_occurrence(&mut self, atom_id: Id, guess: Guess, output_tuple: &[Id]) {
        let Some(value) = self.registry.get_external_atom(atom_id) else {
            return;
        };
        let _ = output_tuple;
        let input_mask = self.expand_input_mask(&value);
        self.occurrences.push(ExternalOccurrence {
            atom_id,
            value,
            guess,
            input_mask,
            last_evaluated_true_count: None,
            last_evaluated_at: None,
            skipped_since_eval: 0,
        });
    }

    /// A predicate-typed input names a predicate, not an atom -- expand it
    /// into every ground atom interned so far over that predicate, mirroring
    /// the eager grounder's `FactBase::atoms`. Constant/tuple inputs pass
    /// through unchanged.
    fn expand_input_mask(&self, value: &ExternalAtomValue) -> Vec<Id> {
        let types = self.plugins.get(&value.plugin_name).map(PluginAtom::input_types);
        let mut mask = Vec::with_capacity(value.inputs.len());
        for (i, &input_id) in value.inputs.iter().enumerate() {
            let is_predicate = types.map(|t| t.get(i).copied() == Some(InputType::Predicate)).unwrap_or(false);
            if is_predicate {
                if let Some(crate::registry::TermValue::Constant(name)) = self.registry.get_term(input_id) {
                    mask.extend(self.registry.atoms_with_predicate(&name));
                    continue;
                }
            }
            mask.push(input_id);
        }
        mask
    }

    fn should_evaluate(&self, occ: &ExternalOccurrence, true_count_now: usize) -> bool {
        let Some(last_count) = occ.last_evaluated_true_count else {
            return true;
        };
        if last_count == true_count_now {
            return false;
        }
        let elapsed_ok = occ
            .last_evaluated_at
            .map(|t| t.elapsed() >= self.defer.min_elapsed)
            .unwrap_or(true);
        let skipped_ok = occ.skipped_since_eval >= self.defer.min_skipped;
        elapsed_ok && skipped_ok
    }

    fn evaluate_occurrence(&mut self, idx: usize, interpretation: &Interpretation) -> HexResult<Vec<Nogood>> {
        let true_in_mask: Vec<Id> = self.occurrences[idx]
            .input_mask
            .iter()
            .copied()
            .filter(|&a| interpretation.truth(a) == Some(true))
            .collect();
        let true_count_now = true_in_mask.len();

        if !self.should_evaluate(&self.occurrences[idx], true_count_now) {
            self.occurrences[idx].skipped_since_eval += 1;
            return Ok(Vec::new());
        }

        // The signed projection of the input mask as observed right now --
        // carried into the consistency no-good so it only forbids this guess
        // under this specific input state, not globally (§8 scenario 6).
        let signed_projection: Vec<Id> = self.occurrences[idx]
            .input_mask
            .iter()
            .filter_map(|&a| match interpretation.truth(a) {
                Some(true) => Some(a),
                Some(false) => Some(a.negated()),
                None => None,
            })
            .collect();

        let plugin_name = extract_plugin_name(&self.occurrences[idx].value);
        let Some(plugin) = self.plugins.get(&plugin_name) else {
            return Ok(Vec::new());
        };
        let query = Query {
            input: self.occurrences[idx].value.inputs.clone(),
            interpretation: true_in_mask,
        };
        let mut justifications = NogoodContainer::new();
        let answer = plugin.retrieve_cached(&query, &mut self.cache.tuples, &mut justifications)?;

        let guess = self.occurrences[idx].guess;
        let guessed_true = interpretation.truth(guess.positive) == Some(true);
        let answer_contains = !answer.output_tuples.is_empty();
        let mut nogoods = Vec::new();
        if let Some(lits) = consistency_nogood(guess, guessed_true, answer_contains, &signed_projection) {
            nogoods.push(Nogood::new(lits));
        }
        for mut literals in justifications.drain() {
            // The plugin only knows the input-side literals; the guess
            // literal this justifies (output false) is ours to append.
            literals.push(guess.negative);
            nogoods.push(Nogood::new(literals));
        }

        self.occurrences[idx].last_evaluated_true_count = Some(true_count_now);
        self.occurrences[idx].last_evaluated_at = Some(Instant::now());
        self.occurrences[idx].skipped_since_eval = 0;
        Ok(nogoods)
    }
}

fn extract_plugin_name(value: &ExternalAtomValue) -> String {
    value.plugin_name.clone()
}

impl<'a> PropagatorTrait for ExternalPropagator<'a> {
    fn propagate(&mut self, newly_assigned: &[Id], decision_level: usize, interpretation: &Interpretation) -> Vec<Nogood> {
        if newly_assigned.is_empty() {
            return Vec::new();
        }
        self.current_level = decision_level;
        for &atom in newly_assigned {
            if let Some(truth) = interpretation.truth(atom) {
                self.shadow.current_intr.insert(atom, truth);
            }
        }
        if self.shadow.changes_by_level.len() <= self.current_level {
            self.shadow
                .changes_by_level
                .resize(self.current_level + 1, Vec::new());
        }
        self.shadow.changes_by_level[self.current_level].extend_from_slice(newly_assigned);

        let mut out = Vec::new();
        for idx in 0..self.occurrences.len() {
            match self.evaluate_occurrence(idx, interpretation) {
                Ok(ngs) => out.extend(ngs),
                Err(_) => continue,
            }
        }
        out
    }

    fn undo_level(&mut self, decision_level: usize) {
        while self.shadow.changes_by_level.len() > decision_level + 1 {
            if let Some(atoms) = self.shadow.changes_by_level.pop() {
                for atom in atoms {
                    self.shadow.current_intr.remove(&atom);
                }
            }
        }
        self.current_level = decision_level;
    }

    fn is_model(&mut self, interpretation: &Interpretation) -> Vec<Nogood> {
        let mut out = Vec::new();
        for idx in 0..self.occurrences.len() {
            // model verification always evaluates, bypassing the deferred
            // schedule: correctness at model-candidate time is non-negotiable.
            self.occurrences[idx].last_evaluated_true_count = None;
            if let Ok(ngs) = self.evaluate_occurrence(idx, interpretation) {
                out.extend(ngs);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ground::auxiliary_guess;
    use crate::id::{MainKind, SubKind};
    use crate::plugin::{Answer, InputType, PluginProperties};

    struct AlwaysTrue {
        props: PluginProperties,
    }

    impl PluginAtom for AlwaysTrue {
        fn name(&self) -> &str {
            "alwaysTrue"
        }
        fn input_types(&self) -> &[InputType] {
            &[]
        }
        fn output_arity(&self) -> usize {
            0
        }
        fn properties(&self) -> &PluginProperties {
            &self.props
        }
        fn retrieve(&self, _query: &Query, _nogoods: &mut NogoodContainer) -> HexResult<Answer> {
            Ok(Answer {
                output_tuples: vec![vec![]],
            })
        }
    }

    #[test]
    fn disagreeing_guess_produces_nogood() {
        let registry = Registry::new();
        let mut plugins = PluginTable::new();
        plugins.register(Box::new(AlwaysTrue {
            props: PluginProperties::default(),
        }));
        let ext_atom = Id::new(false, MainKind::Atom, SubKind::External, false, 0);
        registry.store_external_atom(crate::registry::ExternalAtomValue {
            plugin_name: "alwaysTrue".to_string(),
            inputs: vec![],
            outputs: vec![],
        });
        let guess = auxiliary_guess(&registry, ext_atom, &[]);

        let mut propagator = ExternalPropagator::new(&registry, &plugins, DeferConfig::default());
        propagator.register_occurrence(ext_atom, guess, &[]);

        let mut interp = Interpretation::new();
        interp.set(guess.positive, false);
        interp.set(guess.negative, true);

        let nogoods = propagator.propagate(&[guess.negative], 0, &interp);
        assert!(!nogoods.is_empty(), "guessing false against an always-true plugin should conflict");
    }
}
