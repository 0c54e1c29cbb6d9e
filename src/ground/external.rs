//! External-atom evaluation and rewriting (C5).
//!
//! Each ground external atom `&g[x̄]ȳ` is rewritten into a pair of guessing
//! rules over two auxiliary predicates, `r_{&g,x̄}(ȳ)` ("guessed true") and
//! `n_{&g,x̄}(ȳ)` ("guessed false"), plus a no-good tying each guess to the
//! plugin's actual answer once it is known. This is the standard dlvhex
//! guess-and-check translation; the CDNL engine (C7) resolves the guess
//! through ordinary unit propagation, and the external propagator (C8)
//! supplies the no-goods that rule out guesses contradicting the plugin.

use crate::error::HexResult;
use crate::id::Id;
use crate::plugin::{Answer, InputTupleCache, NogoodContainer, PluginAtom, Query};
use crate::registry::{ExternalAtomValue, Registry};

/// The two auxiliary atoms standing in for one external atom's truth value
/// at one ground input/output tuple.
#[derive(Debug, Clone, Copy)]
pub struct Guess {
    pub positive: Id,
    pub negative: Id,
}

/// Builds (or reuses) the positive/negative auxiliary guess pair for a ground
/// external atom occurrence.
pub fn auxiliary_guess(registry: &Registry, external_atom: Id, output_tuple: &[Id]) -> Guess {
    let pos_pred = registry.auxiliary_constant('r', external_atom);
    let neg_pred = registry.auxiliary_constant('n', external_atom);
    let pos_name = match registry.get_term(pos_pred) {
        Some(crate::registry::TermValue::Constant(s)) => s,
        _ => unreachable!("auxiliary_constant always mints a Constant term"),
    };
    let neg_name = match registry.get_term(neg_pred) {
        Some(crate::registry::TermValue::Constant(s)) => s,
        _ => unreachable!("auxiliary_constant always mints a Constant term"),
    };
    let positive = registry.store_ordinary_atom(pos_name, output_tuple.to_vec(), true);
    let negative = registry.store_ordinary_atom(neg_name, output_tuple.to_vec(), true);
    registry.register_auxiliary_external(positive, external_atom, true);
    registry.register_auxiliary_external(negative, external_atom, false);
    Guess { positive, negative }
}

/// Evaluates one ground external atom against the current (partial)
/// interpretation and returns the set of output tuples the plugin asserts.
/// `cache` amortizes repeated evaluation across backtracking to an
/// interpretation seen before, keyed by a fingerprint of the atom's input
/// mask projected onto `true_atoms`.
pub fn evaluate_external_atom(
    plugin: &dyn PluginAtom,
    value: &ExternalAtomValue,
    true_atoms: &[Id],
    cache: &mut InputTupleCache,
) -> HexResult<Answer> {
    let query = Query {
        input: value.inputs.clone(),
        interpretation: true_atoms.to_vec(),
    };
    // Eager evaluation has no solver to hand a learned no-good to.
    plugin.retrieve_cached(&query, cache, &mut NogoodContainer::new())
}

/// Checks one guess pair against a plugin's answer: returns a no-good that
/// rules out this combination of guess and answer if they disagree, or
/// `None` if the guess was already consistent.
///
/// `guessed_true` is whether the positive auxiliary is currently assigned
/// true in the interpretation; `answer_contains` is whether the plugin's
/// answer actually contains this output tuple. `input_literals` is the
/// signed projection of the atom's input mask as it stood when the mismatch
/// was observed (`a` for true, `a.negated()` for false) -- without it, the
/// no-good would forbid the guess literal forever, even under an input state
/// that would make it legitimate.
pub fn consistency_nogood(guess: Guess, guessed_true: bool, answer_contains: bool, input_literals: &[Id]) -> Option<Vec<Id>> {
    if guessed_true == answer_contains {
        return None;
    }
    // The guess and the plugin answer disagree: learn a no-good forbidding
    // exactly this (input state, guess-literal) combination from recurring.
    let mut literals = input_literals.to_vec();
    literals.push(if guessed_true { guess.positive } else { guess.negative });
    Some(literals)
}

/// Rewrites a ground program's external atoms into guessing rules, recording
/// each new auxiliary atom's input/output mask on `program`.
pub fn rewrite_external_atoms(
    registry: &Registry,
    program: &mut crate::ground::program::AnnotatedGroundProgram,
    external_occurrences: &[(Id, Vec<Id>)],
) {
    for (external_atom, output_tuple) in external_occurrences {
        let guess = auxiliary_guess(registry, *external_atom, output_tuple);
        program.mark_auxiliary(guess.positive);
        program.mark_auxiliary(guess.negative);

        let mut input_mask = crate::ground::program::AtomMask::new();
        if let Some(value) = registry.get_external_atom(*external_atom) {
            for input in &value.inputs {
                input_mask.set(*input);
            }
        }
        let mut output_mask = crate::ground::program::AtomMask::new();
        output_mask.set(guess.positive);
        output_mask.set(guess.negative);
        program.register_external_atom(*external_atom, input_mask, output_mask);
    }
}

/// A fingerprint-indexed cache for external-atom retrieval calls, avoiding
/// re-evaluating a plugin every time the same input state recurs across
/// backtracking. Consistency no-goods are *not* memoized here: they depend on
/// the input-literal projection observed at derivation time, which varies
/// across calls, so caching them by guess/answer alone would be unsound (see
/// `consistency_nogood`).
#[derive(Default)]
pub struct ExternalEvaluationCache {
    pub tuples: InputTupleCache,
}

impl ExternalEvaluationCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{MainKind, SubKind};

    fn ext_atom(addr: u32) -> Id {
        Id::new(false, MainKind::Atom, SubKind::External, false, addr)
    }

    #[test]
    fn auxiliary_guess_is_stable_for_same_tuple() {
        let registry = Registry::new();
        let a = registry.store_constant("a");
        let ext = ext_atom(0);
        let g1 = auxiliary_guess(&registry, ext, &[a]);
        let g2 = auxiliary_guess(&registry, ext, &[a]);
        assert_eq!(g1.positive, g2.positive);
        assert_eq!(g1.negative, g2.negative);
        assert_ne!(g1.positive, g1.negative);
    }

    #[test]
    fn consistency_nogood_none_when_guess_matches_answer() {
        let registry = Registry::new();
        let a = registry.store_constant("a");
        let ext = ext_atom(1);
        let guess = auxiliary_guess(&registry, ext, &[a]);
        assert!(consistency_nogood(guess, true, true, &[]).is_none());
        assert!(consistency_nogood(guess, false, false, &[]).is_none());
    }

    #[test]
    fn consistency_nogood_some_when_guess_disagrees() {
        let registry = Registry::new();
        let a = registry.store_constant("a");
        let ext = ext_atom(2);
        let guess = auxiliary_guess(&registry, ext, &[a]);
        assert!(consistency_nogood(guess, true, false, &[]).is_some());
        assert!(consistency_nogood(guess, false, true, &[]).is_some());
    }

    #[test]
    fn consistency_nogood_carries_the_observed_input_projection() {
        let registry = Registry::new();
        let a = registry.store_constant("a");
        let in1_a = registry.store_ordinary_atom("in1", vec![a], true);
        let in2_a = registry.store_ordinary_atom("in2", vec![a], true);
        let ext = ext_atom(3);
        let guess = auxiliary_guess(&registry, ext, &[a]);
        let projection = vec![in1_a, in2_a.negated()];
        let learned = consistency_nogood(guess, true, false, &projection).unwrap();
        assert!(learned.contains(&in1_a));
        assert!(learned.contains(&in2_a.negated()));
        assert!(learned.contains(&guess.positive));
    }
}
