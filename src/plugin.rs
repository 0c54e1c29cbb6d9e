//! Plugin contract (C4): the interface external atoms are evaluated through.
//!
//! A plugin is anything implementing [`PluginAtom`]; the grounder and the
//! external propagator only ever see this trait, never a concrete plugin type.
//! This mirrors the teacher's storage-engine trait boundary (a small sealed
//! contract plus a query/answer struct pair) adapted to dlvhex's retrieve
//! protocol instead of a storage `get`/`scan`.

use std::collections::HashMap;

use crate::error::HexResult;
use crate::id::Id;

/// Declares, per input parameter, how a plugin consumes it. dlvhex
/// distinguishes constant, predicate and tuple inputs because the grounder
/// needs to know which input positions denote *extensions* it must ground
/// against versus plain constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Constant,
    Predicate,
    Tuple,
}

/// Monotonicity of one output argument with respect to one input predicate
/// parameter, used by the FLP checker to decide whether a cycle through this
/// external atom can be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monotonicity {
    Monotonic,
    Antimonotonic,
    Nonmonotonic,
}

/// Declared properties of a plugin atom, consulted by the grounder (to decide
/// whether full guessing is required) and the FLP checker (to decide whether a
/// cheaper unfounded-set check applies).
#[derive(Debug, Clone, Default)]
pub struct PluginProperties {
    /// Per input-predicate-position monotonicity, default nonmonotonic if absent.
    pub monotonicity: HashMap<usize, Monotonicity>,
    /// The output relation is a function of the input (at most one output tuple
    /// per call with a given prefix, per dlvhex's `functional` property).
    pub functional: bool,
    /// The output is finite even when only some input is known (finite fiber).
    pub finite_fiber: bool,
    /// Output relation size is bounded by a computable function of the input.
    pub finite_output: bool,
    /// The extension is well-ordered: earlier output tuples never depend on
    /// later ones, permitting incremental evaluation.
    pub well_ordering: bool,
}

impl PluginProperties {
    pub fn monotonicity_of(&self, input_index: usize) -> Monotonicity {
        self.monotonicity
            .get(&input_index)
            .copied()
            .unwrap_or(Monotonicity::Nonmonotonic)
    }
}

/// A single retrieve request: the grounding-time input tuple plus the subset
/// of the current interpretation visible through the atom's input mask.
#[derive(Debug, Clone)]
pub struct Query {
    pub input: Vec<Id>,
    /// Ground atoms (ordinary, already interned) currently true in the
    /// projection of the interpretation this external atom depends on.
    pub interpretation: Vec<Id>,
}

/// The result of a retrieve call: every output tuple the plugin asserts for
/// this query.
#[derive(Debug, Clone, Default)]
pub struct Answer {
    pub output_tuples: Vec<Vec<Id>>,
}

/// Learned no-goods a plugin hands back alongside its answer (§4.3): each
/// entry is a conjunction of signed literals drawn from the query's input
/// projection (an atom `Id` for "true", its `.negated()` for "false") that
/// justifies the answer just computed. The caller -- the external propagator
/// -- appends the guess literal this justifies before handing the result to
/// the solver, since the plugin itself has no visibility into guess-pair
/// auxiliaries.
#[derive(Debug, Default)]
pub struct NogoodContainer {
    justifications: Vec<Vec<Id>>,
}

impl NogoodContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `literals` justifies the answer: the solver must not hold
    /// every literal in `literals` true while guessing the corresponding
    /// output tuple false.
    pub fn justify(&mut self, literals: Vec<Id>) {
        self.justifications.push(literals);
    }

    pub fn drain(&mut self) -> Vec<Vec<Id>> {
        std::mem::take(&mut self.justifications)
    }

    pub fn is_empty(&self) -> bool {
        self.justifications.is_empty()
    }
}

/// The plugin contract. `name` must match the `&name[...]`  token used in
/// source syntax. Implementors are expected to be cheap to construct and
/// stateless across calls except through the cache dlvhex's `retrieve_cached`
/// provides on top of `retrieve`.
pub trait PluginAtom: Send + Sync {
    fn name(&self) -> &str;
    fn input_types(&self) -> &[InputType];
    fn output_arity(&self) -> usize;
    fn properties(&self) -> &PluginProperties;

    /// Evaluates the atom for one query, with no caching. May additionally
    /// populate `nogoods` with learned no-goods that justify the answer (§4.3).
    fn retrieve(&self, query: &Query, nogoods: &mut NogoodContainer) -> HexResult<Answer>;

    /// Evaluates the atom, consulting/populating `cache` keyed by a
    /// fingerprint of the query's input-mask-restricted true atoms (C5). The
    /// default implementation is correct but uncached; implementors with
    /// expensive `retrieve` bodies may override. `nogoods` is only populated
    /// on a cache miss -- a cache hit means the same input state already
    /// produced whatever justification `retrieve` would derive.
    fn retrieve_cached(&self, query: &Query, cache: &mut InputTupleCache, nogoods: &mut NogoodContainer) -> HexResult<Answer> {
        let key = cache.fingerprint(query);
        if let Some(answer) = cache.get(self.name(), &key) {
            return Ok(answer.clone());
        }
        let answer = self.retrieve(query, nogoods)?;
        cache.insert(self.name(), key, answer.clone());
        Ok(answer)
    }
}

/// Per-external-atom cache of previously computed answers, keyed by a
/// fingerprint of the query (input tuple plus the set of true atoms visible
/// through the input mask). Avoids re-evaluating a plugin when backtracking
/// returns to an interpretation seen before.
#[derive(Default)]
pub struct InputTupleCache {
    entries: HashMap<(String, u64), Answer>,
}

impl InputTupleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stable hash of the input tuple and the sorted true-atom set; two
    /// queries with the same fingerprint are guaranteed to produce the same
    /// answer for a deterministic plugin.
    pub fn fingerprint(&self, query: &Query) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut sorted_interp = query.interpretation.clone();
        sorted_interp.sort();
        let mut hasher = DefaultHasher::new();
        query.input.hash(&mut hasher);
        sorted_interp.hash(&mut hasher);
        hasher.finish()
    }

    fn get(&self, name: &str, key: &u64) -> Option<&Answer> {
        self.entries.get(&(name.to_string(), *key))
    }

    fn insert(&mut self, name: &str, key: u64, answer: Answer) {
        self.entries.insert((name.to_string(), key), answer);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registry of available plugins, looked up by the `&name` token during
/// grounding.
#[derive(Default)]
pub struct PluginTable {
    plugins: HashMap<String, Box<dyn PluginAtom>>,
}

impl PluginTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn PluginAtom>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn get(&self, name: &str) -> Option<&dyn PluginAtom> {
        self.plugins.get(name).map(std::convert::AsRef::as_ref)
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EvenPlugin {
        props: PluginProperties,
    }

    impl EvenPlugin {
        fn new() -> Self {
            EvenPlugin {
                props: PluginProperties {
                    finite_fiber: true,
                    finite_output: true,
                    ..Default::default()
                },
            }
        }
    }

    impl PluginAtom for EvenPlugin {
        fn name(&self) -> &str {
            "testEven"
        }
        fn input_types(&self) -> &[InputType] {
            &[InputType::Predicate]
        }
        fn output_arity(&self) -> usize {
            1
        }
        fn properties(&self) -> &PluginProperties {
            &self.props
        }
        fn retrieve(&self, query: &Query, _nogoods: &mut NogoodContainer) -> HexResult<Answer> {
            Ok(Answer {
                output_tuples: query
                    .interpretation
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| i % 2 == 0)
                    .map(|(_, id)| vec![*id])
                    .collect(),
            })
        }
    }

    #[test]
    fn cache_hits_avoid_second_retrieve() {
        let plugin = EvenPlugin::new();
        let mut cache = InputTupleCache::new();
        let mut nogoods = NogoodContainer::new();
        let query = Query {
            input: vec![],
            interpretation: vec![],
        };
        let first = plugin.retrieve_cached(&query, &mut cache, &mut nogoods).unwrap();
        let second = plugin.retrieve_cached(&query, &mut cache, &mut nogoods).unwrap();
        assert_eq!(first.output_tuples, second.output_tuples);
        assert_eq!(cache.len(), 1);
    }
}
