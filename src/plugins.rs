//! Bundled demonstration external-atom plugins.
//!
//! dlvhex ships a compiled-in `testplugin` with exactly these atoms for its
//! own regression suite; dynamic `.so` loading is explicitly out of scope
//! here, so the same atoms are registered directly into a [`PluginTable`]
//! instead of being discovered at runtime.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::HexResult;
use crate::id::Id;
use crate::plugin::{Answer, InputType, NogoodContainer, PluginAtom, PluginProperties, PluginTable, Query};
use crate::registry::{Registry, TermValue};

/// `&testEven[S,N]()` -- succeeds iff the combined extension of the two
/// predicate inputs has even cardinality.
#[derive(Default)]
pub struct TestEven {
    props: PluginProperties,
}

impl TestEven {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PluginAtom for TestEven {
    fn name(&self) -> &str {
        "testEven"
    }
    fn input_types(&self) -> &[InputType] {
        &[InputType::Predicate, InputType::Predicate]
    }
    fn output_arity(&self) -> usize {
        0
    }
    fn properties(&self) -> &PluginProperties {
        &self.props
    }
    fn retrieve(&self, query: &Query, _nogoods: &mut NogoodContainer) -> HexResult<Answer> {
        if query.interpretation.len() % 2 == 0 {
            Ok(Answer { output_tuples: vec![vec![]] })
        } else {
            Ok(Answer::default())
        }
    }
}

/// `&testTransitiveClosure[edge](X,Y)` -- transitive closure of a predicate
/// input's extension, decoded through its own `Registry` handle the way a
/// real out-of-process plugin decodes opaque atom ids back into arguments.
pub struct TestTransitiveClosure {
    registry: Arc<Registry>,
    props: PluginProperties,
}

impl TestTransitiveClosure {
    pub fn new(registry: Arc<Registry>) -> Self {
        TestTransitiveClosure {
            registry,
            props: PluginProperties::default(),
        }
    }
}

impl PluginAtom for TestTransitiveClosure {
    fn name(&self) -> &str {
        "testTransitiveClosure"
    }
    fn input_types(&self) -> &[InputType] {
        &[InputType::Predicate]
    }
    fn output_arity(&self) -> usize {
        2
    }
    fn properties(&self) -> &PluginProperties {
        &self.props
    }
    fn retrieve(&self, query: &Query, _nogoods: &mut NogoodContainer) -> HexResult<Answer> {
        let mut direct = Vec::new();
        for &atom in &query.interpretation {
            if let Some(a) = self.registry.get_ordinary_atom(atom) {
                if a.args.len() == 2 {
                    direct.push((a.args[0], a.args[1]));
                }
            }
        }
        let mut closure: HashSet<(Id, Id)> = direct.iter().copied().collect();
        loop {
            let mut added = false;
            for &(a, b) in &direct {
                let extensions: Vec<(Id, Id)> = closure.iter().filter(|&&(x, _)| x == b).map(|&(_, y)| (a, y)).collect();
                for pair in extensions {
                    if closure.insert(pair) {
                        added = true;
                    }
                }
            }
            if !added {
                break;
            }
        }
        Ok(Answer {
            output_tuples: closure.into_iter().map(|(a, b)| vec![a, b]).collect(),
        })
    }
}

/// `&testNonmon[p]` -- true on the empty extension of `p`, false once `p`
/// holds. Exercises the FLP checker's rejection of `p :- &testNonmon[p].`:
/// without it, `{p}` looks self-supporting.
#[derive(Default)]
pub struct TestNonmon {
    props: PluginProperties,
}

impl TestNonmon {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PluginAtom for TestNonmon {
    fn name(&self) -> &str {
        "testNonmon"
    }
    fn input_types(&self) -> &[InputType] {
        &[InputType::Predicate]
    }
    fn output_arity(&self) -> usize {
        0
    }
    fn properties(&self) -> &PluginProperties {
        &self.props
    }
    fn retrieve(&self, query: &Query, _nogoods: &mut NogoodContainer) -> HexResult<Answer> {
        if query.interpretation.is_empty() {
            Ok(Answer { output_tuples: vec![vec![]] })
        } else {
            Ok(Answer::default())
        }
    }
}

/// `&testSetMinus[in1,in2](X)` -- set difference of two predicate inputs'
/// extensions, compared by argument tuple rather than atom identity (the two
/// predicates are distinct, so their atom ids never coincide even when their
/// argument tuples do).
pub struct TestSetMinus {
    registry: Arc<Registry>,
    props: PluginProperties,
}

impl TestSetMinus {
    pub fn new(registry: Arc<Registry>) -> Self {
        TestSetMinus {
            registry,
            props: PluginProperties {
                finite_output: true,
                ..Default::default()
            },
        }
    }
}

impl PluginAtom for TestSetMinus {
    fn name(&self) -> &str {
        "testSetMinus"
    }
    fn input_types(&self) -> &[InputType] {
        &[InputType::Predicate, InputType::Predicate]
    }
    fn output_arity(&self) -> usize {
        1
    }
    fn properties(&self) -> &PluginProperties {
        &self.props
    }
    fn retrieve(&self, query: &Query, nogoods: &mut NogoodContainer) -> HexResult<Answer> {
        // The propagator flattens both predicate inputs' extensions into one
        // `interpretation` list, so atoms have to be resolved back to a
        // predicate by name rather than by which input position produced them.
        let (Some(TermValue::Constant(in1_name)), Some(TermValue::Constant(in2_name))) = (
            query.input.first().and_then(|&id| self.registry.get_term(id)),
            query.input.get(1).and_then(|&id| self.registry.get_term(id)),
        ) else {
            return Ok(Answer::default());
        };
        let mut in1_args: HashMap<Vec<Id>, Id> = HashMap::new();
        let mut in2_args: HashSet<Vec<Id>> = HashSet::new();
        for &atom in &query.interpretation {
            let Some(a) = self.registry.get_ordinary_atom(atom) else {
                continue;
            };
            if a.predicate == in1_name {
                in1_args.insert(a.args, atom);
            } else if a.predicate == in2_name {
                in2_args.insert(a.args);
            }
        }
        let mut output_tuples = Vec::new();
        for (args, &in1_atom) in &in1_args {
            if in2_args.contains(args) {
                continue;
            }
            output_tuples.push(args.clone());
            // in1(args) held true and in2(args) was absent from the
            // interpretation (so it is false); that combination alone
            // justifies this output tuple, regardless of what else holds.
            let in2_atom = self.registry.store_ordinary_atom(&*in2_name, args.clone(), true);
            nogoods.justify(vec![in1_atom, in2_atom.negated()]);
        }
        Ok(Answer { output_tuples })
    }
}

/// Registers every bundled plugin into a fresh table, sharing one `Registry`
/// handle among the plugins that need to decode atom ids back into arguments.
pub fn default_plugins(registry: Arc<Registry>) -> PluginTable {
    let mut table = PluginTable::new();
    table.register(Box::new(TestEven::new()));
    table.register(Box::new(TestTransitiveClosure::new(registry.clone())));
    table.register(Box::new(TestNonmon::new()));
    table.register(Box::new(TestSetMinus::new(registry)));
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_rejects_odd_interpretation() {
        let plugin = TestEven::new();
        let a = Id::new(false, crate::id::MainKind::Atom, crate::id::SubKind::OrdinaryGround, false, 0);
        let query = Query {
            input: vec![],
            interpretation: vec![a],
        };
        let mut nogoods = NogoodContainer::new();
        let answer = plugin.retrieve(&query, &mut nogoods).unwrap();
        assert!(answer.output_tuples.is_empty());
    }

    #[test]
    fn test_nonmon_true_only_on_empty_extension() {
        let plugin = TestNonmon::new();
        let empty = Query {
            input: vec![],
            interpretation: vec![],
        };
        let mut nogoods = NogoodContainer::new();
        assert!(!plugin.retrieve(&empty, &mut nogoods).unwrap().output_tuples.is_empty());

        let a = Id::new(false, crate::id::MainKind::Atom, crate::id::SubKind::OrdinaryGround, false, 0);
        let nonempty = Query {
            input: vec![],
            interpretation: vec![a],
        };
        assert!(plugin.retrieve(&nonempty, &mut nogoods).unwrap().output_tuples.is_empty());
    }

    #[test]
    fn test_set_minus_excludes_shared_args() {
        let registry = Arc::new(Registry::new());
        let a = registry.store_constant("a");
        let b = registry.store_constant("b");
        let in1 = registry.store_constant("in1");
        let in2 = registry.store_constant("in2");
        let in1_a = registry.store_ordinary_atom("in1", vec![a], true);
        let in1_b = registry.store_ordinary_atom("in1", vec![b], true);
        let in2_b = registry.store_ordinary_atom("in2", vec![b], true);

        let plugin = TestSetMinus::new(registry.clone());
        let query = Query {
            input: vec![in1, in2],
            interpretation: vec![in1_a, in1_b, in2_b],
        };
        let mut nogoods = NogoodContainer::new();
        let answer = plugin.retrieve(&query, &mut nogoods).unwrap();
        assert_eq!(answer.output_tuples, vec![vec![a]]);
        // in1(a) held and in2(a) was absent -- that alone justifies out(a).
        let justifications = nogoods.drain();
        assert_eq!(justifications.len(), 1);
        assert!(justifications[0].contains(&in1_a));
        let in2_a = registry.store_ordinary_atom("in2", vec![a], true);
        assert!(justifications[0].contains(&in2_a.negated()));
    }

    #[test]
    fn test_transitive_closure_derives_indirect_pairs() {
        let registry = Arc::new(Registry::new());
        let (n1, n2, n3) = (registry.store_constant("1"), registry.store_constant("2"), registry.store_constant("3"));
        let e12 = registry.store_ordinary_atom("edge", vec![n1, n2], true);
        let e23 = registry.store_ordinary_atom("edge", vec![n2, n3], true);

        let plugin = TestTransitiveClosure::new(registry.clone());
        let query = Query {
            input: vec![registry.store_constant("edge")],
            interpretation: vec![e12, e23],
        };
        let mut nogoods = NogoodContainer::new();
        let answer = plugin.retrieve(&query, &mut nogoods).unwrap();
        assert!(answer.output_tuples.contains(&vec![n1, n3]));
        assert_eq!(answer.output_tuples.len(), 3);
    }
}
