//! Minimal grounder.
//!
//! Full non-ground-to-ground instantiation (magic sets, unification over
//! recursive joins, safety-driven domain restriction) is explicitly a
//! collaborator's job, not this solver's. What the orchestrator's
//! `RewriteEDBIDB` step needs from *this* module is narrower: enough
//! instantiation to turn the handful of join/evaluation shapes the scenarios
//! actually exercise into ground rules the rest of the pipeline already knows
//! how to handle --
//!
//! - naive nested-loop joins of a rule's positive ordinary body literals
//!   against already-known facts (`sel(X) v nsel(X) :- p(X).` against
//!   `p(1..3)`);
//! - eager evaluation of an external atom whose every input is, once the
//!   join above has bound it, a fully ground, EDB-only predicate
//!   (`tc(X,Y) :- &testTransitiveClosure[edge](X,Y).`).
//!
//! An external atom whose input depends on an IDB predicate (`&testEven`
//! over the very atoms its own rule disjunction guesses) is left in the
//! ground body untouched, for [`crate::ground::external`]'s guess-and-check
//! rewriting to handle at solve time -- that, not grounding, is where its
//! truth is actually decided.

use std::collections::{HashMap, HashSet};

use crate::ast;
use crate::error::{HexError, HexResult};
use crate::id::Id;
use crate::plugin::{InputType, PluginAtom, PluginTable, Query};
use crate::registry::{ExternalAtomValue, Registry, RuleValue, TermValue};

type Binding = HashMap<String, Id>;

/// Ground fact tuples collected while instantiating, keyed by predicate --
/// doubles as the join source for positive ordinary literals and as the
/// `interpretation` an eagerly evaluated external atom is queried against.
#[derive(Default)]
struct FactBase {
    by_predicate: HashMap<String, Vec<Vec<Id>>>,
}

impl FactBase {
    fn insert(&mut self, predicate: String, args: Vec<Id>) {
        self.by_predicate.entry(predicate).or_default().push(args);
    }

    fn tuples(&self, predicate: &str) -> &[Vec<Id>] {
        self.by_predicate.get(predicate).map(Vec::as_slice).unwrap_or(&[])
    }

    fn atoms(&self, registry: &Registry, predicate: &str) -> Vec<Id> {
        self.tuples(predicate)
            .iter()
            .map(|args| registry.store_ordinary_atom(predicate, args.clone(), true))
            .collect()
    }
}

/// Instantiates `program` against `plugins`, returning the ground rule
/// `Id`s (facts and grounded IDB rules) ready for
/// [`crate::ground::program::AnnotatedGroundProgram::add_program`].
pub fn instantiate_program(registry: &Registry, plugins: &PluginTable, program: &ast::Program) -> HexResult<Vec<Id>> {
    let mut facts = FactBase::default();
    let mut ground_rule_ids = Vec::new();

    for rule in &program.rules {
        if is_singleton_fact(rule) {
            let head = &rule.head[0];
            if !head.args.iter().all(ast::Term::is_ground) {
                return Err(HexError::safety(head.predicate.clone(), "fact head contains an unbound variable"));
            }
            let args: Vec<Id> = head.args.iter().map(|t| intern_ground_term(registry, t)).collect();
            facts.insert(head.predicate.clone(), args.clone());
            let head_id = registry.store_ordinary_atom(head.predicate.clone(), args, true);
            ground_rule_ids.push(registry.store_rule(RuleValue::plain(vec![head_id], vec![])));
        }
    }

    let idb_predicates: HashSet<&str> = program
        .rules
        .iter()
        .filter(|r| !is_singleton_fact(r))
        .flat_map(|r| r.head.iter().map(|h| h.predicate.as_str()))
        .collect();

    for rule in &program.rules {
        if is_singleton_fact(rule) {
            continue;
        }
        instantiate_rule(registry, plugins, &facts, &idb_predicates, rule, &mut ground_rule_ids)?;
    }

    Ok(ground_rule_ids)
}

/// A non-disjunctive fact (`p(1,2).`) can seed the join source directly. A
/// disjunctive fact (`a v b.`) cannot -- each disjunct is only conditionally
/// true, so it is instantiated like any other rule instead.
fn is_singleton_fact(rule: &ast::Rule) -> bool {
    rule.is_fact() && rule.head.len() == 1
}

fn intern_ground_term(registry: &Registry, term: &ast::Term) -> Id {
    match term {
        ast::Term::Constant(s) => registry.store_constant(s.clone()),
        ast::Term::QuotedString(s) => registry.store_constant(format!("\"{s}\"")),
        ast::Term::Integer(n) => Id::int_term(*n),
        ast::Term::Variable(_) => unreachable!("ground term contains a variable"),
        ast::Term::Nested { functor, args } => {
            let arg_ids: Vec<Id> = args.iter().map(|a| intern_ground_term(registry, a)).collect();
            registry.store_nested_term(functor.clone(), arg_ids)
        }
    }
}

/// Interns `term` under `binding`, returning `None` if it contains a
/// variable not yet bound.
fn intern_term(registry: &Registry, term: &ast::Term, binding: &Binding) -> Option<Id> {
    match term {
        ast::Term::Constant(s) => Some(registry.store_constant(s.clone())),
        ast::Term::QuotedString(s) => Some(registry.store_constant(format!("\"{s}\""))),
        ast::Term::Integer(n) => Some(Id::int_term(*n)),
        ast::Term::Variable(name) => binding.get(name).copied(),
        ast::Term::Nested { functor, args } => {
            let arg_ids: Vec<Id> = args.iter().map(|a| intern_term(registry, a, binding)).collect::<Option<_>>()?;
            Some(registry.store_nested_term(functor.clone(), arg_ids))
        }
    }
}

fn unify_term(registry: &Registry, pattern: &ast::Term, value: Id, binding: &mut Binding) -> bool {
    match pattern {
        ast::Term::Variable(name) => {
            if name == "_" {
                return true;
            }
            match binding.get(name) {
                Some(&bound) => bound == value,
                None => {
                    binding.insert(name.clone(), value);
                    true
                }
            }
        }
        ast::Term::Nested { functor, args } => match registry.get_term(value) {
            Some(TermValue::Nested { functor: f, args: vargs }) if &f == functor && vargs.len() == args.len() => {
                args.iter().zip(vargs.iter()).all(|(p, &v)| unify_term(registry, p, v, binding))
            }
            _ => false,
        },
        _ => intern_ground_term(registry, pattern) == value,
    }
}

/// Recursively joins the positive ordinary body literals that still carry a
/// free variable against `facts`, producing one binding per matching tuple
/// combination.
fn join_positive_literals(
    registry: &Registry,
    facts: &FactBase,
    literals: &[&ast::OrdinaryAtom],
    idx: usize,
    binding: Binding,
    out: &mut Vec<Binding>,
) {
    if idx == literals.len() {
        out.push(binding);
        return;
    }
    let atom = literals[idx];
    for tuple in facts.tuples(&atom.predicate) {
        if tuple.len() != atom.args.len() {
            continue;
        }
        let mut next = binding.clone();
        let matches = atom.args.iter().zip(tuple.iter()).all(|(p, &v)| unify_term(registry, p, v, &mut next));
        if matches {
            join_positive_literals(registry, facts, literals, idx + 1, next, out);
        }
    }
}

fn instantiate_rule(
    registry: &Registry,
    plugins: &PluginTable,
    facts: &FactBase,
    idb_predicates: &HashSet<&str>,
    rule: &ast::Rule,
    out: &mut Vec<Id>,
) -> HexResult<()> {
    // only literals with a free variable drive the join; already-ground
    // positive literals (including disjunctive-head predicates like the `a`
    // in `:~ a. [1:1]`) are just carried through to the emitted body.
    let joinable: Vec<&ast::OrdinaryAtom> = rule
        .body
        .iter()
        .filter_map(|lit| match lit {
            ast::Literal::Ordinary(a) if !a.naf && a.args.iter().any(|t| !t.is_ground()) => Some(a),
            _ => None,
        })
        .collect();

    let mut bindings = Vec::new();
    join_positive_literals(registry, facts, &joinable, 0, Binding::new(), &mut bindings);
    if joinable.is_empty() {
        bindings.push(Binding::new());
    }

    for binding in bindings {
        resolve_external_atoms(registry, plugins, facts, idb_predicates, rule, binding, out)?;
    }
    Ok(())
}

/// All of an external atom's output terms are either a non-variable or an
/// already-bound variable -- nothing left for this atom to contribute.
fn outputs_bound(outputs: &[ast::Term], binding: &Binding) -> bool {
    outputs.iter().all(|t| match t {
        ast::Term::Variable(name) => binding.contains_key(name),
        _ => true,
    })
}

/// An external atom is eager-eligible when every input is, under `binding`,
/// fully ground, and every predicate-typed input names a predicate this
/// program never derives (so its extension is already fully known).
fn inputs_are_edb_only(
    registry: &Registry,
    plugin: &dyn PluginAtom,
    ext: &ast::ExternalAtom,
    idb_predicates: &HashSet<&str>,
    binding: &Binding,
) -> bool {
    let types = plugin.input_types();
    for (i, input) in ext.inputs.iter().enumerate() {
        let Some(id) = intern_term(registry, input, binding) else {
            return false;
        };
        if types.get(i).copied() == Some(InputType::Predicate) {
            match registry.get_term(id) {
                Some(TermValue::Constant(name)) if !idb_predicates.contains(name.as_str()) => {}
                _ => return false,
            }
        }
    }
    true
}

fn build_eager_query(
    registry: &Registry,
    facts: &FactBase,
    plugin: &dyn PluginAtom,
    ext: &ast::ExternalAtom,
    binding: &Binding,
) -> HexResult<Query> {
    let types = plugin.input_types();
    let mut input = Vec::with_capacity(ext.inputs.len());
    let mut interpretation = Vec::new();
    for (i, term) in ext.inputs.iter().enumerate() {
        let id = intern_term(registry, term, binding).ok_or_else(|| HexError::safety(ext.name.clone(), "external atom input not ground"))?;
        input.push(id);
        if types.get(i).copied() == Some(InputType::Predicate) {
            if let Some(TermValue::Constant(name)) = registry.get_term(id) {
                interpretation.extend(facts.atoms(registry, &name));
            }
        }
    }
    Ok(Query { input, interpretation })
}

fn bind_outputs(outputs: &[ast::Term], tuple: &[Id], binding: &mut Binding) -> bool {
    if outputs.len() != tuple.len() {
        return false;
    }
    for (term, &value) in outputs.iter().zip(tuple.iter()) {
        if let ast::Term::Variable(name) = term {
            if name == "_" {
                continue;
            }
            match binding.get(name) {
                Some(&bound) if bound != value => return false,
                _ => {
                    binding.insert(name.clone(), value);
                }
            }
        }
    }
    true
}

/// Walks the rule body looking for the next non-NAF external atom whose
/// inputs are eager-eligible and whose outputs are not yet fully bound,
/// evaluates it, and recurses once per output tuple it returns. Once no such
/// atom remains, emits one ground rule per surviving binding.
fn resolve_external_atoms(
    registry: &Registry,
    plugins: &PluginTable,
    facts: &FactBase,
    idb_predicates: &HashSet<&str>,
    rule: &ast::Rule,
    binding: Binding,
    out: &mut Vec<Id>,
) -> HexResult<()> {
    for lit in &rule.body {
        let ast::Literal::External(ext) = lit else { continue };
        if ext.naf || outputs_bound(&ext.outputs, &binding) {
            continue;
        }
        let Some(plugin) = plugins.get(&ext.name) else {
            continue; // not eager-eligible without a registered plugin; left for guess-and-check
        };
        if !inputs_are_edb_only(registry, plugin, ext, idb_predicates, &binding) {
            continue;
        }
        let query = build_eager_query(registry, facts, plugin, ext, &binding)?;
        // Eager grounding has no solver to hand learned no-goods to -- any
        // justification the plugin derives here is simply discarded.
        let answer = plugin.retrieve(&query, &mut crate::plugin::NogoodContainer::new())?;
        for tuple in &answer.output_tuples {
            let mut next = binding.clone();
            if bind_outputs(&ext.outputs, tuple, &mut next) {
                resolve_external_atoms(registry, plugins, facts, idb_predicates, rule, next, out)?;
            }
        }
        return Ok(());
    }

    if !builtins_hold(registry, rule, &binding) {
        return Ok(());
    }
    emit_ground_rule(registry, plugins, idb_predicates, rule, &binding, out)
}

fn eval_builtin_op(op: &str, args: &[Id]) -> Option<bool> {
    if args.len() != 2 {
        return None;
    }
    let (a, b) = (args[0].int_value()?, args[1].int_value()?);
    Some(match op {
        "=" | "==" => a == b,
        "!=" | "<>" => a != b,
        "<" => a < b,
        "<=" => a <= b,
        ">" => a > b,
        ">=" => a >= b,
        _ => return None,
    })
}

/// Built-ins (comparisons) are decided once ground, at grounding time, not
/// left for the solver -- unlike ordinary and external literals, their truth
/// never depends on the model.
fn builtins_hold(registry: &Registry, rule: &ast::Rule, binding: &Binding) -> bool {
    for lit in &rule.body {
        if let ast::Literal::Builtin(b) = lit {
            let Some(values) = b.args.iter().map(|t| intern_term(registry, t, binding)).collect::<Option<Vec<Id>>>() else {
                continue; // not yet ground: leave to a later binding (shouldn't occur once joins settle)
            };
            let holds = eval_builtin_op(&b.op, &values).unwrap_or(true);
            if holds == b.naf {
                return false;
            }
        }
    }
    true
}

fn ground_literal(
    registry: &Registry,
    plugins: &PluginTable,
    idb_predicates: &HashSet<&str>,
    lit: &ast::Literal,
    binding: &Binding,
) -> HexResult<Option<Id>> {
    match lit {
        ast::Literal::Ordinary(a) => {
            let args = a
                .args
                .iter()
                .map(|t| intern_term(registry, t, binding))
                .collect::<Option<Vec<Id>>>()
                .ok_or_else(|| HexError::safety(a.predicate.clone(), "unbound variable in body literal"))?;
            let atom = registry.store_ordinary_atom(a.predicate.clone(), args, true);
            Ok(Some(if a.naf { atom.negated() } else { atom }))
        }
        ast::Literal::Builtin(_) => Ok(None), // decided at grounding time, never reaches the solver
        ast::Literal::External(e) => {
            let eager = !e.naf
                && plugins
                    .get(&e.name)
                    .map(|p| inputs_are_edb_only(registry, p, e, idb_predicates, binding))
                    .unwrap_or(false);
            if eager {
                // already evaluated to true for this binding by resolve_external_atoms
                return Ok(None);
            }
            let inputs = e
                .inputs
                .iter()
                .map(|t| intern_term(registry, t, binding))
                .collect::<Option<Vec<Id>>>()
                .ok_or_else(|| HexError::safety(e.name.clone(), "unbound variable in external atom input"))?;
            let outputs = e
                .outputs
                .iter()
                .map(|t| intern_term(registry, t, binding))
                .collect::<Option<Vec<Id>>>()
                .ok_or_else(|| HexError::safety(e.name.clone(), "unbound variable in external atom output"))?;
            let atom = registry.store_external_atom(ExternalAtomValue {
                plugin_name: e.name.clone(),
                inputs,
                outputs,
            });
            Ok(Some(if e.naf { atom.negated() } else { atom }))
        }
        ast::Literal::Aggregate(_) => Err(HexError::fatal("aggregate atoms are not supported by the instantiator")),
    }
}

fn emit_ground_rule(
    registry: &Registry,
    plugins: &PluginTable,
    idb_predicates: &HashSet<&str>,
    rule: &ast::Rule,
    binding: &Binding,
    out: &mut Vec<Id>,
) -> HexResult<()> {
    let head = rule
        .head
        .iter()
        .map(|h| {
            let args = h
                .args
                .iter()
                .map(|t| intern_term(registry, t, binding))
                .collect::<Option<Vec<Id>>>()
                .ok_or_else(|| HexError::safety(h.predicate.clone(), "unbound variable in rule head"))?;
            Ok(registry.store_ordinary_atom(h.predicate.clone(), args, true))
        })
        .collect::<HexResult<Vec<Id>>>()?;

    let body = rule
        .body
        .iter()
        .map(|lit| ground_literal(registry, plugins, idb_predicates, lit, binding))
        .collect::<HexResult<Vec<Option<Id>>>>()?
        .into_iter()
        .flatten()
        .collect();

    let weight_level = match &rule.weight_level {
        Some((w, l)) => {
            let w_id = intern_term(registry, w, binding).ok_or_else(|| HexError::safety("weak constraint", "unbound variable in weight term"))?;
            let l_id = intern_term(registry, l, binding).ok_or_else(|| HexError::safety("weak constraint", "unbound variable in level term"))?;
            Some((w_id, l_id))
        }
        None => None,
    };

    out.push(registry.store_rule(RuleValue {
        head,
        body,
        weight_level,
        bound: None,
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::hexparser::parse_program;
    use crate::plugin::{Answer, PluginProperties};

    /// Computes the transitive closure of whatever edge pairs its single
    /// predicate input's extension holds, grounded in the source's own
    /// `&testTransitiveClosure[edge](X,Y)` example. Holds its own `Registry`
    /// handle, as a real plugin would, to decode the ordinary-atom ids it is
    /// handed back into argument tuples.
    struct EagerTransitiveClosure {
        registry: Arc<Registry>,
        props: PluginProperties,
    }

    impl EagerTransitiveClosure {
        fn new(registry: Arc<Registry>) -> Self {
            EagerTransitiveClosure {
                registry,
                props: PluginProperties::default(),
            }
        }
    }

    impl PluginAtom for EagerTransitiveClosure {
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
        fn retrieve(&self, query: &Query, _nogoods: &mut crate::plugin::NogoodContainer) -> HexResult<Answer> {
            let mut direct = Vec::new();
            for &atom in &query.interpretation {
                if let Some(a) = self.registry.get_ordinary_atom(atom) {
                    if a.args.len() == 2 {
                        direct.push((a.args[0], a.args[1]));
                    }
                }
            }
            let mut closure: std::collections::HashSet<(Id, Id)> = direct.iter().copied().collect();
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

    #[test]
    fn transitive_closure_joins_edb_facts_and_evaluates_eagerly() {
        let registry = Arc::new(Registry::new());
        let mut plugins = PluginTable::new();
        plugins.register(Box::new(EagerTransitiveClosure::new(registry.clone())));
        let program = parse_program("edge(1,2). edge(2,3). tc(X,Y) :- &testTransitiveClosure[edge](X,Y).").unwrap();

        let rule_ids = instantiate_program(&registry, &plugins, &program).unwrap();

        let tc_atoms: Vec<_> = rule_ids
            .iter()
            .filter_map(|&r| registry.get_rule(r))
            .filter(|rv| rv.body.is_empty())
            .flat_map(|rv| rv.head)
            .filter_map(|h| registry.get_ordinary_atom(h))
            .filter(|a| a.predicate == "tc")
            .collect();
        assert_eq!(tc_atoms.len(), 3);
    }

    #[test]
    fn disjunctive_fact_is_instantiated_without_an_edb_join() {
        let registry = Registry::new();
        let plugins = PluginTable::new();
        let program = parse_program("a v b.").unwrap();
        let rule_ids = instantiate_program(&registry, &plugins, &program).unwrap();
        assert_eq!(rule_ids.len(), 1);
        let rule = registry.get_rule(rule_ids[0]).unwrap();
        assert_eq!(rule.head.len(), 2);
        assert!(rule.body.is_empty());
    }

    #[test]
    fn weak_constraint_preserves_weight_and_level() {
        let registry = Registry::new();
        let plugins = PluginTable::new();
        let program = parse_program("a v b. :~ a. [1:1]").unwrap();
        let rule_ids = instantiate_program(&registry, &plugins, &program).unwrap();
        let weak = rule_ids.iter().find_map(|&r| registry.get_rule(r).filter(|rv| rv.weight_level.is_some())).unwrap();
        assert!(weak.head.is_empty());
        assert_eq!(weak.body.len(), 1);
    }

    #[test]
    fn non_eager_external_atom_over_idb_input_stays_in_the_body() {
        let registry = Registry::new();
        let plugins = PluginTable::new();
        let program = parse_program("p(1). p(2). sel(X) v nsel(X) :- p(X). :- not &testEven[sel,nsel]().").unwrap();
        let rule_ids = instantiate_program(&registry, &plugins, &program).unwrap();
        let constraint = rule_ids
            .iter()
            .find_map(|&r| registry.get_rule(r).filter(|rv| rv.head.is_empty() && rv.weight_level.is_none()))
            .unwrap();
        assert_eq!(constraint.body.len(), 1);
        assert!(constraint.body[0].is_naf());
        assert!(registry.get_external_atom(constraint.body[0]).is_some());
    }
}
