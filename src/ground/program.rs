//! Annotated ground program (C3): a grounded HEX program plus the derived
//! structure (masks, dependency graph, components) the solver needs.

use std::collections::{HashMap, HashSet};

use crate::ground::scc::{Component, DependencyGraph, DependencyKind};
use crate::id::Id;
use crate::registry::Registry;

/// A dense bitmask over ground ordinary-atom addresses, used for the EDB/IDB
/// split, per-external-atom input/output masks, and the auxiliary reverse
/// mask.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomMask {
    bits: HashSet<Id>,
}

impl AtomMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, atom: Id) {
        self.bits.insert(atom);
    }

    pub fn unset(&mut self, atom: Id) {
        self.bits.remove(&atom);
    }

    pub fn contains(&self, atom: Id) -> bool {
        self.bits.contains(&atom)
    }

    pub fn iter(&self) -> impl Iterator<Item = Id> + '_ {
        self.bits.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn union_with(&mut self, other: &AtomMask) {
        self.bits.extend(other.bits.iter().copied());
    }
}

/// A single sub-program attached to one dependency-graph component, used so
/// the solver (and the FLP checker) can evaluate a component in isolation.
#[derive(Debug, Clone)]
pub struct SubProgram {
    pub component: Component,
    pub rules: Vec<Id>,
}

/// The fully annotated ground program: facts (EDB), rules (IDB), the overall
/// atom dependency graph and its SCC decomposition, and per-external-atom
/// input/output masks.
#[derive(Default)]
pub struct AnnotatedGroundProgram {
    pub edb: AtomMask,
    pub idb_rules: Vec<Id>,
    pub program_mask: AtomMask,
    /// external atom `Id` -> (input mask, output mask)
    pub external_masks: HashMap<Id, (AtomMask, AtomMask)>,
    pub auxiliary_mask: AtomMask,
    pub dependency_graph: DependencyGraph,
    pub components: Vec<SubProgram>,
}

impl AnnotatedGroundProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a batch of ground rules and facts, extending the dependency graph
    /// and recomputing components. Per dlvhex's incremental-grounding
    /// contract, callers must not merge rules that would create a new cycle
    /// spanning rules added in different calls to `add_program` -- enforced
    /// here by asserting that no newly added edge closes a cycle back into a
    /// component already finalized by a prior call.
    pub fn add_program(&mut self, registry: &Registry, new_rules: Vec<Id>) {
        let previously_componentized: HashSet<Id> = self
            .components
            .iter()
            .flat_map(|sp| sp.component.atoms.iter().copied())
            .collect();

        for &rule_id in &new_rules {
            let Some(rule) = registry.get_rule(rule_id) else {
                continue;
            };
            if rule.head.is_empty() && rule.body.is_empty() {
                continue;
            }
            if rule.body.is_empty() && rule.head.len() == 1 {
                self.edb.set(rule.head[0]);
            }
            for &head_atom in &rule.head {
                self.program_mask.set(head_atom);
                self.dependency_graph.add_node(head_atom);
                for &body_lit in &rule.body {
                    let body_atom = body_lit.negated_if(body_lit.is_naf());
                    self.program_mask.set(body_atom);
                    let kind = if body_lit.is_naf() {
                        DependencyKind::Negative
                    } else {
                        DependencyKind::Positive
                    };
                    self.dependency_graph.add_edge(head_atom, body_atom, kind);
                }
            }
            // A disjunctive rule (`h1 | h2 | ... :- body`) needs its whole
            // head reasoned about jointly by the FLP unfounded-set check --
            // `a v b.` has no body literals at all, so without this the two
            // disjuncts would land in separate singleton components and
            // `{a, b}` would wrongly look minimal. Ring-connect the head
            // atoms with positive edges so Tarjan merges them into one SCC,
            // the same way a real positive cycle would.
            if rule.head.len() > 1 {
                for window in rule.head.windows(2) {
                    self.dependency_graph.add_edge(window[0], window[1], DependencyKind::Positive);
                }
                if let (Some(&first), Some(&last)) = (rule.head.first(), rule.head.last()) {
                    self.dependency_graph.add_edge(last, first, DependencyKind::Positive);
                }
            }

            self.idb_rules.push(rule_id);
        }

        let sccs = crate::ground::scc::compute_sccs(&self.dependency_graph);

        for component in &sccs {
            let atoms: HashSet<Id> = component.atoms.iter().copied().collect();
            let touches_finalized = atoms.intersection(&previously_componentized).next().is_some();
            let is_new_component = !self
                .components
                .iter()
                .any(|sp| sp.component.atoms.iter().collect::<HashSet<_>>() == atoms.iter().collect());
            assert!(
                !(touches_finalized && is_new_component && component.atoms.len() > 1),
                "add_program: new rules introduced a cycle spanning an already-evaluated component"
            );
        }

        self.components = sccs
            .into_iter()
            .map(|component| {
                let rules = self
                    .idb_rules
                    .iter()
                    .filter(|&&r| {
                        registry
                            .get_rule(r)
                            .map(|rv| rv.head.iter().any(|h| component.atoms.contains(h)))
                            .unwrap_or(false)
                    })
                    .copied()
                    .collect();
                SubProgram { component, rules }
            })
            .collect();
    }

    /// Registers an external atom's input/output mask, used by the grounder
    /// (C5) when rewriting the atom into guessing rules.
    pub fn register_external_atom(&mut self, external_atom: Id, input: AtomMask, output: AtomMask) {
        self.external_masks.insert(external_atom, (input, output));
    }

    pub fn auxiliary_reverse_mask(&self) -> &AtomMask {
        &self.auxiliary_mask
    }

    pub fn mark_auxiliary(&mut self, aux_atom: Id) {
        self.auxiliary_mask.set(aux_atom);
    }
}

// small helper kept local: negating only if already negated would be a no-op,
// but callers pass the literal `Id` (which may carry the NAF bit) and want the
// underlying atom identity for masks/graph nodes.
trait NegatedIf {
    fn negated_if(self, naf: bool) -> Self;
}

impl NegatedIf for Id {
    fn negated_if(self, naf: bool) -> Self {
        if naf {
            self.negated()
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Registry, RuleValue};

    #[test]
    fn add_program_splits_facts_into_edb() {
        let registry = Registry::new();
        let atom = registry.store_ordinary_atom("p", vec![], true);
        let rule = registry.store_rule(RuleValue::plain(vec![atom], vec![]));
        let mut program = AnnotatedGroundProgram::new();
        program.add_program(&registry, vec![rule]);
        assert!(program.edb.contains(atom));
    }

    #[test]
    fn add_program_builds_dependency_edges() {
        let registry = Registry::new();
        let p = registry.store_ordinary_atom("p", vec![], true);
        let q = registry.store_ordinary_atom("q", vec![], true);
        let rule = registry.store_rule(RuleValue::plain(vec![p], vec![q]));
        let mut program = AnnotatedGroundProgram::new();
        program.add_program(&registry, vec![rule]);
        assert_eq!(program.components.len(), 2);
    }

    #[test]
    fn acyclic_disjunctive_fact_still_needs_flp_check() {
        let registry = Registry::new();
        let a = registry.store_ordinary_atom("a", vec![], true);
        let b = registry.store_ordinary_atom("b", vec![], true);
        let rule = registry.store_rule(RuleValue::plain(vec![a, b], vec![]));
        let mut program = AnnotatedGroundProgram::new();
        program.add_program(&registry, vec![rule]);
        let component = program
            .components
            .iter()
            .find(|sp| sp.component.atoms.contains(&a))
            .unwrap();
        // both disjuncts must land in the same component, or the unfounded
        // set search below can't reason about the rule as a whole.
        assert!(component.component.atoms.contains(&b));
        assert!(component.component.needs_flp_check());
        assert!(component.rules.contains(&rule));
    }
}
