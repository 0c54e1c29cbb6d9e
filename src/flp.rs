//! FLP / unfounded-set checker (C9).
//!
//! A model candidate satisfying all no-goods may still not be an answer set
//! if some of its true atoms are only "supported" by a cycle through
//! themselves (the Faber-Leone-Pfeifer reduct condition). This module builds
//! the reduct for one strongly connected component and searches for an
//! unfounded set; if one exists, it yields a no-good ruling out the candidate
//! rather than accepting it as a model.

use std::collections::HashSet;

use crate::ground::Component;
use crate::id::Id;
use crate::interpretation::Interpretation;
use crate::nogood::Nogood;
use crate::registry::{Registry, RuleValue};

/// One rule of the FLP reduct: the component's rules with every body literal
/// already evaluated against the candidate model, except for the literals
/// whose atoms are in the component itself (those remain symbolic so the
/// unfounded-set search can reason about them).
struct ReductRule {
    head: Vec<Id>,
    remaining_body: Vec<Id>,
}

/// Builds the FLP reduct of `component`'s rules with respect to `candidate`:
/// drops rules whose body is already falsified outside the component, and
/// removes body literals whose atoms lie outside the component (they are
/// fixed by `candidate` and contribute nothing further to the search).
/// Builds the reduct together with the set of outside-the-component literals
/// whose observed falsity is the reason some rule was dropped -- these are
/// exactly the "external support" conditions the resulting nogood must freeze
/// alongside the unfounded atoms themselves (see `unfounded_set_nogood`).
fn build_reduct(registry: &Registry, rules: &[Id], component: &Component, candidate: &Interpretation) -> (Vec<ReductRule>, Vec<Id>) {
    let in_component: HashSet<Id> = component.atoms.iter().copied().collect();
    let mut reduct = Vec::new();
    let mut falsified_support = Vec::new();
    for &rule_id in rules {
        let Some(rule) = registry.get_rule(rule_id) else {
            continue;
        };
        let touches_component = rule.head.iter().any(|h| in_component.contains(h));
        if let Some(lit) = falsifying_literal_outside_component(&rule, &in_component, candidate) {
            if touches_component {
                let atom = if lit.is_naf() { lit.negated() } else { lit };
                if let Some(truth) = candidate.truth(atom) {
                    falsified_support.push(if truth { atom } else { atom.negated() });
                }
            }
            continue;
        }
        let remaining_body: Vec<Id> = rule
            .body
            .iter()
            .copied()
            .filter(|&lit| {
                let atom = if lit.is_naf() { lit.negated() } else { lit };
                in_component.contains(&atom)
            })
            .collect();
        reduct.push(ReductRule {
            head: rule.head,
            remaining_body,
        });
    }
    (reduct, falsified_support)
}

/// Returns the first body literal outside the component whose truth value
/// already falsifies `rule`, or `None` if every outside literal is satisfied.
fn falsifying_literal_outside_component(rule: &RuleValue, in_component: &HashSet<Id>, candidate: &Interpretation) -> Option<Id> {
    for &lit in &rule.body {
        let atom = if lit.is_naf() { lit.negated() } else { lit };
        if in_component.contains(&atom) {
            continue;
        }
        if candidate.eval_literal(lit) == Some(false) {
            return Some(lit);
        }
    }
    None
}

/// An unfounded set together with the external conditions that make it
/// unfounded: the atoms themselves, and the outside-the-component literals
/// whose observed falsity is why no reduct rule currently supports them.
#[derive(Debug, Clone)]
pub struct UnfoundedSet {
    pub atoms: Vec<Id>,
    pub falsified_support: Vec<Id>,
}

/// Searches for an unfounded set among `component`'s atoms that are true in
/// `candidate`: the largest set `U` of true component atoms such that every
/// rule able to derive an atom in `U` either has a falsified body (outside
/// `U`) or has its entire head inside `U`. If `U` is nonempty, `candidate`
/// is not an answer set and the caller must reject it.
///
/// Skips the search entirely (returns `None`, meaning "no unfounded set") for
/// components the SCC classification marked as not needing the FLP check --
/// singleton non-self-looping components are trivially founded, and pure
/// negative cycles are handled by ordinary stratified evaluation.
pub fn find_unfounded_set(
    registry: &Registry,
    rules: &[Id],
    component: &Component,
    candidate: &Interpretation,
) -> Option<UnfoundedSet> {
    if !component.needs_flp_check() {
        return None;
    }
    let (reduct, falsified_support) = build_reduct(registry, rules, component, candidate);
    let mut unfounded: HashSet<Id> = component
        .atoms
        .iter()
        .copied()
        .filter(|&a| candidate.truth(a) == Some(true))
        .collect();
    if unfounded.is_empty() {
        return None;
    }

    // Greatest-unfounded-set fixpoint: repeatedly remove any atom that some
    // reduct rule still supports (a rule whose body is satisfiable outside
    // the current unfounded set and whose head is not entirely unfounded).
    loop {
        let mut supported = HashSet::new();
        for rule in &reduct {
            let body_survives = rule
                .remaining_body
                .iter()
                .all(|&lit| {
                    let atom = if lit.is_naf() { lit.negated() } else { lit };
                    if unfounded.contains(&atom) {
                        lit.is_naf()
                    } else {
                        candidate.eval_literal(lit) != Some(false)
                    }
                });
            if !body_survives {
                continue;
            }
            if rule.head.iter().any(|h| !unfounded.contains(h)) {
                for &h in &rule.head {
                    supported.insert(h);
                }
            }
        }
        let before = unfounded.len();
        unfounded.retain(|a| !supported.contains(a));
        if unfounded.len() == before {
            break;
        }
    }

    if unfounded.is_empty() {
        None
    } else {
        Some(UnfoundedSet {
            atoms: unfounded.into_iter().collect(),
            falsified_support,
        })
    }
}

/// Converts an unfounded set into a no-good that forbids the exact
/// combination of "every atom in the unfounded set is true" together with
/// "the external conditions that left it unsupported" from recurring. Without
/// the latter, the nogood would reject the unfounded atoms unconditionally,
/// even once a genuine external support for them became available.
pub fn unfounded_set_nogood(unfounded: &UnfoundedSet) -> Nogood {
    let mut literals = unfounded.atoms.clone();
    literals.extend(unfounded.falsified_support.iter().copied());
    Nogood::new(literals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(registry: &Registry, name: &str) -> Id {
        registry.store_ordinary_atom(name, vec![], true)
    }

    #[test]
    fn self_supporting_cycle_has_no_external_support_is_unfounded() {
        let registry = Registry::new();
        let a = atom(&registry, "a");
        let b = atom(&registry, "b");
        // a :- b.  b :- a.  (no fact grounds either)
        let r1 = registry.store_rule(RuleValue::plain(vec![a], vec![b]));
        let r2 = registry.store_rule(RuleValue::plain(vec![b], vec![a]));
        let component = Component {
            atoms: vec![a, b],
            is_head_cycle: true,
            is_e_cycle: false,
        };
        let mut candidate = Interpretation::new();
        candidate.set(a, true);
        candidate.set(b, true);
        let unfounded = find_unfounded_set(&registry, &[r1, r2], &component, &candidate);
        assert!(unfounded.is_some());
        let u = unfounded.unwrap();
        assert!(u.atoms.contains(&a) && u.atoms.contains(&b));
        assert!(u.falsified_support.is_empty());
    }

    #[test]
    fn unfounded_nogood_is_conditioned_on_falsified_support() {
        let registry = Registry::new();
        let a = atom(&registry, "a");
        let b = atom(&registry, "b");
        let support = atom(&registry, "support");
        // a :- b.  b :- a, support.  support is false, so the second rule
        // offers no real support for the cycle.
        let r1 = registry.store_rule(RuleValue::plain(vec![a], vec![b]));
        let r2 = registry.store_rule(RuleValue::plain(vec![b], vec![a, support]));
        let component = Component {
            atoms: vec![a, b],
            is_head_cycle: true,
            is_e_cycle: false,
        };
        let mut candidate = Interpretation::new();
        candidate.set(a, true);
        candidate.set(b, true);
        candidate.set(support, false);
        let unfounded = find_unfounded_set(&registry, &[r1, r2], &component, &candidate).unwrap();
        assert!(unfounded.falsified_support.contains(&support.negated()));
        let nogood = unfounded_set_nogood(&unfounded);
        assert!(nogood.literals().contains(&support.negated()));
        assert!(nogood.literals().contains(&a));
        assert!(nogood.literals().contains(&b));
    }

    #[test]
    fn externally_supported_atom_is_not_unfounded() {
        let registry = Registry::new();
        let a = atom(&registry, "a");
        let fact_support = atom(&registry, "support");
        let r1 = registry.store_rule(RuleValue::plain(vec![a], vec![fact_support]));
        let component = Component {
            atoms: vec![a],
            is_head_cycle: true,
            is_e_cycle: false,
        };
        let mut candidate = Interpretation::new();
        candidate.set(a, true);
        candidate.set(fact_support, true);
        let unfounded = find_unfounded_set(&registry, &[r1], &component, &candidate);
        assert!(unfounded.is_none());
    }
}
