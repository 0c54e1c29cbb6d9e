//! Optimization (C10): weak-constraint cost tracking and model comparison.
//!
//! Each weak constraint `:~ body. [weight:level]` contributes `weight` to its
//! level's running cost whenever `body` holds in a model. Models are compared
//! lexicographically, highest level first (dlvhex's convention: level 1 is
//! the coarsest, checked before level 0).

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::id::Id;
use crate::interpretation::Interpretation;
use crate::registry::{Registry, RuleValue};

/// A model's cost vector: level -> accumulated weight. `BTreeMap` keeps
/// levels ordered for lexicographic comparison without a separate sort step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostVector {
    levels: BTreeMap<i64, i64>,
}

impl CostVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, level: i64, weight: i64) {
        *self.levels.entry(level).or_insert(0) += weight;
    }

    pub fn at_level(&self, level: i64) -> i64 {
        self.levels.get(&level).copied().unwrap_or(0)
    }

    /// Lexicographic comparison, highest level first: a vector is "better"
    /// (less) than another if, at the highest level where they differ, its
    /// cost is lower.
    pub fn compare(&self, other: &CostVector) -> Ordering {
        let mut levels: Vec<i64> = self.levels.keys().chain(other.levels.keys()).copied().collect();
        levels.sort_unstable();
        levels.dedup();
        for level in levels.into_iter().rev() {
            let ord = self.at_level(level).cmp(&other.at_level(level));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    pub fn is_better_than(&self, other: &CostVector) -> bool {
        self.compare(other) == Ordering::Less
    }
}

/// Evaluates the cost vector of `candidate` against the weak constraints
/// named by `weak_rules` (each expected to carry a `weight_level` pair whose
/// terms are already-ground integer terms).
pub fn evaluate_cost(registry: &Registry, weak_rules: &[Id], candidate: &Interpretation) -> CostVector {
    let mut cost = CostVector::new();
    for &rule_id in weak_rules {
        let Some(rule) = registry.get_rule(rule_id) else {
            continue;
        };
        let Some((weight_id, level_id)) = rule.weight_level else {
            continue;
        };
        if !body_holds(&rule, candidate) {
            continue;
        }
        let weight = weight_id.int_value().unwrap_or(1) as i64;
        let level = level_id.int_value().unwrap_or(1) as i64;
        cost.add(level, weight);
    }
    cost
}

fn body_holds(rule: &RuleValue, candidate: &Interpretation) -> bool {
    rule.body.iter().all(|&lit| candidate.eval_literal(lit) == Some(true))
}

/// Tracks the optimum seen so far across model enumeration (`set_optimum`)
/// and exposes whether a newly evaluated candidate beats it
/// (`integrate_next_optimum`), matching dlvhex's incremental bounding during
/// `--solver=internal` optimization search.
#[derive(Debug, Default)]
pub struct OptimumTracker {
    best: Option<CostVector>,
}

impl OptimumTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&CostVector> {
        self.best.as_ref()
    }

    pub fn set_optimum(&mut self, cost: CostVector) {
        self.best = Some(cost);
    }

    /// Integrates `candidate` as the new optimum if it strictly improves on
    /// the current one (or if there is no current optimum yet). Returns
    /// `true` if the optimum was updated.
    pub fn integrate_next_optimum(&mut self, candidate: CostVector) -> bool {
        let better = match &self.best {
            None => true,
            Some(current) => candidate.is_better_than(current),
        };
        if better {
            self.best = Some(candidate);
        }
        better
    }
}
