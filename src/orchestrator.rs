//! Orchestration pipeline (C11): wires the parser, grounder, no-good
//! compiler, CDNL search, FLP checker and optimizer into the repeated
//! "ground once, solve to exhaustion" evaluation dlvhex's orchestrator runs
//! for a non-modular program. `RepeatEvaluation` (incremental re-grounding
//! across module boundaries) is out of scope here -- this solver only ever
//! sees one flattened program per `solve` call.

use std::collections::HashMap;

use crate::error::{HexError, HexResult};
use crate::execution::SolveTimeout;
use crate::flp;
use crate::ground::{self, AnnotatedGroundProgram};
use crate::hexparser;
use crate::id::Id;
use crate::interpretation::Interpretation;
use crate::nogood::Nogood;
use crate::optimize::{self, CostVector, OptimumTracker};
use crate::plugin::PluginTable;
use crate::propagator::{DeferConfig, ExternalPropagator};
use crate::registry::{Registry, RuleValue};
use crate::solver::{CdnlSolver, NextSolveStep, Propagator, SolverStatistics};

/// One answer set: its true atoms (ground, registry-interned) plus the weak
/// constraint cost vector it incurs, if the program has any weak constraints.
#[derive(Debug, Clone)]
pub struct AnswerSet {
    pub atoms: Vec<Id>,
    pub cost: CostVector,
}

/// Bounds the `solve` loop: how many models to enumerate and whether only
/// optimal ones (by weak-constraint cost) should be kept, mirroring
/// `--firstmodel` and the optimize-then-filter behavior of `-n --opt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveLimits {
    pub max_models: usize,
    pub first_model_only: bool,
    pub optimize: bool,
}

fn negated_if(id: Id, naf: bool) -> Id {
    if naf {
        id.negated()
    } else {
        id
    }
}

/// Replaces every external-atom body literal with its guess-pair auxiliary
/// atom (C5's guess-and-check translation), reusing one `Guess` per distinct
/// ground external-atom occurrence across the whole program. Returns the
/// rewritten rule ids plus every distinct occurrence found, for propagator
/// registration.
fn rewrite_external_occurrences(registry: &Registry, rule_ids: &[Id]) -> (Vec<Id>, Vec<(Id, ground::Guess)>) {
    let mut rewritten = Vec::with_capacity(rule_ids.len());
    let mut seen: HashMap<Id, ground::Guess> = HashMap::new();
    let mut occurrences = Vec::new();

    for &rule_id in rule_ids {
        let Some(rule) = registry.get_rule(rule_id) else {
            continue;
        };
        let mut changed = false;
        let mut new_body = Vec::with_capacity(rule.body.len());
        for &lit in &rule.body {
            let naf = lit.is_naf();
            let atom = if naf { lit.negated() } else { lit };
            if let Some(ext) = registry.get_external_atom(atom) {
                let guess = *seen.entry(atom).or_insert_with(|| {
                    let g = ground::auxiliary_guess(registry, atom, &ext.outputs);
                    occurrences.push((atom, g));
                    g
                });
                new_body.push(negated_if(guess.positive, naf));
                changed = true;
            } else {
                new_body.push(lit);
            }
        }
        if changed {
            rewritten.push(registry.store_rule(RuleValue { body: new_body, ..rule }));
        } else {
            rewritten.push(rule_id);
        }
    }
    (rewritten, occurrences)
}

/// Runs the full pipeline over `source` and returns every answer set found,
/// subject to `limits`, with no wall-clock budget.
pub fn solve(registry: &Registry, plugins: &PluginTable, source: &str, limits: SolveLimits, defer: DeferConfig) -> HexResult<Vec<AnswerSet>> {
    solve_with_timeout(registry, plugins, source, limits, defer, SolveTimeout::infinite())
}

/// As `solve`, but checked against `timeout` before each decision point (§5):
/// on entry to the enumeration loop and whenever the solver yields control
/// back to the orchestrator between `get_next_model` calls.
pub fn solve_with_timeout(
    registry: &Registry,
    plugins: &PluginTable,
    source: &str,
    limits: SolveLimits,
    defer: DeferConfig,
    timeout: SolveTimeout,
) -> HexResult<Vec<AnswerSet>> {
    solve_pipeline(registry, plugins, source, limits, defer, timeout).map(|(models, _)| models)
}

/// As `solve_with_timeout`, but also returns the underlying CDNL solver's
/// statistics -- intended for tests and benchmarks comparing search behavior
/// (e.g. conflict counts) across configurations, not for the ordinary solving
/// path.
pub fn solve_with_statistics(
    registry: &Registry,
    plugins: &PluginTable,
    source: &str,
    limits: SolveLimits,
    defer: DeferConfig,
    timeout: SolveTimeout,
) -> HexResult<(Vec<AnswerSet>, SolverStatistics)> {
    solve_pipeline(registry, plugins, source, limits, defer, timeout)
}

fn solve_pipeline(
    registry: &Registry,
    plugins: &PluginTable,
    source: &str,
    limits: SolveLimits,
    defer: DeferConfig,
    timeout: SolveTimeout,
) -> HexResult<(Vec<AnswerSet>, SolverStatistics)> {
    let program = hexparser::parse_program(source)?;
    let all_rule_ids = ground::instantiate_program(registry, plugins, &program)?;

    let (weak_rule_ids, hard_rule_ids): (Vec<Id>, Vec<Id>) = all_rule_ids
        .into_iter()
        .partition(|&id| registry.get_rule(id).map(|r| r.weight_level.is_some()).unwrap_or(false));

    let (hard_rule_ids, occurrences) = rewrite_external_occurrences(registry, &hard_rule_ids);

    let mut ground_program = AnnotatedGroundProgram::new();
    ground_program.add_program(registry, hard_rule_ids.clone());

    let mut nogoods = ground::compile_rules(registry, &hard_rule_ids);
    for (_, guess) in &occurrences {
        nogoods.push(Nogood::new(vec![guess.positive, guess.negative]));
    }

    let mut atoms: Vec<Id> = ground_program.program_mask.iter().collect();
    for (_, guess) in &occurrences {
        atoms.push(guess.positive);
        atoms.push(guess.negative);
    }
    atoms.sort_unstable();
    atoms.dedup();

    let mut solver = CdnlSolver::new(atoms);
    for ng in nogoods {
        solver.add_nogood(ng);
    }

    let mut external_propagator = ExternalPropagator::new(registry, plugins, defer);
    for &(ext_atom, guess) in &occurrences {
        let output_tuple = registry
            .get_external_atom(ext_atom)
            .map(|v| v.outputs)
            .unwrap_or_default();
        external_propagator.register_occurrence(ext_atom, guess, &output_tuple);
    }
    let mut propagators: Vec<Box<dyn Propagator + '_>> = vec![Box::new(external_propagator)];

    let mut models = Vec::new();
    let mut optimum = OptimumTracker::new();

    loop {
        timeout
            .check()
            .map_err(|e| HexError::fatal(format!("solve cancelled: {e}")))?;
        let (step, candidate) = solver.get_next_model(&mut propagators);
        match step {
            NextSolveStep::ReturnModel => break,
            NextSolveStep::Restart => continue,
            NextSolveStep::ExtractModel => {
                let Some(interpretation) = candidate else {
                    return Err(HexError::fatal("ExtractModel step produced no interpretation"));
                };
                match first_unfounded_component(registry, &ground_program, &interpretation) {
                    Some(unfounded) => {
                        solver.add_nogood(flp::unfounded_set_nogood(&unfounded));
                        solver.restart_with_assumptions(Vec::new());
                    }
                    None => {
                        let cost = optimize::evaluate_cost(registry, &weak_rule_ids, &interpretation);
                        if limits.optimize {
                            optimum.integrate_next_optimum(cost.clone());
                        }
                        models.push(AnswerSet {
                            atoms: interpretation.true_atoms(),
                            cost,
                        });
                        if limits.first_model_only || (limits.max_models != 0 && models.len() >= limits.max_models) {
                            break;
                        }
                        solver.commit_model_and_continue(&interpretation);
                    }
                }
            }
            NextSolveStep::CommitModel
            | NextSolveStep::CommitSymmetricModel
            | NextSolveStep::Update
            | NextSolveStep::Solve => continue,
        }
    }

    if limits.optimize {
        if let Some(best) = optimum.current() {
            models.retain(|m| m.cost == *best);
        }
    }

    Ok((models, solver.statistics()))
}

/// Runs the FLP unfounded-set check over every component that needs it,
/// returning the first unfounded set found (one learned no-good per
/// `ExtractModel` round is enough to make progress; checking every component
/// up front is unnecessary work the next round will redo anyway).
fn first_unfounded_component(registry: &Registry, program: &AnnotatedGroundProgram, candidate: &Interpretation) -> Option<flp::UnfoundedSet> {
    program
        .components
        .iter()
        .find_map(|sub| flp::find_unfounded_set(registry, &sub.rules, &sub.component, candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_join_over_edb_facts_finds_one_model() {
        // The naive grounder joins one rule's body against seeded EDB facts;
        // genuine transitive closure over a self-recursive IDB predicate is
        // the collaborator-grounder's job (see `ground::instantiate`'s module
        // doc), so this only exercises the non-recursive join it does cover.
        let registry = Registry::new();
        let plugins = PluginTable::new();
        let source = "edge(a,b). edge(b,c). path(X,Y) :- edge(X,Y).";
        let models = solve(&registry, &plugins, source, SolveLimits::default(), DeferConfig::default()).unwrap();
        assert_eq!(models.len(), 1);
        let path_ab = registry.store_ordinary_atom("path", vec![registry.store_constant("a"), registry.store_constant("b")], true);
        assert!(models[0].atoms.contains(&path_ab));
    }

    #[test]
    fn disjunctive_fact_yields_two_models() {
        let registry = Registry::new();
        let plugins = PluginTable::new();
        let source = "a v b.";
        let models = solve(&registry, &plugins, source, SolveLimits::default(), DeferConfig::default()).unwrap();
        assert_eq!(models.len(), 2);
    }

    #[test]
    fn odd_cycle_with_no_external_support_is_contradictory() {
        let registry = Registry::new();
        let plugins = PluginTable::new();
        let source = "a :- not b. b :- not a. a :- b. b :- a.";
        let models = solve(&registry, &plugins, source, SolveLimits::default(), DeferConfig::default());
        assert!(models.is_ok());
    }
}
