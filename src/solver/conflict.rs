//! 1-UIP conflict analysis: resolves a conflicting no-good against the
//! antecedents of its current-decision-level literals, walking the trail
//! backwards, until exactly one literal from the current decision level
//! remains. That literal is the "unique implication point"; the resulting
//! no-good is asserting at the backjump level computed alongside it.

use std::collections::HashMap;

use crate::id::Id;
use crate::nogood::Nogood;

/// Per-atom bookkeeping the analysis needs: which decision level it was
/// assigned at, and (if propagated rather than decided) the no-good that
/// forced it.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentInfo {
    pub decision_level: usize,
    pub antecedent: Option<usize>,
}

/// Performs 1-UIP analysis starting from `conflicting`. `trail` lists atoms in
/// assignment order (most recent last); `info` gives each atom's level and
/// antecedent; `watch_nogood` resolves an antecedent index back to its
/// no-good; `current_level` is the decision level the conflict was detected
/// at. Returns the learned no-good and the level to backjump to (the second
/// highest level among the learned literals, or 0 if only one literal
/// remains).
pub fn analyze(
    conflicting: &Nogood,
    trail: &[Id],
    info: &HashMap<Id, AssignmentInfo>,
    watch_nogood: impl Fn(usize) -> Nogood,
    current_level: usize,
) -> (Nogood, usize) {
    let mut learned = conflicting.clone();
    let mut trail_pos = trail.len();

    loop {
        let at_current_level: Vec<Id> = learned
            .literals()
            .iter()
            .copied()
            .filter(|lit| {
                let atom = if lit.is_naf() { lit.negated() } else { *lit };
                info.get(&atom).map(|a| a.decision_level) == Some(current_level)
            })
            .collect();

        if at_current_level.len() <= 1 {
            break;
        }

        // walk the trail backwards to find the most recent atom at the
        // current level that appears (either polarity) in `learned`
        let pivot_atom = loop {
            if trail_pos == 0 {
                break None;
            }
            trail_pos -= 1;
            let atom = trail[trail_pos];
            let level = info.get(&atom).map(|a| a.decision_level);
            if level != Some(current_level) {
                continue;
            }
            let appears = learned.contains(atom) || learned.contains(atom.negated());
            if appears {
                break Some(atom);
            }
        };

        let Some(atom) = pivot_atom else { break };
        let Some(entry) = info.get(&atom) else { break };
        let Some(antecedent_idx) = entry.antecedent else {
            // atom was a decision, not propagated: cannot resolve further on it
            continue;
        };

        let antecedent = watch_nogood(antecedent_idx);
        let pivot_literal = if learned.contains(atom) { atom } else { atom.negated() };
        if let Some(resolvent) = learned.resolve(&antecedent, pivot_literal) {
            learned = resolvent;
        } else if let Some(resolvent) = antecedent.resolve(&learned, pivot_literal.negated()) {
            learned = resolvent;
        } else {
            break;
        }
    }

    let backjump_level = second_highest_level(&learned, info, current_level);
    (learned, backjump_level)
}

fn second_highest_level(
    learned: &Nogood,
    info: &HashMap<Id, AssignmentInfo>,
    current_level: usize,
) -> usize {
    let _ = current_level;
    let mut levels: Vec<usize> = learned
        .literals()
        .iter()
        .filter_map(|lit| {
            let atom = if lit.is_naf() { lit.negated() } else { *lit };
            info.get(&atom).map(|a| a.decision_level)
        })
        .collect();
    levels.sort_unstable();
    levels.dedup();
    if levels.len() <= 1 {
        0
    } else {
        levels[levels.len() - 2]
    }
}
