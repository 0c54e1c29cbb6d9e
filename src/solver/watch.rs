//! Two-watched-literal index over the no-good store.
//!
//! Each no-good watches two of its literals; propagation only re-examines a
//! no-good when one of its watched literals becomes falsified, the classic
//! SAT-solver trick that keeps unit propagation sublinear in the number of
//! learned no-goods.

use std::collections::HashMap;

use crate::id::Id;
use crate::nogood::Nogood;

/// One watched no-good: its two watch positions (indices into its literal
/// list) plus the literals themselves for quick falsification checks.
struct WatchedNogood {
    nogood: Nogood,
    watch_a: usize,
    watch_b: usize,
}

/// Maps each literal to the no-goods currently watching it (by index into the
/// solver's flat no-good list).
#[derive(Default)]
pub struct WatchList {
    entries: Vec<WatchedNogood>,
    watchers: HashMap<Id, Vec<usize>>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a no-good for watching. Single-literal no-goods watch their
    /// only literal twice (propagated immediately rather than re-checked).
    pub fn add(&mut self, nogood: Nogood) {
        let lits = nogood.literals().to_vec();
        if lits.is_empty() {
            return;
        }
        let watch_a = 0;
        let watch_b = if lits.len() > 1 { 1 } else { 0 };
        let idx = self.entries.len();
        self.watchers.entry(lits[watch_a]).or_default().push(idx);
        if watch_b != watch_a {
            self.watchers.entry(lits[watch_b]).or_default().push(idx);
        }
        self.entries.push(WatchedNogood {
            nogood,
            watch_a,
            watch_b,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, idx: usize) -> &Nogood {
        &self.entries[idx].nogood
    }

    /// Returns the indices of no-goods currently watching `literal`.
    pub fn watching(&self, literal: Id) -> Vec<usize> {
        self.watchers.get(&literal).cloned().unwrap_or_default()
    }

    /// Attempts to move the watch on no-good `idx` away from `falsified` to
    /// some other non-falsified literal. `is_false` reports whether a literal
    /// is currently falsified under the solver's assignment. Returns `true`
    /// if a new watch was found (no-good is not yet unit/conflicting on this
    /// watch), `false` if every other literal is falsified (no-good is unit
    /// or conflicting and must be handled by the caller).
    pub fn try_rewatch(&mut self, idx: usize, falsified: Id, is_false: impl Fn(Id) -> bool) -> bool {
        let lits: Vec<Id> = self.entries[idx].nogood.literals().to_vec();
        let (watch_a, watch_b) = (self.entries[idx].watch_a, self.entries[idx].watch_b);
        let other_watch_pos = if lits[watch_a] == falsified { watch_a } else { watch_b };
        for (pos, &lit) in lits.iter().enumerate() {
            if pos == watch_a || pos == watch_b {
                continue;
            }
            if !is_false(lit) {
                let entry = &mut self.entries[idx];
                if other_watch_pos == watch_a {
                    entry.watch_a = pos;
                } else {
                    entry.watch_b = pos;
                }
                self.watchers.entry(falsified).and_modify(|v| v.retain(|&i| i != idx));
                self.watchers.entry(lit).or_default().push(idx);
                return true;
            }
        }
        false
    }
}
