//! No-good store (C6).
//!
//! A no-good is a set of signed literals ([`Id`]s, where the NAF bit of the
//! packed `Id` doubles as the sign) that must never all hold simultaneously.
//! The solver learns no-goods from conflicts and from the external
//! propagator; the store deduplicates them and evicts the least-used ones
//! under memory pressure.

use std::collections::HashSet;

use crate::id::Id;

/// A signed-literal clause: "not all of these literals can be true together".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nogood {
    literals: Vec<Id>,
}

impl Nogood {
    pub fn new(mut literals: Vec<Id>) -> Self {
        literals.sort();
        literals.dedup();
        Nogood { literals }
    }

    pub fn literals(&self) -> &[Id] {
        &self.literals
    }

    pub fn len(&self) -> usize {
        self.literals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    pub fn contains(&self, lit: Id) -> bool {
        self.literals.binary_search(&lit).is_ok()
    }

    /// Resolves this no-good with `other` on `pivot`: `pivot` must appear
    /// positively in one and negatively in the other. Returns `None` if no
    /// valid pivot relationship exists between the two no-goods.
    #[must_use]
    pub fn resolve(&self, other: &Nogood, pivot: Id) -> Option<Nogood> {
        let negated_pivot = pivot.negated();
        if !self.contains(pivot) || !other.contains(negated_pivot) {
            return None;
        }
        let mut merged: Vec<Id> = self
            .literals
            .iter()
            .copied()
            .filter(|&l| l != pivot)
            .chain(other.literals.iter().copied().filter(|&l| l != negated_pivot))
            .collect();
        merged.sort();
        merged.dedup();
        Some(Nogood::new(merged))
    }

    /// Applies a ground substitution (variable `Id` -> ground `Id`) to every
    /// literal, used when a learned no-good over a non-ground template is
    /// instantiated for a specific grounding.
    #[must_use]
    pub fn apply_substitution(&self, bindings: &std::collections::HashMap<Id, Id>) -> Nogood {
        let literals = self
            .literals
            .iter()
            .map(|&lit| {
                let naf = lit.is_naf();
                let positive = if naf { lit.negated() } else { lit };
                let substituted = bindings.get(&positive).copied().unwrap_or(positive);
                if naf {
                    substituted.negated()
                } else {
                    substituted
                }
            })
            .collect();
        Nogood::new(literals)
    }
}

struct Entry {
    nogood: Nogood,
    add_count: u32,
}

/// Container for the no-goods currently known to the solver. Deduplicates on
/// insert and supports count-based eviction ("remove least frequently
/// added") when the store grows past a soft cap, plus defragmentation to
/// reclaim space from evicted slots.
#[derive(Default)]
pub struct NogoodStore {
    entries: Vec<Option<Entry>>,
    index: HashSet<Nogood>,
    live_count: usize,
}

impl NogoodStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `nogood`, bumping its add-count if it was already present.
    /// Returns `true` if this was a genuinely new no-good.
    pub fn add(&mut self, nogood: Nogood) -> bool {
        if self.index.contains(&nogood) {
            for entry in self.entries.iter_mut().flatten() {
                if entry.nogood == nogood {
                    entry.add_count += 1;
                    break;
                }
            }
            return false;
        }
        self.index.insert(nogood.clone());
        self.entries.push(Some(Entry {
            nogood,
            add_count: 1,
        }));
        self.live_count += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.live_count
    }

    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Nogood> {
        self.entries.iter().flatten().map(|e| &e.nogood)
    }

    /// Evicts the `count` least-frequently-added no-goods. Used under memory
    /// pressure; never evicts below `keep_minimum` entries so unit no-goods
    /// learned early in the search are not thrown away.
    pub fn remove_least_frequently_added(&mut self, count: usize, keep_minimum: usize) {
        if self.live_count <= keep_minimum {
            return;
        }
        let mut removable: Vec<(usize, u32)> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|entry| (i, entry.add_count)))
            .collect();
        removable.sort_by_key(|&(_, count)| count);
        let budget = self.live_count.saturating_sub(keep_minimum).min(count);
        for &(idx, _) in removable.iter().take(budget) {
            if let Some(entry) = self.entries[idx].take() {
                self.index.remove(&entry.nogood);
                self.live_count -= 1;
            }
        }
    }

    /// Compacts storage by dropping `None` slots left behind by eviction.
    pub fn defragment(&mut self) {
        self.entries.retain(Option::is_some);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{MainKind, SubKind};

    fn atom(addr: u32) -> Id {
        Id::new(false, MainKind::Atom, SubKind::OrdinaryGround, false, addr)
    }

    #[test]
    fn resolution_removes_pivot_on_both_sides() {
        let a = atom(1);
        let b = atom(2);
        let c = atom(3);
        let ng1 = Nogood::new(vec![a, b]);
        let ng2 = Nogood::new(vec![a.negated(), c]);
        let resolvent = ng1.resolve(&ng2, a).unwrap();
        assert_eq!(resolvent.literals(), &[b, c]);
    }

    #[test]
    fn duplicate_insert_bumps_add_count_not_len() {
        let mut store = NogoodStore::new();
        let ng = Nogood::new(vec![atom(1), atom(2)]);
        assert!(store.add(ng.clone()));
        assert!(!store.add(ng));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn eviction_respects_keep_minimum() {
        let mut store = NogoodStore::new();
        for i in 0..5 {
            store.add(Nogood::new(vec![atom(i)]));
        }
        store.remove_least_frequently_added(10, 3);
        assert_eq!(store.len(), 3);
    }
}
