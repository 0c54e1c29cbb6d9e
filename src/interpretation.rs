//! Partial interpretation: a dense, two-bit-per-atom truth assignment over
//! ground atom addresses (§3: `truth` set and `assigned` set).

use std::collections::HashMap;

use crate::id::Id;

/// A partial two-valued interpretation. `assigned(a)` is true once `a` has
/// been decided either way; `truth(a)` is only meaningful when `assigned(a)`
/// holds.
#[derive(Debug, Clone, Default)]
pub struct Interpretation {
    assigned: HashMap<Id, bool>,
}

impl Interpretation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_assigned(&self, atom: Id) -> bool {
        self.assigned.contains_key(&atom)
    }

    pub fn truth(&self, atom: Id) -> Option<bool> {
        self.assigned.get(&atom).copied()
    }

    pub fn set(&mut self, atom: Id, value: bool) {
        self.assigned.insert(atom, value);
    }

    pub fn unset(&mut self, atom: Id) {
        self.assigned.remove(&atom);
    }

    /// Evaluates a (possibly negated) literal `Id` against the interpretation.
    /// Returns `None` if the underlying atom is not yet assigned.
    pub fn eval_literal(&self, literal: Id) -> Option<bool> {
        let naf = literal.is_naf();
        let atom = if naf { literal.negated() } else { literal };
        self.truth(atom).map(|t| if naf { !t } else { t })
    }

    /// True atoms only, in no particular order -- the shape a plugin's
    /// `Query::interpretation` or a model's output projection needs.
    pub fn true_atoms(&self) -> Vec<Id> {
        self.assigned
            .iter()
            .filter(|&(_, &v)| v)
            .map(|(&a, _)| a)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    pub fn clear(&mut self) {
        self.assigned.clear();
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
    fn naf_literal_flips_truth() {
        let mut interp = Interpretation::new();
        let a = atom(1);
        interp.set(a, true);
        assert_eq!(interp.eval_literal(a), Some(true));
        assert_eq!(interp.eval_literal(a.negated()), Some(false));
    }

    #[test]
    fn unassigned_literal_is_none() {
        let interp = Interpretation::new();
        assert_eq!(interp.eval_literal(atom(1)), None);
    }
}
