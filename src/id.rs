//! Packed 64-bit identifiers (C1).
//!
//! An [`Id`] is a `kind: u32` / `address: u32` pair. `kind` packs the NAF flag,
//! the main kind, the sub-kind, the auxiliary flag and a handful of
//! domain-specific property bits; `address` indexes the table the main/sub kind
//! select. Addresses are stable for the lifetime of a [`crate::registry::Registry`].

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Top-level kind of an interned object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MainKind {
    Atom = 0,
    Term = 1,
    Literal = 2,
    Rule = 3,
}

/// Sub-kind, interpreted relative to `MainKind`.
///
/// Atom sub-kinds: OrdinaryGround, OrdinaryNonground, BuiltIn, Aggregate,
/// External, Module. Term sub-kinds: Constant, QuotedString, Integer,
/// Variable, Nested. Rule sub-kinds: Disjunctive, Constraint, Weak, Weight.
/// Literal reuses the atom sub-kinds of the atom it wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SubKind {
    // atom / literal sub-kinds
    OrdinaryGround = 0,
    OrdinaryNonground = 1,
    BuiltIn = 2,
    Aggregate = 3,
    External = 4,
    Module = 5,
    // term sub-kinds
    Constant = 6,
    QuotedString = 7,
    Integer = 8,
    Variable = 9,
    Nested = 10,
    // rule sub-kinds
    Disjunctive = 11,
    Constraint = 12,
    Weak = 13,
    Weight = 14,
}

const NAF_SHIFT: u32 = 31;
const NAF_MASK: u32 = 1 << NAF_SHIFT;
const MAIN_SHIFT: u32 = 28;
const MAIN_MASK: u32 = 0b111 << MAIN_SHIFT;
const SUB_SHIFT: u32 = 24;
const SUB_MASK: u32 = 0b1111 << SUB_SHIFT;
const AUX_SHIFT: u32 = 23;
const AUX_MASK: u32 = 1 << AUX_SHIFT;
const PROP_SHIFT: u32 = 15;
const PROP_MASK: u32 = 0xFF << PROP_SHIFT;

/// A property bit carried alongside kind/sub-kind (e.g. "predicate", "anonymous").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyBit {
    /// Ordinary atom / nested term position that is itself a predicate name.
    Predicate = 0,
    /// Anonymous variable (`_`).
    Anonymous = 1,
}

/// 64-bit packed identifier. `kind` carries all tag bits, `address` indexes
/// the table selected by (main kind, sub kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id {
    pub kind: u32,
    pub address: u32,
}

/// Sentinel meaning "not found" -- all bits set in both halves.
pub const ID_FAIL: Id = Id {
    kind: u32::MAX,
    address: u32::MAX,
};

impl Id {
    pub fn new(naf: bool, main: MainKind, sub: SubKind, auxiliary: bool, address: u32) -> Self {
        let mut kind = 0u32;
        if naf {
            kind |= NAF_MASK;
        }
        kind |= (u8::from(main) as u32) << MAIN_SHIFT;
        kind |= (u8::from(sub) as u32) << SUB_SHIFT;
        if auxiliary {
            kind |= AUX_MASK;
        }
        Id { kind, address }
    }

    #[must_use]
    pub fn is_fail(self) -> bool {
        self == ID_FAIL
    }

    #[must_use]
    pub fn is_naf(self) -> bool {
        self.kind & NAF_MASK != 0
    }

    /// Returns the identifier with the NAF bit flipped.
    #[must_use]
    pub fn negated(self) -> Self {
        Id {
            kind: self.kind ^ NAF_MASK,
            address: self.address,
        }
    }

    #[must_use]
    pub fn main_kind(self) -> Option<MainKind> {
        MainKind::try_from(((self.kind & MAIN_MASK) >> MAIN_SHIFT) as u8).ok()
    }

    #[must_use]
    pub fn sub_kind(self) -> Option<SubKind> {
        SubKind::try_from(((self.kind & SUB_MASK) >> SUB_SHIFT) as u8).ok()
    }

    #[must_use]
    pub fn is_auxiliary(self) -> bool {
        self.kind & AUX_MASK != 0
    }

    #[must_use]
    pub fn with_auxiliary(mut self, auxiliary: bool) -> Self {
        if auxiliary {
            self.kind |= AUX_MASK;
        } else {
            self.kind &= !AUX_MASK;
        }
        self
    }

    #[must_use]
    pub fn has_property(self, bit: PropertyBit) -> bool {
        let shift = PROP_SHIFT + bit as u32;
        self.kind & (1 << shift) != 0
    }

    #[must_use]
    pub fn with_property(mut self, bit: PropertyBit, set: bool) -> Self {
        let shift = PROP_SHIFT + bit as u32;
        if set {
            self.kind |= 1 << shift;
        } else {
            self.kind &= !(1 << shift);
        }
        self
    }

    /// Checks that `kind` (modulo the NAF bit) matches between two IDs --
    /// the equality test the Registry's `valid` contract relies on.
    #[must_use]
    pub fn same_kind_as(self, other: Id) -> bool {
        (self.kind & !NAF_MASK) == (other.kind & !NAF_MASK)
    }

    /// Pack an `i32` directly as an integer term: sub-kind `Integer`, no table row.
    #[must_use]
    pub fn int_term(value: i32) -> Self {
        let mut id = Id::new(false, MainKind::Term, SubKind::Integer, false, value as u32);
        id.kind &= !PROP_MASK;
        id
    }

    #[must_use]
    pub fn is_int_term(self) -> bool {
        self.main_kind() == Some(MainKind::Term) && self.sub_kind() == Some(SubKind::Integer)
    }

    #[must_use]
    pub fn int_value(self) -> Option<i32> {
        if self.is_int_term() {
            Some(self.address as i32)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_fail() {
            return write!(f, "ID_FAIL");
        }
        write!(
            f,
            "{}{:?}/{:?}@{}{}",
            if self.is_naf() { "not " } else { "" },
            self.main_kind(),
            self.sub_kind(),
            self.address,
            if self.is_auxiliary() { " (aux)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naf_round_trips() {
        let id = Id::new(false, MainKind::Atom, SubKind::OrdinaryGround, false, 42);
        let negated = id.negated();
        assert!(!id.is_naf());
        assert!(negated.is_naf());
        assert_eq!(negated.negated(), id);
    }

    #[test]
    fn int_term_bypasses_table() {
        let id = Id::int_term(-7);
        assert!(id.is_int_term());
        assert_eq!(id.int_value(), Some(-7));
    }

    #[test]
    fn fail_sentinel_all_bits_set() {
        assert_eq!(ID_FAIL.kind, u32::MAX);
        assert_eq!(ID_FAIL.address, u32::MAX);
        assert!(ID_FAIL.is_fail());
    }

    #[test]
    fn same_kind_ignores_naf() {
        let a = Id::new(false, MainKind::Atom, SubKind::OrdinaryGround, false, 1);
        let b = Id::new(true, MainKind::Atom, SubKind::OrdinaryGround, false, 1);
        assert!(a.same_kind_as(b));
    }

    #[test]
    fn auxiliary_flag_round_trips() {
        let id = Id::new(false, MainKind::Atom, SubKind::OrdinaryGround, false, 3);
        let aux = id.with_auxiliary(true);
        assert!(aux.is_auxiliary());
        assert!(!aux.with_auxiliary(false).is_auxiliary());
    }
}
