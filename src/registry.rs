//! Content-addressed interning tables for terms, atoms and rules (C2).
//!
//! Every distinct term/atom/rule is stored exactly once; callers get back an
//! [`Id`] and look the value up again through `get_*`. Each table is guarded by
//! its own [`parking_lot::RwLock`] so lookups across unrelated tables never
//! contend, mirroring the catalog's per-relation locking in the teacher.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::id::{Id, MainKind, PropertyBit, SubKind};

/// A stored term value. Integer terms never appear here -- they are bit-cast
/// directly into an [`Id`] by [`Id::int_term`] and never allocate a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermValue {
    Constant(String),
    QuotedString(String),
    Variable(String),
    /// `functor(arg0, arg1, ...)` where each arg is itself a term `Id`.
    Nested { functor: String, args: Vec<Id> },
}

/// A stored ordinary atom (ground or non-ground, told apart by the `Id`'s sub-kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrdinaryAtomValue {
    pub predicate: String,
    pub args: Vec<Id>,
}

/// A stored built-in atom, e.g. `X = Y + 1` or `X < Y`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuiltinAtomValue {
    pub op: String,
    pub args: Vec<Id>,
}

/// `#count{X : p(X)} = N`-style aggregate atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateAtomValue {
    pub func: String,
    pub lower_bound: Option<Id>,
    pub upper_bound: Option<Id>,
    pub result_var: Id,
    pub body: Vec<Id>,
}

/// `&name[inputs](outputs)` external atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalAtomValue {
    pub plugin_name: String,
    pub inputs: Vec<Id>,
    pub outputs: Vec<Id>,
}

/// A stored rule: disjunctive head, body literals, and (for weak constraints)
/// a weight/level pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleValue {
    pub head: Vec<Id>,
    pub body: Vec<Id>,
    pub weight_level: Option<(Id, Id)>,
    /// For weight/cardinality rule bodies (`bound <= w1*l1 + ... + wn*ln`):
    /// one weight per `body` position, and the threshold. `None` means the
    /// body is a plain conjunction (every literal must hold).
    pub bound: Option<(Vec<i64>, i64)>,
}

impl RuleValue {
    /// Plain conjunctive-body rule, the overwhelmingly common case.
    pub fn plain(head: Vec<Id>, body: Vec<Id>) -> Self {
        RuleValue {
            head,
            body,
            weight_level: None,
            bound: None,
        }
    }
}

/// Metadata recorded when an external atom is rewritten into a guessing aux
/// predicate pair (C5), so the reverse lookup `aux atom -> source external atom`
/// stays available to the FLP checker and to explanation output.
#[derive(Debug, Clone)]
pub struct AuxiliaryExternalInfo {
    pub external_atom: Id,
    pub positive: bool,
}

#[derive(Default)]
struct Table<V> {
    rows: RwLock<Vec<V>>,
    index: RwLock<HashMap<V, Id>>,
}

impl<V: Clone + Eq + std::hash::Hash> Table<V> {
    fn new() -> Self {
        Table {
            rows: RwLock::new(Vec::new()),
            index: RwLock::new(HashMap::new()),
        }
    }

    fn store(&self, value: V, build_id: impl FnOnce(u32) -> Id) -> Id {
        if let Some(id) = self.index.read().get(&value) {
            return *id;
        }
        let mut rows = self.rows.write();
        let mut index = self.index.write();
        if let Some(id) = index.get(&value) {
            return *id;
        }
        let address = rows.len() as u32;
        let id = build_id(address);
        rows.push(value.clone());
        index.insert(value, id);
        id
    }

    fn get(&self, address: u32) -> Option<V> {
        self.rows.read().get(address as usize).cloned()
    }

    fn len(&self) -> usize {
        self.rows.read().len()
    }
}

/// The interning registry. Cheap to clone (it is normally held behind an
/// `Arc`); every method takes `&self` since locking is internal per table.
pub struct Registry {
    constants: Table<TermValue>,
    nested_terms: Table<TermValue>,
    variables: Table<TermValue>,
    ordinary_ground: Table<OrdinaryAtomValue>,
    ordinary_nonground: Table<OrdinaryAtomValue>,
    builtin_atoms: Table<BuiltinAtomValue>,
    aggregate_atoms: Table<AggregateAtomValue>,
    external_atoms: Table<ExternalAtomValue>,
    rules: Table<RuleValue>,

    /// Auxiliary constant factory: maps a `(type, source)` pair to the
    /// constant `Id` minted for it, so repeated requests for the same
    /// auxiliary return the same symbol.
    aux_constants: RwLock<HashMap<(char, Id), Id>>,
    /// Reverse map: minted auxiliary constant `Id` -> the `(type, source)`
    /// pair it was minted from (§4.1's round-trip contract).
    aux_constants_reverse: RwLock<HashMap<Id, (char, Id)>>,
    /// Reverse map: auxiliary ordinary-atom `Id` -> originating external atom,
    /// consulted by the FLP checker and explanation output.
    aux_reverse: RwLock<HashMap<Id, AuxiliaryExternalInfo>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            constants: Table::new(),
            nested_terms: Table::new(),
            variables: Table::new(),
            ordinary_ground: Table::new(),
            ordinary_nonground: Table::new(),
            builtin_atoms: Table::new(),
            aggregate_atoms: Table::new(),
            external_atoms: Table::new(),
            rules: Table::new(),
            aux_constants: RwLock::new(HashMap::new()),
            aux_constants_reverse: RwLock::new(HashMap::new()),
            aux_reverse: RwLock::new(HashMap::new()),
        }
    }

    // --- terms ---------------------------------------------------------

    pub fn store_constant(&self, name: impl Into<String>) -> Id {
        let name = name.into();
        let is_quoted = name.starts_with('"');
        let value = if is_quoted {
            TermValue::QuotedString(name)
        } else {
            TermValue::Constant(name)
        };
        let sub = if is_quoted {
            SubKind::QuotedString
        } else {
            SubKind::Constant
        };
        self.constants
            .store(value, |addr| Id::new(false, MainKind::Term, sub, false, addr))
    }

    pub fn store_variable(&self, name: impl Into<String>) -> Id {
        let name = name.into();
        let anonymous = name == "_";
        let id = self.variables.store(TermValue::Variable(name), |addr| {
            Id::new(false, MainKind::Term, SubKind::Variable, false, addr)
        });
        id.with_property(PropertyBit::Anonymous, anonymous)
    }

    pub fn store_nested_term(&self, functor: impl Into<String>, args: Vec<Id>) -> Id {
        let value = TermValue::Nested {
            functor: functor.into(),
            args,
        };
        self.nested_terms
            .store(value, |addr| Id::new(false, MainKind::Term, SubKind::Nested, false, addr))
    }

    pub fn get_term(&self, id: Id) -> Option<TermValue> {
        match id.sub_kind()? {
            SubKind::Constant | SubKind::QuotedString => self.constants.get(id.address),
            SubKind::Variable => self.variables.get(id.address),
            SubKind::Nested => self.nested_terms.get(id.address),
            _ => None,
        }
    }

    /// Collects every distinct variable `Id` occurring in a term (recursing
    /// through nested terms).
    pub fn get_variables(&self, id: Id) -> Vec<Id> {
        let mut out = Vec::new();
        self.collect_variables(id, &mut out);
        out
    }

    fn collect_variables(&self, id: Id, out: &mut Vec<Id>) {
        match self.get_term(id) {
            Some(TermValue::Variable(_)) => {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
            Some(TermValue::Nested { args, .. }) => {
                for a in args {
                    self.collect_variables(a, out);
                }
            }
            _ => {}
        }
    }

    /// Substitutes every variable in `id` according to `bindings`, returning a
    /// freshly interned (or passed-through) term `Id`. Non-variable, non-nested
    /// terms are returned unchanged.
    pub fn replace_variables_in_term(&self, id: Id, bindings: &HashMap<Id, Id>) -> Id {
        match self.get_term(id) {
            Some(TermValue::Variable(_)) => *bindings.get(&id).unwrap_or(&id),
            Some(TermValue::Nested { functor, args }) => {
                let new_args: Vec<Id> = args
                    .iter()
                    .map(|a| self.replace_variables_in_term(*a, bindings))
                    .collect();
                if new_args == args {
                    id
                } else {
                    self.store_nested_term(functor, new_args)
                }
            }
            _ => id,
        }
    }

    // --- atoms -----------------------------------------------------------

    pub fn store_ordinary_atom(&self, predicate: impl Into<String>, args: Vec<Id>, ground: bool) -> Id {
        let value = OrdinaryAtomValue {
            predicate: predicate.into(),
            args,
        };
        let (table, sub) = if ground {
            (&self.ordinary_ground, SubKind::OrdinaryGround)
        } else {
            (&self.ordinary_nonground, SubKind::OrdinaryNonground)
        };
        table.store(value, |addr| Id::new(false, MainKind::Atom, sub, false, addr))
    }

    pub fn get_ordinary_atom(&self, id: Id) -> Option<OrdinaryAtomValue> {
        match id.sub_kind()? {
            SubKind::OrdinaryGround => self.ordinary_ground.get(id.address),
            SubKind::OrdinaryNonground => self.ordinary_nonground.get(id.address),
            _ => None,
        }
    }

    pub fn store_builtin_atom(&self, op: impl Into<String>, args: Vec<Id>) -> Id {
        let value = BuiltinAtomValue { op: op.into(), args };
        self.builtin_atoms
            .store(value, |addr| Id::new(false, MainKind::Atom, SubKind::BuiltIn, false, addr))
    }

    pub fn get_builtin_atom(&self, id: Id) -> Option<BuiltinAtomValue> {
        self.builtin_atoms.get(id.address)
    }

    pub fn store_aggregate_atom(&self, value: AggregateAtomValue) -> Id {
        self.aggregate_atoms
            .store(value, |addr| Id::new(false, MainKind::Atom, SubKind::Aggregate, false, addr))
    }

    pub fn get_aggregate_atom(&self, id: Id) -> Option<AggregateAtomValue> {
        self.aggregate_atoms.get(id.address)
    }

    pub fn store_external_atom(&self, value: ExternalAtomValue) -> Id {
        self.external_atoms
            .store(value, |addr| Id::new(false, MainKind::Atom, SubKind::External, false, addr))
    }

    pub fn get_external_atom(&self, id: Id) -> Option<ExternalAtomValue> {
        self.external_atoms.get(id.address)
    }

    pub fn external_atom_count(&self) -> usize {
        self.external_atoms.len()
    }

    /// Every ground ordinary atom interned so far whose predicate name is
    /// `predicate`, regardless of current truth. The external propagator (C8)
    /// uses this to expand a predicate-typed external-atom input into its full
    /// known extension, the same way the eager grounder's `FactBase` does for
    /// EDB-only inputs.
    pub fn atoms_with_predicate(&self, predicate: &str) -> Vec<Id> {
        self.ordinary_ground
            .rows
            .read()
            .iter()
            .enumerate()
            .filter(|(_, v)| v.predicate == predicate)
            .map(|(addr, _)| Id::new(false, MainKind::Atom, SubKind::OrdinaryGround, false, addr as u32))
            .collect()
    }

    // --- rules -------------------------------------------------------------

    pub fn store_rule(&self, value: RuleValue) -> Id {
        let sub = if value.weight_level.is_some() {
            SubKind::Weak
        } else if value.bound.is_some() {
            SubKind::Weight
        } else if value.head.is_empty() {
            SubKind::Constraint
        } else {
            SubKind::Disjunctive
        };
        self.rules
            .store(value, |addr| Id::new(false, MainKind::Rule, sub, false, addr))
    }

    pub fn get_rule(&self, id: Id) -> Option<RuleValue> {
        self.rules.get(id.address)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    // --- auxiliary symbol factory (used by C5) ------------------------------

    /// Returns the constant `Id` standing for the auxiliary of type `kind`
    /// minted from `source`, minting a fresh one on first request. Repeated
    /// requests with the same `(kind, source)` return the same `Id`.
    pub fn auxiliary_constant(&self, kind: char, source: Id) -> Id {
        let key = (kind, source);
        if let Some(id) = self.aux_constants.read().get(&key) {
            return *id;
        }
        let mut map = self.aux_constants.write();
        if let Some(id) = map.get(&key) {
            return *id;
        }
        let name = format!("{kind}_{}_{}", source.kind, source.address);
        let id = self.store_constant(name).with_auxiliary(true);
        map.insert(key, id);
        self.aux_constants_reverse.write().insert(id, key);
        id
    }

    /// Reverses `auxiliary_constant`: given the minted `Id`, recovers the
    /// `(type, source)` pair it was minted from.
    /// `id_of_auxiliary_constant(auxiliary_constant(t, s)) == Some((t, s))`.
    pub fn id_of_auxiliary_constant(&self, id: Id) -> Option<(char, Id)> {
        self.aux_constants_reverse.read().get(&id).copied()
    }

    /// Records that ground ordinary atom `aux_atom` is the auxiliary
    /// (`positive` or negative guess) standing in for `external_atom`.
    pub fn register_auxiliary_external(&self, aux_atom: Id, external_atom: Id, positive: bool) {
        self.aux_reverse.write().insert(
            aux_atom,
            AuxiliaryExternalInfo {
                external_atom,
                positive,
            },
        );
    }

    pub fn lookup_auxiliary_external(&self, aux_atom: Id) -> Option<AuxiliaryExternalInfo> {
        self.aux_reverse.read().get(&aux_atom).cloned()
    }

    /// Swaps the polarity of an auxiliary ground atom: if `aux_atom` is the
    /// "true" guess (`r_{&g,x}`) for some external atom, returns the sibling
    /// "false" guess (`n_{&g,x}`) for the same external-atom/input tuple, and
    /// vice versa. Returns `None` if `aux_atom` is not a registered auxiliary.
    pub fn swap_external_auxiliary(&self, aux_atom: Id) -> Option<Id> {
        let info = self.lookup_auxiliary_external(aux_atom)?;
        let atom = self.get_ordinary_atom(aux_atom)?;
        let sibling_prefix = if info.positive { "n_" } else { "r_" };
        let sibling_predicate = format!(
            "{sibling_prefix}{}",
            atom.predicate.trim_start_matches("r_").trim_start_matches("n_")
        );
        let sibling_id = self.store_ordinary_atom(sibling_predicate, atom.args, true);
        self.register_auxiliary_external(sibling_id, info.external_atom, !info.positive);
        Some(sibling_id)
    }
}
