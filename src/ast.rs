//! Non-ground surface AST produced by [`crate::hexparser`] and consumed by the
//! grounding pipeline. Unlike the interned [`crate::id::Id`]/[`crate::registry`]
//! pair used internally once a program is registered, these types are plain,
//! cheaply-cloned trees -- the parser's job is to build them, the grounder's
//! job is to intern them away.

/// A term as written in source syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Constant(String),
    QuotedString(String),
    Integer(i32),
    Variable(String),
    Nested { functor: String, args: Vec<Term> },
}

impl Term {
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Variable(_) => false,
            Term::Nested { args, .. } => args.iter().all(Term::is_ground),
            _ => true,
        }
    }
}

/// An ordinary atom, possibly negated by NAF.
#[derive(Debug, Clone, PartialEq)]
pub struct OrdinaryAtom {
    pub naf: bool,
    pub predicate: String,
    pub args: Vec<Term>,
}

/// `X OP Y`, one of the built-in comparison/arithmetic predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinAtom {
    pub naf: bool,
    pub op: String,
    pub args: Vec<Term>,
}

/// One of the supported aggregate functions, named by the `#name` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    Times,
}

impl AggregateFunc {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "count" => Some(AggregateFunc::Count),
            "sum" => Some(AggregateFunc::Sum),
            "min" => Some(AggregateFunc::Min),
            "max" => Some(AggregateFunc::Max),
            "avg" => Some(AggregateFunc::Avg),
            "times" => Some(AggregateFunc::Times),
            _ => None,
        }
    }
}

/// `L <= #func{Vars : Body} <= U`, with either bound optional.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateAtom {
    pub naf: bool,
    pub func: AggregateFunc,
    pub lower_bound: Option<Term>,
    pub upper_bound: Option<Term>,
    pub result_vars: Vec<Term>,
    pub body: Vec<Literal>,
}

/// `&name[inputs](outputs)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalAtom {
    pub naf: bool,
    pub name: String,
    pub inputs: Vec<Term>,
    pub outputs: Vec<Term>,
}

/// Any literal that may appear in a rule body.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Ordinary(OrdinaryAtom),
    Builtin(BuiltinAtom),
    Aggregate(Box<AggregateAtom>),
    External(ExternalAtom),
}

impl Literal {
    pub fn naf(&self) -> bool {
        match self {
            Literal::Ordinary(a) => a.naf,
            Literal::Builtin(a) => a.naf,
            Literal::Aggregate(a) => a.naf,
            Literal::External(a) => a.naf,
        }
    }
}

/// `h1 v h2 v ... :- b1, ..., bn.` A plain constraint has an empty head; a
/// weak constraint additionally carries `weight_level`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rule {
    pub head: Vec<OrdinaryAtom>,
    pub body: Vec<Literal>,
    /// Present only for `:~ body. [weight:level]` weak constraints.
    pub weight_level: Option<(Term, Term)>,
}

impl Rule {
    pub fn is_constraint(&self) -> bool {
        self.head.is_empty() && self.weight_level.is_none()
    }

    pub fn is_weak_constraint(&self) -> bool {
        self.weight_level.is_some()
    }

    pub fn is_fact(&self) -> bool {
        self.body.is_empty() && self.weight_level.is_none()
    }
}

/// A parsed HEX program: its rules plus the directives that affect grounding
/// (`#maxint`, `#namespace`).
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub rules: Vec<Rule>,
    pub max_int: Option<i32>,
    pub namespaces: Vec<(String, String)>,
}
