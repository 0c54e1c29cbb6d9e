//! Grounding pipeline: the annotated ground program (C3) and external-atom
//! evaluation/rewriting (C5).

pub mod compile;
pub mod external;
pub mod instantiate;
pub mod program;
pub mod scc;

pub use compile::{body_satisfied, compile_rules};
pub use external::{
    auxiliary_guess, consistency_nogood, evaluate_external_atom, rewrite_external_atoms,
    ExternalEvaluationCache, Guess,
};
pub use instantiate::instantiate_program;
pub use program::{AnnotatedGroundProgram, AtomMask, SubProgram};
pub use scc::{compute_sccs, Component, DependencyGraph, DependencyKind};
