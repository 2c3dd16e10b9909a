//! Error types for the transform/analysis/pipeline layer.
//!
//! Wraps `parajit_ir::Error` (name resolution, shape-lattice, invariant
//! failures raised purely from inspecting IR) and adds the errors that can
//! only arise once a type system is in play: unification failure during
//! specialization, and pipeline-level cache/lookup failures.

use thiserror::Error;

use parajit_ir::{Name, Type};

/// An IR node identifier used purely for diagnostics -- a `Display` of
/// whichever node/statement raised the error, not a stable address.
pub type NodeDesc = String;

#[derive(Debug, Error)]
pub enum Error {
    /// Raised by IR-level inspection: name resolution, the shape lattice,
    /// or a structural invariant (SSA, phi domain, tuple arity). See
    /// `parajit_ir::Error` for the variant breakdown.
    #[error(transparent)]
    Ir(#[from] parajit_ir::Error),

    /// Unification failure during specialization: a prim received
    /// incompatible argument types, or a `While`'s type lattice failed to
    /// reach a fixpoint. Fatal for the current specialization; the typed
    /// function cache is not populated.
    #[error("inference error at {node}: {reason}")]
    InferenceError { node: NodeDesc, reason: String },

    /// A referenced type doesn't match what an operation expects,
    /// distinct from `InferenceError` in that it can also be raised
    /// post-specialization by passes that re-check a typed node's
    /// already-assigned type (e.g. `TupleProj` index range).
    #[error("type error at {node}: expected {expected}, got {actual}")]
    TypeError {
        node: NodeDesc,
        expected: String,
        actual: Type,
    },

    /// A specialization or optimization cache lookup was attempted for a
    /// function not present in the relevant untyped-function registry.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// The inliner or adverb synthesis needed a name not bound in the
    /// current pass's scope -- distinct from `parajit_ir::Error::NameNotFound`
    /// in that it carries the pass name for diagnostics.
    #[error("'{name}' not found in {pass} scope")]
    ScopeMiss { pass: &'static str, name: Name },
}

pub type Result<T> = std::result::Result<T, Error>;
