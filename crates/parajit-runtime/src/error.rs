//! Error types for the external-interface contracts: the
//! lowering preconditions and dispatch-contract violations that can only
//! be observed once a typed, optimized function crosses the boundary into
//! `BackendLowering`/`RuntimeDispatch`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The function handed to `BackendLowering::lower` violates one of
    /// the four lowering preconditions (untyped node, non-simple loop condition,
    /// non-simple merge value, or a remaining closure-over-typed-function
    /// `Call`).
    #[error("lowering precondition violated for '{function}': {reason}")]
    LoweringPrecondition { function: String, reason: String },

    /// `RuntimeDispatch::dispatch` was called with a worker/args-struct
    /// count that doesn't divide `[0, N)` into the disjoint ranges the
    /// dispatch contract requires, or with an args-struct whose fields don't match the
    /// compiled work function's struct type.
    #[error("dispatch contract violated: {0}")]
    DispatchContract(String),

    /// The reference interpreter hit a runtime condition the compiler
    /// core assumes never happens on well-typed input (e.g. division by
    /// zero, an index out of the bounds the shape lattice predicted).
    /// Distinct from the core's own `AssertionFailure`: this is a
    /// reference-scaffolding failure, not a compiler-invariant failure.
    #[error("reference interpreter error: {0}")]
    Interpreter(String),

    #[error(transparent)]
    Ir(#[from] parajit_ir::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
