//! Core error types for the IR data model.
//!
//! These are the error kinds that can be raised purely from inspecting or
//! constructing IR -- name resolution, the shape lattice, and structural
//! invariants (SSA, phi domains, tuple arity). Errors raised by analyses that
//! require a type system (inference, specialization) live in
//! `parajit-compiler` and wrap these via [`Error::Ir`] there.

use thiserror::Error;

use crate::shape::AbstractValue;

/// Errors produced while constructing or inspecting IR.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A referenced variable has no binding in any enclosing scope.
    #[error("name not found: '{0}'")]
    NameNotFound(String),

    /// Two abstract values were combined in the shape lattice but belong to
    /// incompatible categories (e.g. a `Shape` and a `Tuple`), or to the same
    /// category with incompatible shape (e.g. mismatched rank).
    #[error("value mismatch: cannot combine {0} with {1}")]
    ValueMismatch(AbstractValue, AbstractValue),

    /// An internal invariant was violated: an SSA name assigned twice along
    /// an acyclic path, a phi-merge missing a branch value, or a
    /// `TupleProj` index out of range of the tuple's arity.
    #[error("assertion failure: {0}")]
    AssertionFailure(String),
}

pub type Result<T> = std::result::Result<T, Error>;
