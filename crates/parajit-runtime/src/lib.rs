//! The two external-interface contracts the compiler core hands typed,
//! optimized functions to, plus a reference implementation of
//! each so the core can be exercised end to end without a native codegen
//! backend or a production thread pool:
//!
//! - [`backend::BackendLowering`] / [`backend::ReferenceBackend`]
//! - [`dispatch::RuntimeDispatch`] / [`dispatch::ThreadPoolDispatch`]
//!
//! [`eval::Interpreter`] is the tree-walking evaluator both scaffolding
//! pieces share: the reference backend's "compiled" artifact is the typed
//! IR itself, and the reference dispatcher runs it with this evaluator.

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod eval;
pub mod value;

pub use backend::{BackendLowering, CompiledArtifact, ReferenceBackend};
pub use dispatch::{partition_ranges, RuntimeDispatch, ThreadPoolDispatch};
pub use error::{Error, Result};
pub use eval::Interpreter;
pub use value::{ArrayValue, Value};
