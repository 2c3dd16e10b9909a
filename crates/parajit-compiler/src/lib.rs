//! The transform/analysis layer: the generic transform framework, the
//! mutability and use-count analyses Simplify consumes, the Simplify and
//! Inliner passes and the DCE sweep between them, the pipeline driver
//! (`optimize`), and the adverb API / work-function synthesis front facade.
//! Depends on `parajit-ir` only.
//!
//! # Modules
//!
//! - [`walker`] -- scoped environments, the fresh-statement emitter, and
//!   the `Phase`/`run_to_fixpoint` framework every pass runs under
//! - [`mutability`] -- `TypeBasedMutabilityAnalysis`
//! - [`use_count`] -- `use_count`
//! - [`infer`] -- the specializer and type inference
//! - [`simplify`] -- the Simplify pass
//! - [`inline`] -- the Inliner
//! - [`dce`] -- dead-code elimination between pipeline stages
//! - [`pipeline`] -- `Pipeline::optimize`
//! - [`adverb`] -- adverb wrapping and work-function synthesis
//! - [`error`] -- this crate's `Error`, wrapping `parajit_ir::Error`

pub mod adverb;
pub mod dce;
pub mod error;
pub mod infer;
pub mod inline;
pub mod mutability;
pub mod pipeline;
pub mod simplify;
pub mod use_count;
pub mod walker;

pub use adverb::{AdverbApi, AdverbSpec, CompilerOptions, WorkFunction, WorkFunctionKey};
pub use dce::Dce;
pub use error::{Error, Result};
pub use infer::{infer_function, Specializer};
pub use inline::Inliner;
pub use mutability::TypeBasedMutabilityAnalysis;
pub use pipeline::{Pipeline, PipelineConfig, DEFAULT_MAX_PASS_ITERS};
pub use simplify::Simplify;
pub use use_count::use_count;
pub use walker::{run_to_fixpoint, Emitter, Phase, ScopedMap};
