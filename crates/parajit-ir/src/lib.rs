//! The IR data model: expression and statement nodes, the type and shape
//! lattices, formal/actual argument bundles, names, and the two function
//! registries. Pure data plus the invariants checkable on that data --
//! no transform logic lives here (see `parajit-compiler`).

pub mod args;
pub mod error;
pub mod expr;
pub mod function;
pub mod literal;
pub mod names;
pub mod prim;
pub mod shape;
pub mod stmt;
pub mod types;

pub use args::{bind, Actual, Formal};
pub use error::{Error, Result};
pub use expr::{AdverbExpr, AdverbKind, Callee, Expr, ExprKind};
pub use function::{Function, TypedFunctionCache, UntypedFunctionRegistry};
pub use literal::Literal;
pub use names::{Name, NameSupply};
pub use prim::Prim;
pub use shape::{dim, increase_rank, lower_rank, AbstractValue, ShapeBinop};
pub use stmt::{Block, LValue, Merge, Stmt};
pub use types::{
    can_coerce, combine_types, common_numeric_type, Field, GroundType, StructRegistry, Type,
};
