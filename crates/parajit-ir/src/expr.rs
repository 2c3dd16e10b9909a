//! Expression nodes. Every node carries an optional [`Type`] in the
//! `ty` field, populated by the specializer and consulted (never
//! re-derived) by every later pass -- see the well-typedness invariant below.

use serde::{Deserialize, Serialize};

use crate::literal::Literal;
use crate::names::Name;
use crate::prim::Prim;
use crate::types::Type;

/// The data-parallel adverb a call site applies. Part of the
/// `(adverb_kind, callee_name, argument_types)` key work-function
/// synthesis memoizes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdverbKind {
    Map,
    AllPairs,
    Reduce,
    Scan,
}

impl std::fmt::Display for AdverbKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AdverbKind::Map => "map",
            AdverbKind::AllPairs => "all_pairs",
            AdverbKind::Reduce => "reduce",
            AdverbKind::Scan => "scan",
        };
        write!(f, "{}", s)
    }
}

/// A callee reference: a named function looked up by name in one of the
/// two function registries, or (post-specialization) a value-level
/// closure already captured in an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    /// Direct reference to a function by name, resolved against the
    /// untyped- or typed-function registry depending on pipeline stage.
    Named(String),
    /// The callee is itself an expression (a closure value, or -- pre
    /// Simplify's closure-call rewrite -- a `ClosureElt`/`Var` holding one).
    Value(Box<Expr>),
}

/// An expression node. Pre-specialization every node has `ty: None`;
/// post-specialization every node's `ty` is populated per the
/// well-typedness invariant below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Option<Type>,
}

impl Expr {
    pub fn untyped(kind: ExprKind) -> Expr {
        Expr { kind, ty: None }
    }

    pub fn typed(kind: ExprKind, ty: Type) -> Expr {
        Expr {
            kind,
            ty: Some(ty),
        }
    }

    pub fn is_typed(&self) -> bool {
        self.ty.is_some()
    }

    /// `true` for the two terminal forms Simplify treats as "simple":
    /// already-reduced, side-effect-free leaves that need no further
    /// normalization wherever a "simple" value is required (loop
    /// conditions, merge branches).
    pub fn is_simple(&self) -> bool {
        matches!(self.kind, ExprKind::Var(_) | ExprKind::Const(_))
    }

    pub fn var(name: Name) -> Expr {
        Expr::untyped(ExprKind::Var(name))
    }

    pub fn const_(lit: Literal) -> Expr {
        let ty = lit.ty();
        Expr::typed(ExprKind::Const(lit), ty)
    }
}

/// The tagged expression-node variants. `PrimCall` is the only variant whose
/// arguments are uniformly typed scalars; everything past it handles one
/// of the composite shapes the source-language subset supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Const(Literal),
    Var(Name),
    PrimCall(Prim, Vec<Expr>),
    Cast(Box<Expr>, Type),
    Tuple(Vec<Expr>),
    TupleProj(Box<Expr>, usize),
    Struct(Vec<(String, Expr)>),
    Attribute(Box<Expr>, String),
    Array(Vec<Expr>),
    ArrayView {
        data: Box<Expr>,
        shape: Vec<Expr>,
        strides: Vec<Expr>,
        offset: Box<Expr>,
        total_elts: Box<Expr>,
    },
    Index(Box<Expr>, Box<Expr>),
    Slice {
        start: Box<Expr>,
        stop: Box<Expr>,
        step: Box<Expr>,
    },
    Closure {
        callee: String,
        captured_args: Vec<Expr>,
    },
    ClosureElt(Box<Expr>, usize),
    Call(Callee, Vec<Expr>),
    Adverb(Box<AdverbExpr>),
}

/// The four adverb node shapes, grouped behind one boxed variant so
/// `ExprKind` doesn't carry four large inline payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdverbExpr {
    Map {
        f: Callee,
        args: Vec<Expr>,
        axis: i64,
    },
    AllPairs {
        f: Callee,
        x: Expr,
        y: Expr,
        axis: i64,
    },
    Reduce {
        f: Callee,
        combine: Callee,
        args: Vec<Expr>,
        init: Expr,
        axis: i64,
    },
    Scan {
        f: Callee,
        combine: Callee,
        emit: Callee,
        args: Vec<Expr>,
        init: Expr,
        axis: i64,
    },
}

impl AdverbExpr {
    pub fn kind(&self) -> AdverbKind {
        match self {
            AdverbExpr::Map { .. } => AdverbKind::Map,
            AdverbExpr::AllPairs { .. } => AdverbKind::AllPairs,
            AdverbExpr::Reduce { .. } => AdverbKind::Reduce,
            AdverbExpr::Scan { .. } => AdverbKind::Scan,
        }
    }

    pub fn axis(&self) -> i64 {
        match self {
            AdverbExpr::Map { axis, .. }
            | AdverbExpr::AllPairs { axis, .. }
            | AdverbExpr::Reduce { axis, .. }
            | AdverbExpr::Scan { axis, .. } => *axis,
        }
    }
}
