//! Literal constant values carried by `Const` expression nodes.

use serde::{Deserialize, Serialize};

use crate::types::{GroundType, Type};

/// A literal scalar value. Distinct from [`Type`] -- a `Literal` is a value,
/// a `Type` is the classification of a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Literal {
    /// The ground type of this literal.
    pub fn ground_type(&self) -> GroundType {
        match self {
            Literal::Bool(_) => GroundType::Bool,
            Literal::I32(_) => GroundType::I32,
            Literal::I64(_) => GroundType::I64,
            Literal::F32(_) => GroundType::F32,
            Literal::F64(_) => GroundType::F64,
        }
    }

    /// The [`Type`] of this literal (always a ground type -- literals are
    /// never composite).
    pub fn ty(&self) -> Type {
        Type::Ground(self.ground_type())
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Literal::Bool(b) => !*b,
            Literal::I32(v) => *v == 0,
            Literal::I64(v) => *v == 0,
            Literal::F32(v) => *v == 0.0,
            Literal::F64(v) => *v == 0.0,
        }
    }

    pub fn is_one(&self) -> bool {
        match self {
            Literal::Bool(b) => *b,
            Literal::I32(v) => *v == 1,
            Literal::I64(v) => *v == 1,
            Literal::F32(v) => *v == 1.0,
            Literal::F64(v) => *v == 1.0,
        }
    }

    /// Interpret this literal as an `i64`, for constant-folding prims whose
    /// result type is integral. Panics on non-integral literals -- callers
    /// are expected to have already checked the prim's type rule.
    pub fn as_i64(&self) -> i64 {
        match self {
            Literal::I32(v) => *v as i64,
            Literal::I64(v) => *v,
            Literal::Bool(b) => *b as i64,
            _ => panic!("literal {:?} is not integral", self),
        }
    }

    /// Interpret this literal as an `f64`, for constant-folding prims whose
    /// result type is floating point.
    pub fn as_f64(&self) -> f64 {
        match self {
            Literal::F32(v) => *v as f64,
            Literal::F64(v) => *v,
            _ => panic!("literal {:?} is not floating point", self),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Literal::Bool(b) => *b,
            _ => panic!("literal {:?} is not a bool", self),
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::I32(v) => write!(f, "{}i32", v),
            Literal::I64(v) => write!(f, "{}i64", v),
            Literal::F32(v) => write!(f, "{}f32", v),
            Literal::F64(v) => write!(f, "{}f64", v),
        }
    }
}
