//! Runtime values for the reference interpreter: whatever the
//! "executable by the reference interpreter" compiled artifact can
//! produce or consume. Distinct from
//! `parajit_ir::Literal`: a `Literal` is a constant-folding operand, a
//! `Value` is anything a typed function can produce or consume at
//! runtime, including arrays, tuples, structs, and closures.

use parajit_ir::{GroundType, Literal, Type};

use crate::error::{Error, Result};

/// A fixed-rank, row-major, densely packed array. Views produced by
/// `ArrayView`/`Slice`/`Index` are materialized eagerly into a fresh
/// `ArrayValue` rather than tracked as strided references over shared
/// storage -- the reference interpreter favors a straightforward
/// semantics over the aliasing behavior a real backend would give views.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub shape: Vec<usize>,
    pub data: Vec<Value>,
}

impl ArrayValue {
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The extent along `axis`, i.e. `shape[axis]`.
    pub fn axis_extent(&self, axis: usize) -> Result<usize> {
        self.shape
            .get(axis)
            .copied()
            .ok_or_else(|| Error::Interpreter(format!("axis {axis} out of range for rank {}", self.rank())))
    }

    /// Slice out the `i`-th element along axis 0, as its own `Value`: a
    /// scalar if this array is rank 1, otherwise a rank-(r-1) sub-array.
    pub fn slice_outer(&self, i: usize) -> Result<Value> {
        let extent = self.axis_extent(0)?;
        if i >= extent {
            return Err(Error::Interpreter(format!("index {i} out of bounds for extent {extent}")));
        }
        if self.rank() == 1 {
            return Ok(self.data[i].clone());
        }
        let inner_len = self.data.len() / extent;
        let start = i * inner_len;
        Ok(Value::Array(ArrayValue {
            shape: self.shape[1..].to_vec(),
            data: self.data[start..start + inner_len].to_vec(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Tuple(Vec<Value>),
    Struct(String, Vec<(String, Value)>),
    Array(ArrayValue),
    /// A closure value: the named typed function plus its captured
    /// non-local values, in declaration order (mirrors `ExprKind::Closure`).
    Closure { fn_name: String, captured: Vec<Value> },
}

impl Value {
    pub fn as_literal(&self) -> Result<Literal> {
        match self {
            Value::Bool(b) => Ok(Literal::Bool(*b)),
            Value::I32(v) => Ok(Literal::I32(*v)),
            Value::I64(v) => Ok(Literal::I64(*v)),
            Value::F32(v) => Ok(Literal::F32(*v)),
            Value::F64(v) => Ok(Literal::F64(*v)),
            other => Err(Error::Interpreter(format!("expected scalar, found {other:?}"))),
        }
    }

    pub fn from_literal(lit: Literal) -> Value {
        match lit {
            Literal::Bool(b) => Value::Bool(b),
            Literal::I32(v) => Value::I32(v),
            Literal::I64(v) => Value::I64(v),
            Literal::F32(v) => Value::F32(v),
            Literal::F64(v) => Value::F64(v),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(Error::Interpreter(format!("expected bool, found {other:?}"))),
        }
    }

    pub fn as_index(&self) -> Result<usize> {
        match self {
            Value::I32(v) => Ok(*v as usize),
            Value::I64(v) => Ok(*v as usize),
            other => Err(Error::Interpreter(format!("expected integer index, found {other:?}"))),
        }
    }

    pub fn as_array(&self) -> Result<&ArrayValue> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(Error::Interpreter(format!("expected array, found {other:?}"))),
        }
    }

    pub fn as_tuple(&self) -> Result<&[Value]> {
        match self {
            Value::Tuple(elts) => Ok(elts),
            other => Err(Error::Interpreter(format!("expected tuple, found {other:?}"))),
        }
    }

    pub fn struct_field(&self, name: &str) -> Result<&Value> {
        match self {
            Value::Struct(_, fields) => fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .ok_or_else(|| Error::Interpreter(format!("no field '{name}' in struct value"))),
            other => Err(Error::Interpreter(format!("expected struct, found {other:?}"))),
        }
    }

    /// The ground type this scalar value would carry, for building default
    /// arrays/tuples and for dispatch's args-struct type checks.
    pub fn ground_type(&self) -> Option<GroundType> {
        match self {
            Value::Bool(_) => Some(GroundType::Bool),
            Value::I32(_) => Some(GroundType::I32),
            Value::I64(_) => Some(GroundType::I64),
            Value::F32(_) => Some(GroundType::F32),
            Value::F64(_) => Some(GroundType::F64),
            _ => None,
        }
    }

    /// Build a zero value of `ty`, used to seed `Reduce`'s accumulator
    /// shape and as a filler when constructing default struct fields.
    pub fn zero_of(ty: &Type) -> Result<Value> {
        match ty {
            Type::Ground(GroundType::Bool) => Ok(Value::Bool(false)),
            Type::Ground(GroundType::I32) => Ok(Value::I32(0)),
            Type::Ground(GroundType::I64) => Ok(Value::I64(0)),
            Type::Ground(GroundType::F32) => Ok(Value::F32(0.0)),
            Type::Ground(GroundType::F64) => Ok(Value::F64(0.0)),
            Type::Ground(GroundType::Ptr(_)) => {
                Err(Error::Interpreter("cannot construct a value-level pointer".into()))
            }
            Type::Array { rank, .. } => Ok(Value::Array(ArrayValue {
                shape: vec![0; *rank as usize],
                data: vec![],
            })),
            Type::Tuple(elts) => Ok(Value::Tuple(
                elts.iter().map(Value::zero_of).collect::<Result<Vec<_>>>()?,
            )),
            Type::Struct { name, fields } => Ok(Value::Struct(
                name.clone(),
                fields
                    .iter()
                    .map(|f| Ok((f.name.clone(), Value::zero_of(&f.ty)?)))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Type::Slice { .. } | Type::Closure { .. } => Err(Error::Interpreter(format!(
                "no zero value for type {ty}"
            ))),
        }
    }
}
