//! The type system: ground types, composite types, and the combination
//! (unification) lattice used during specialization.
//!
//! Unlike the shape lattice (`shape.rs`), which reasons about concrete
//! dimensions, this lattice reasons about the *kind* of value a node
//! produces -- its width, its rank, its field layout -- and is what gets
//! attached to every IR node once a function has been specialized.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Scalar (non-composite) types: integer/float widths, bool, and a raw
/// pointer used by the work-function signature (`tile_sizes_ptr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroundType {
    Bool,
    I32,
    I64,
    F32,
    F64,
    /// Raw pointer to a ground type, used for `tile_sizes_ptr` and similar
    /// work-function plumbing. Not a first-class host value.
    Ptr(Box<GroundType>),
}

impl GroundType {
    pub fn is_integer(&self) -> bool {
        matches!(self, GroundType::I32 | GroundType::I64 | GroundType::Bool)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, GroundType::F32 | GroundType::F64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Width ordering used for the "common numeric type" rule: the wider of
    /// two numeric types wins, and any float outranks any integer.
    fn rank(&self) -> u8 {
        match self {
            GroundType::Bool => 0,
            GroundType::I32 => 1,
            GroundType::I64 => 2,
            GroundType::F32 => 3,
            GroundType::F64 => 4,
            GroundType::Ptr(_) => 5,
        }
    }
}

impl std::fmt::Display for GroundType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroundType::Bool => write!(f, "bool"),
            GroundType::I32 => write!(f, "i32"),
            GroundType::I64 => write!(f, "i64"),
            GroundType::F32 => write!(f, "f32"),
            GroundType::F64 => write!(f, "f64"),
            GroundType::Ptr(t) => write!(f, "ptr<{}>", t),
        }
    }
}

/// A named field in a struct layout, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

/// The full type of an IR node: either a ground scalar or one of the
/// fixed composite shapes the source language subset supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Ground(GroundType),
    /// A fixed-rank array of a ground or composite element type.
    Array { elt: Box<Type>, rank: u32 },
    /// A homogeneous fixed-length slice view (same element type as its
    /// backing array, always rank 1 once indexed by a single axis).
    Slice { elt: Box<Type> },
    /// A heterogeneous fixed-arity tuple.
    Tuple(Vec<Type>),
    /// A named-field struct. Field order is declaration order, not sorted.
    Struct {
        name: String,
        fields: Vec<Field>,
    },
    /// A closure over a named typed function, plus the types of its
    /// captured non-local values.
    Closure {
        fn_name: String,
        captures: Vec<Type>,
    },
}

impl Type {
    pub fn bool() -> Type {
        Type::Ground(GroundType::Bool)
    }
    pub fn i32() -> Type {
        Type::Ground(GroundType::I32)
    }
    pub fn i64() -> Type {
        Type::Ground(GroundType::I64)
    }
    pub fn f32() -> Type {
        Type::Ground(GroundType::F32)
    }
    pub fn f64() -> Type {
        Type::Ground(GroundType::F64)
    }

    pub fn array(elt: Type, rank: u32) -> Type {
        Type::Array {
            elt: Box::new(elt),
            rank,
        }
    }

    pub fn as_ground(&self) -> Option<GroundType> {
        match self {
            Type::Ground(g) => Some(*g),
            _ => None,
        }
    }

    pub fn is_ground(&self) -> bool {
        matches!(self, Type::Ground(_))
    }

    pub fn rank(&self) -> u32 {
        match self {
            Type::Array { rank, .. } => *rank,
            _ => 0,
        }
    }

    /// The element type one gets by indexing a single axis off this type.
    /// For a rank-1 array this is the scalar element type; for higher rank
    /// it is an array of rank - 1.
    pub fn lower_rank(&self) -> Option<Type> {
        match self {
            Type::Array { elt, rank } if *rank > 1 => Some(Type::Array {
                elt: elt.clone(),
                rank: rank - 1,
            }),
            Type::Array { elt, rank } if *rank == 1 => Some((**elt).clone()),
            Type::Slice { elt } => Some((**elt).clone()),
            _ => None,
        }
    }

    /// The struct field layout, for `Attribute`/`StructCreate` type checks.
    pub fn field_pos(&self, field_name: &str) -> Option<usize> {
        match self {
            Type::Struct { fields, .. } => fields.iter().position(|f| f.name == field_name),
            _ => None,
        }
    }

    pub fn field_type(&self, field_name: &str) -> Option<&Type> {
        match self {
            Type::Struct { fields, .. } => {
                fields.iter().find(|f| f.name == field_name).map(|f| &f.ty)
            }
            _ => None,
        }
    }

    /// Whether a value of this type can be observably mutated in place
    /// (arrays, array views/slices, and structs transitively containing
    /// one). Backs `TypeBasedMutabilityAnalysis` in the compiler crate.
    pub fn is_mutable(&self) -> bool {
        match self {
            Type::Ground(_) => false,
            Type::Array { .. } | Type::Slice { .. } => true,
            Type::Tuple(elts) => elts.iter().any(Type::is_mutable),
            Type::Struct { fields, .. } => fields.iter().any(|f| f.ty.is_mutable()),
            Type::Closure { captures, .. } => captures.iter().any(Type::is_mutable),
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Ground(g) => write!(f, "{}", g),
            Type::Array { elt, rank } => write!(f, "array<{}, {}>", elt, rank),
            Type::Slice { elt } => write!(f, "slice<{}>", elt),
            Type::Tuple(elts) => {
                write!(f, "(")?;
                for (i, t) in elts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", t)?;
                }
                write!(f, ")")
            }
            Type::Struct { name, .. } => write!(f, "struct {}", name),
            Type::Closure { fn_name, .. } => write!(f, "closure<{}>", fn_name),
        }
    }
}

/// Can a value of type `from` be used where `to` is expected without an
/// explicit `Cast`? Only numeric widening is allowed implicitly; every
/// other conversion requires an explicit `Cast` node.
pub fn can_coerce(from: GroundType, to: GroundType) -> bool {
    from == to || (from.is_numeric() && to.is_numeric() && from.rank() <= to.rank())
}

/// The common numeric type two ground types can both be coerced to, per
/// the "widest wins, float beats int" rule. `None` if neither is numeric
/// or bool.
pub fn common_numeric_type(a: GroundType, b: GroundType) -> Option<GroundType> {
    if !a.is_numeric() || !b.is_numeric() {
        return None;
    }
    Some(if a.rank() >= b.rank() { a } else { b })
}

/// Combine (unify) two types seen along different control-flow paths
/// reaching the same SSA join. Ground types unify via [`common_numeric_type`]
/// when numeric, or must be identical. Composite types unify structurally,
/// recursing into elements/fields; mismatched shapes are an [`Error::ValueMismatch`]-class
/// failure reported through [`Error::AssertionFailure`] (type combination is not
/// part of the shape lattice itself, but reuses its failure-reporting idiom).
pub fn combine_types(a: &Type, b: &Type) -> Result<Type> {
    match (a, b) {
        (Type::Ground(ga), Type::Ground(gb)) => {
            if ga == gb {
                Ok(Type::Ground(*ga))
            } else if let Some(common) = common_numeric_type(*ga, *gb) {
                Ok(Type::Ground(common))
            } else {
                Err(Error::AssertionFailure(format!(
                    "cannot unify ground types {} and {}",
                    ga, gb
                )))
            }
        }
        (Type::Array { elt: ea, rank: ra }, Type::Array { elt: eb, rank: rb }) if ra == rb => {
            Ok(Type::Array {
                elt: Box::new(combine_types(ea, eb)?),
                rank: *ra,
            })
        }
        (Type::Slice { elt: ea }, Type::Slice { elt: eb }) => Ok(Type::Slice {
            elt: Box::new(combine_types(ea, eb)?),
        }),
        (Type::Tuple(ea), Type::Tuple(eb)) if ea.len() == eb.len() => {
            let combined: Result<Vec<Type>> = ea
                .iter()
                .zip(eb.iter())
                .map(|(x, y)| combine_types(x, y))
                .collect();
            Ok(Type::Tuple(combined?))
        }
        (
            Type::Struct {
                name: na,
                fields: fa,
            },
            Type::Struct {
                name: nb,
                fields: fb,
            },
        ) if na == nb && fa.len() == fb.len() => Ok(a.clone()).and({
            for (x, y) in fa.iter().zip(fb.iter()) {
                if x.name != y.name || x.ty != y.ty {
                    return Err(Error::AssertionFailure(format!(
                        "cannot unify struct fields {:?} and {:?}",
                        x, y
                    )));
                }
            }
            Ok(a.clone())
        }),
        (
            Type::Closure {
                fn_name: fa,
                captures: ca,
            },
            Type::Closure {
                fn_name: fb,
                captures: cb,
            },
        ) if fa == fb && ca.len() == cb.len() => {
            let combined: Result<Vec<Type>> = ca
                .iter()
                .zip(cb.iter())
                .map(|(x, y)| combine_types(x, y))
                .collect();
            Ok(Type::Closure {
                fn_name: fa.clone(),
                captures: combined?,
            })
        }
        _ => Err(Error::AssertionFailure(format!(
            "cannot unify types {} and {}",
            a, b
        ))),
    }
}

/// A struct type registry keyed by field layout, so that adverb
/// work-function synthesis can intern the same `arg0..argN, output`
/// specialization-args struct type across repeated calls instead of
/// minting a fresh nominal type each time.
#[derive(Debug, Default)]
pub struct StructRegistry {
    by_name: BTreeMap<String, Vec<Field>>,
}

impl StructRegistry {
    pub fn new() -> Self {
        StructRegistry::default()
    }

    /// Intern a struct type under `name`, returning the `Type::Struct`. If
    /// `name` was already registered with a different layout this is an
    /// error -- struct names are unique identifiers, not hashes.
    pub fn intern(&mut self, name: impl Into<String>, fields: Vec<Field>) -> Type {
        let name = name.into();
        self.by_name.entry(name.clone()).or_insert_with(|| fields.clone());
        Type::Struct {
            name,
            fields: self.by_name[&name].clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_numeric_type_widens() {
        assert_eq!(
            common_numeric_type(GroundType::I32, GroundType::I64),
            Some(GroundType::I64)
        );
        assert_eq!(
            common_numeric_type(GroundType::I32, GroundType::F64),
            Some(GroundType::F64)
        );
        assert_eq!(common_numeric_type(GroundType::Bool, GroundType::Bool), Some(GroundType::Bool));
    }

    #[test]
    fn can_coerce_only_widens() {
        assert!(can_coerce(GroundType::I32, GroundType::I64));
        assert!(!can_coerce(GroundType::I64, GroundType::I32));
        assert!(can_coerce(GroundType::I32, GroundType::I32));
    }

    #[test]
    fn combine_ground_types_picks_common() {
        let t = combine_types(&Type::i32(), &Type::i64()).unwrap();
        assert_eq!(t, Type::i64());
    }

    #[test]
    fn combine_mismatched_rank_arrays_errors() {
        let a = Type::array(Type::i32(), 1);
        let b = Type::array(Type::i32(), 2);
        assert!(combine_types(&a, &b).is_err());
    }

    #[test]
    fn combine_tuples_recurses_elementwise() {
        let a = Type::Tuple(vec![Type::i32(), Type::bool()]);
        let b = Type::Tuple(vec![Type::i64(), Type::bool()]);
        let combined = combine_types(&a, &b).unwrap();
        assert_eq!(combined, Type::Tuple(vec![Type::i64(), Type::bool()]));
    }

    #[test]
    fn array_is_mutable_struct_of_array_is_mutable_ground_is_not() {
        assert!(!Type::i32().is_mutable());
        assert!(Type::array(Type::i32(), 1).is_mutable());
        let s = Type::Struct {
            name: "S".into(),
            fields: vec![Field {
                name: "data".into(),
                ty: Type::array(Type::i32(), 1),
            }],
        };
        assert!(s.is_mutable());
    }

    #[test]
    fn lower_rank_of_rank_one_array_is_scalar() {
        let t = Type::array(Type::f64(), 1);
        assert_eq!(t.lower_rank(), Some(Type::f64()));
        let t2 = Type::array(Type::f64(), 3);
        assert_eq!(t2.lower_rank(), Some(Type::array(Type::f64(), 2)));
    }

    #[test]
    fn struct_registry_interns_by_name() {
        let mut reg = StructRegistry::new();
        let fields = vec![Field {
            name: "arg0".into(),
            ty: Type::i32(),
        }];
        let t1 = reg.intern("Args", fields.clone());
        let t2 = reg.intern("Args", fields);
        assert_eq!(t1, t2);
    }
}
