//! The shape lattice: abstract values used by shape inference to reason
//! about array rank and dimension without needing concrete runtime shapes.
//!
//! Distinct from the type lattice (`types.rs`), which tracks *what kind* of
//! value a node produces. This lattice tracks *how big* -- the dimension
//! expressions adverb lowering needs to derive output shapes and slice
//! ranges.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::names::Name;

/// Arithmetic combinator over dimension expressions, e.g. `dim(x, 0) + 1`
/// when `increase_rank` inserts a computed dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeBinop {
    Add,
    Sub,
    Mul,
    Max,
    Min,
}

impl std::fmt::Display for ShapeBinop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ShapeBinop::Add => "+",
            ShapeBinop::Sub => "-",
            ShapeBinop::Mul => "*",
            ShapeBinop::Max => "max",
            ShapeBinop::Min => "min",
        };
        write!(f, "{}", s)
    }
}

/// An abstract value in the shape lattice. Top is `Unknown`; `combine` is
/// the meet operator used whenever two paths (branches, recursive calls,
/// repeated adverb applications) produce a dimension and the analysis must
/// reconcile them into one abstract value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AbstractValue {
    /// No information at all. Identity element of `combine`.
    Unknown,
    /// Known to be a scalar (rank 0) but the concrete value is unknown.
    UnknownScalar,
    /// A known constant dimension or scalar value.
    Const(i64),
    /// A symbolic dimension tied to a named SSA variable (e.g. a formal
    /// argument's length, not yet reduced to a constant).
    Var(Name),
    /// A computed dimension expression, e.g. `dim(x,0) + dim(y,0)`.
    Binop(ShapeBinop, Box<AbstractValue>, Box<AbstractValue>),
    /// The per-axis dimensions of an array, outermost axis first.
    Shape(Vec<AbstractValue>),
    /// The abstract values of a tuple's elements.
    Tuple(Vec<AbstractValue>),
    /// The abstract value of a slice's backing element shape.
    Slice(Box<AbstractValue>),
    /// A closure's abstract value: the callee name plus the abstract values
    /// of its captured arguments, matching the type lattice's `Closure`.
    Closure(String, Vec<AbstractValue>),
}

impl AbstractValue {
    pub fn rank(&self) -> Option<usize> {
        match self {
            AbstractValue::Shape(dims) => Some(dims.len()),
            AbstractValue::Unknown | AbstractValue::UnknownScalar => None,
            _ => Some(0),
        }
    }

    /// Combine (meet) two abstract values reaching the same program point
    /// from different derivations:
    /// - `Unknown` is the identity.
    /// - Equal values meet to themselves.
    /// - Unequal `Const`s collapse to `UnknownScalar`.
    /// - Composite categories recurse component-wise when shapes agree.
    /// - Mismatched categories (or mismatched rank/arity within a category)
    ///   are a [`Error::ValueMismatch`].
    pub fn combine(&self, other: &AbstractValue) -> Result<AbstractValue> {
        use AbstractValue::*;
        match (self, other) {
            (Unknown, x) | (x, Unknown) => Ok(x.clone()),
            (a, b) if a == b => Ok(a.clone()),
            (Const(_), Const(_)) => Ok(UnknownScalar),
            (UnknownScalar, Const(_)) | (Const(_), UnknownScalar) => Ok(UnknownScalar),
            (UnknownScalar, UnknownScalar) => Ok(UnknownScalar),
            (Var(_), Const(_))
            | (Const(_), Var(_))
            | (Var(_), UnknownScalar)
            | (UnknownScalar, Var(_))
            | (Var(_), Var(_)) => Ok(UnknownScalar),
            (Binop(op_a, la, ra), Binop(op_b, lb, rb)) if op_a == op_b => Ok(Binop(
                *op_a,
                Box::new(la.combine(lb)?),
                Box::new(ra.combine(rb)?),
            )),
            (Binop(..), _) | (_, Binop(..)) => Ok(UnknownScalar),
            (Shape(da), Shape(db)) if da.len() == db.len() => {
                let combined: Result<Vec<AbstractValue>> = da
                    .iter()
                    .zip(db.iter())
                    .map(|(x, y)| x.combine(y))
                    .collect();
                Ok(Shape(combined?))
            }
            (Tuple(ea), Tuple(eb)) if ea.len() == eb.len() => {
                let combined: Result<Vec<AbstractValue>> = ea
                    .iter()
                    .zip(eb.iter())
                    .map(|(x, y)| x.combine(y))
                    .collect();
                Ok(Tuple(combined?))
            }
            (Slice(a), Slice(b)) => Ok(Slice(Box::new(a.combine(b)?))),
            (Closure(fa, ca), Closure(fb, cb)) if fa == fb && ca.len() == cb.len() => {
                let combined: Result<Vec<AbstractValue>> = ca
                    .iter()
                    .zip(cb.iter())
                    .map(|(x, y)| x.combine(y))
                    .collect();
                Ok(Closure(fa.clone(), combined?))
            }
            _ => Err(Error::ValueMismatch(self.clone(), other.clone())),
        }
    }
}

impl std::fmt::Display for AbstractValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbstractValue::Unknown => write!(f, "?"),
            AbstractValue::UnknownScalar => write!(f, "?scalar"),
            AbstractValue::Const(v) => write!(f, "{}", v),
            AbstractValue::Var(n) => write!(f, "{}", n),
            AbstractValue::Binop(op, l, r) => write!(f, "({} {} {})", l, op, r),
            AbstractValue::Shape(dims) => {
                write!(f, "shape[")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", d)?;
                }
                write!(f, "]")
            }
            AbstractValue::Tuple(elts) => {
                write!(f, "(")?;
                for (i, e) in elts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            AbstractValue::Slice(e) => write!(f, "slice[{}]", e),
            AbstractValue::Closure(name, caps) => {
                write!(f, "closure<{}>[", name)?;
                for (i, c) in caps.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// The dimension at axis `k` of a `Shape` abstract value. `None` if `self`
/// is not a `Shape` or `k` is out of range.
pub fn dim(shape: &AbstractValue, k: usize) -> Option<AbstractValue> {
    match shape {
        AbstractValue::Shape(dims) => dims.get(k).cloned(),
        _ => None,
    }
}

/// Remove `axis` from a shape, the abstract-value counterpart of
/// `Type::lower_rank`: a rank-1 shape reduces to a scalar (`UnknownScalar`),
/// removing an axis from a higher-rank shape drops that one dimension.
pub fn lower_rank(shape: &AbstractValue, axis: usize) -> Result<AbstractValue> {
    match shape {
        AbstractValue::Shape(dims) if axis < dims.len() => {
            if dims.len() == 1 {
                Ok(AbstractValue::UnknownScalar)
            } else {
                let mut rest = dims.clone();
                rest.remove(axis);
                Ok(AbstractValue::Shape(rest))
            }
        }
        AbstractValue::Shape(_) => Err(Error::ValueMismatch(
            shape.clone(),
            AbstractValue::Const(axis as i64),
        )),
        _ => Err(Error::ValueMismatch(shape.clone(), AbstractValue::Unknown)),
    }
}

/// Insert `dim_expr` as a new dimension at `axis`, widening a shape by one
/// rank (or turning a scalar into a rank-1 shape when `axis == 0`).
pub fn increase_rank(
    shape: &AbstractValue,
    axis: usize,
    dim_expr: AbstractValue,
) -> Result<AbstractValue> {
    match shape {
        AbstractValue::Shape(dims) if axis <= dims.len() => {
            let mut widened = dims.clone();
            widened.insert(axis, dim_expr);
            Ok(AbstractValue::Shape(widened))
        }
        AbstractValue::UnknownScalar | AbstractValue::Unknown if axis == 0 => {
            Ok(AbstractValue::Shape(vec![dim_expr]))
        }
        _ => Err(Error::ValueMismatch(shape.clone(), dim_expr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_is_identity() {
        let v = AbstractValue::Const(3);
        assert_eq!(AbstractValue::Unknown.combine(&v).unwrap(), v);
        assert_eq!(v.combine(&AbstractValue::Unknown).unwrap(), v);
    }

    #[test]
    fn equal_consts_meet_to_themselves() {
        let v = AbstractValue::Const(5);
        assert_eq!(v.combine(&v).unwrap(), v);
    }

    #[test]
    fn unequal_consts_meet_to_unknown_scalar() {
        let a = AbstractValue::Const(1);
        let b = AbstractValue::Const(2);
        assert_eq!(a.combine(&b).unwrap(), AbstractValue::UnknownScalar);
    }

    #[test]
    fn mismatched_categories_error() {
        let shape = AbstractValue::Shape(vec![AbstractValue::Const(1)]);
        let tuple = AbstractValue::Tuple(vec![AbstractValue::Const(1)]);
        assert!(shape.combine(&tuple).is_err());
    }

    #[test]
    fn combine_is_commutative_on_sample_values() {
        let samples = vec![
            AbstractValue::Unknown,
            AbstractValue::UnknownScalar,
            AbstractValue::Const(1),
            AbstractValue::Const(2),
            AbstractValue::Shape(vec![AbstractValue::Const(1), AbstractValue::Const(2)]),
        ];
        for a in &samples {
            for b in &samples {
                let ab = a.combine(b);
                let ba = b.combine(a);
                assert_eq!(ab.is_ok(), ba.is_ok());
                if let (Ok(x), Ok(y)) = (ab, ba) {
                    assert_eq!(x, y, "combine not commutative for {:?} / {:?}", a, b);
                }
            }
        }
    }

    #[test]
    fn combine_is_idempotent() {
        let shape = AbstractValue::Shape(vec![AbstractValue::Const(4)]);
        assert_eq!(shape.combine(&shape).unwrap(), shape);
    }

    #[test]
    fn lower_rank_of_rank_one_is_scalar() {
        let shape = AbstractValue::Shape(vec![AbstractValue::Const(4)]);
        assert_eq!(lower_rank(&shape, 0).unwrap(), AbstractValue::UnknownScalar);
    }

    #[test]
    fn lower_rank_drops_one_axis() {
        let shape = AbstractValue::Shape(vec![AbstractValue::Const(2), AbstractValue::Const(3)]);
        assert_eq!(
            lower_rank(&shape, 0).unwrap(),
            AbstractValue::Shape(vec![AbstractValue::Const(3)])
        );
    }

    #[test]
    fn increase_rank_inserts_dimension() {
        let shape = AbstractValue::Shape(vec![AbstractValue::Const(3)]);
        let widened = increase_rank(&shape, 0, AbstractValue::Const(7)).unwrap();
        assert_eq!(
            widened,
            AbstractValue::Shape(vec![AbstractValue::Const(7), AbstractValue::Const(3)])
        );
    }

    #[test]
    fn dim_reads_axis() {
        let shape = AbstractValue::Shape(vec![AbstractValue::Const(2), AbstractValue::Const(3)]);
        assert_eq!(dim(&shape, 1), Some(AbstractValue::Const(3)));
        assert_eq!(dim(&shape, 5), None);
    }

    fn abstract_value_strategy() -> impl proptest::strategy::Strategy<Value = AbstractValue> {
        use proptest::prelude::*;
        let leaf = prop_oneof![
            Just(AbstractValue::Unknown),
            Just(AbstractValue::UnknownScalar),
            (-4i64..=4).prop_map(AbstractValue::Const),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 1..4).prop_map(AbstractValue::Shape),
                proptest::collection::vec(inner, 1..4).prop_map(AbstractValue::Tuple),
            ]
        })
    }

    proptest::proptest! {
        /// `combine` is commutative, associative, idempotent;
        /// `Unknown` is an identity." Commutativity and identity over
        /// arbitrarily generated lattice values (mismatched shapes/tuples
        /// legitimately error in both orders, which is what the `is_ok`
        /// comparison checks for).
        #[test]
        fn combine_is_commutative(a in abstract_value_strategy(), b in abstract_value_strategy()) {
            let ab = a.combine(&b);
            let ba = b.combine(&a);
            proptest::prop_assert_eq!(ab.is_ok(), ba.is_ok());
            if let (Ok(x), Ok(y)) = (ab, ba) {
                proptest::prop_assert_eq!(x, y);
            }
        }

        #[test]
        fn combine_is_idempotent_prop(a in abstract_value_strategy()) {
            proptest::prop_assert_eq!(a.combine(&a).unwrap(), a);
        }

        #[test]
        fn unknown_is_identity_prop(a in abstract_value_strategy()) {
            proptest::prop_assert_eq!(AbstractValue::Unknown.combine(&a).unwrap(), a.clone());
            proptest::prop_assert_eq!(a.combine(&AbstractValue::Unknown).unwrap(), a);
        }

        /// Associativity holds whenever all three pairwise combinations are
        /// defined -- mismatched categories are free to fail unassociated,
        /// same as two-argument `combine` is free to error on a mismatch.
        #[test]
        fn combine_is_associative_when_defined(
            a in abstract_value_strategy(),
            b in abstract_value_strategy(),
            c in abstract_value_strategy(),
        ) {
            let left = a.combine(&b).and_then(|ab| ab.combine(&c));
            let right = b.combine(&c).and_then(|bc| a.combine(&bc));
            if let (Ok(l), Ok(r)) = (&left, &right) {
                proptest::prop_assert_eq!(l, r);
            }
        }
    }
}
