//! Statement nodes and the φ-merge map attached to control-flow joins.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::names::Name;

/// An assignment left-hand side. `Tuple` recurses to express destructuring
/// assignment (`(a, b) = pair`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LValue {
    Var(Name),
    Index(Box<Expr>, Box<Expr>),
    Attribute(Box<Expr>, String),
    Tuple(Vec<LValue>),
}

impl LValue {
    /// The single SSA name this lvalue binds, if it is a plain `Var`.
    /// `Index`/`Attribute` targets mutate an existing binding rather than
    /// introducing one, and `Tuple` binds more than one name.
    pub fn as_var(&self) -> Option<&Name> {
        match self {
            LValue::Var(n) => Some(n),
            _ => None,
        }
    }

    /// All SSA names this lvalue binds, recursing through `Tuple`.
    pub fn bound_names(&self) -> Vec<&Name> {
        match self {
            LValue::Var(n) => vec![n],
            LValue::Index(..) | LValue::Attribute(..) => vec![],
            LValue::Tuple(elts) => elts.iter().flat_map(LValue::bound_names).collect(),
        }
    }
}

/// At a control-flow join, the pair of per-branch values a joined name
/// resolves to: `(left, right)` for `If`'s `(true_branch, false_branch)`,
/// `(pre_loop, back_edge)` for `While`.
pub type Merge = IndexMap<Name, (Expr, Expr)>;

/// A basic block: an ordered statement list. Plain `Vec<Stmt>` alias kept
/// named so transform-framework signatures read in terms of "blocks", not bare vectors.
pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Assign(LValue, Expr),
    If {
        cond: Expr,
        true_block: Block,
        false_block: Block,
        merge: Merge,
    },
    While {
        cond: Expr,
        body: Block,
        merge: Merge,
    },
    Return(Expr),
}

impl Stmt {
    pub fn assign(lhs: LValue, rhs: Expr) -> Stmt {
        Stmt::Assign(lhs, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Literal;

    #[test]
    fn tuple_lvalue_collects_all_bound_names() {
        let lv = LValue::Tuple(vec![
            LValue::Var(Name::original("a")),
            LValue::Var(Name::original("b")),
        ]);
        let names: Vec<String> = lv.bound_names().into_iter().map(|n| n.base.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn index_lvalue_binds_no_new_name() {
        let lv = LValue::Index(
            Box::new(Expr::var(Name::original("arr"))),
            Box::new(Expr::const_(Literal::I32(0))),
        );
        assert!(lv.bound_names().is_empty());
        assert!(lv.as_var().is_none());
    }
}
