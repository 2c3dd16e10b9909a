//! Dead code elimination: drops `Assign(Var(name), _)` statements whose
//! name has zero reads anywhere in the function, computed once up front
//! from the whole body so a name used only inside a sibling branch or a
//! φ-merge is correctly kept live.
//!
//! Every primitive and call in this IR is pure and total, so an
//! unread binding can always be dropped outright -- except `While`, which
//! is never removed even when its body and merge end up empty: an
//! infinite loop's only externally observable effect is non-termination,
//! and eliding it would silently change that.

use parajit_ir::{Function, LValue, Stmt};

use crate::error::Result;
use crate::use_count::use_count;
use crate::walker::Phase;

pub struct Dce;

impl Dce {
    pub fn new() -> Self {
        Dce
    }
}

impl Default for Dce {
    fn default() -> Self {
        Self::new()
    }
}

impl Phase for Dce {
    fn apply(&mut self, f: Function) -> Result<(Function, bool)> {
        let counts = use_count(&f);
        let mut changed = false;
        let new_body = sweep_block(&f.body, &counts, &mut changed);
        Ok((Function { body: new_body, ..f }, changed))
    }

    fn name(&self) -> &'static str {
        "dce"
    }
}

fn sweep_block(block: &[Stmt], counts: &std::collections::HashMap<parajit_ir::Name, u32>, changed: &mut bool) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(block.len());
    for stmt in block {
        match stmt {
            Stmt::Assign(LValue::Var(name), _) if counts.get(name).copied().unwrap_or(0) == 0 => {
                *changed = true;
            }
            Stmt::If {
                cond,
                true_block,
                false_block,
                merge,
            } => {
                let new_true = sweep_block(true_block, counts, changed);
                let new_false = sweep_block(false_block, counts, changed);
                if merge.is_empty() && new_true.is_empty() && new_false.is_empty() {
                    *changed = true;
                    continue;
                }
                out.push(Stmt::If {
                    cond: cond.clone(),
                    true_block: new_true,
                    false_block: new_false,
                    merge: merge.clone(),
                });
            }
            Stmt::While { cond, body, merge } => {
                let new_body = sweep_block(body, counts, changed);
                out.push(Stmt::While {
                    cond: cond.clone(),
                    body: new_body,
                    merge: merge.clone(),
                });
            }
            other => out.push(other.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use parajit_ir::{Expr, ExprKind, Formal, Literal, Name, Type};

    #[test]
    fn drops_unused_binding() {
        let dead = Name::original("dead");
        let f = Function {
            name: "f".into(),
            formal_args: Formal::positional_only(vec![]),
            body: vec![
                Stmt::Assign(LValue::Var(dead), Expr::const_(Literal::I32(1))),
                Stmt::Return(Expr::const_(Literal::I32(2))),
            ],
            arg_types: Some(vec![]),
            return_type: Some(Type::i32()),
            arg_names: vec![],
        };
        let mut dce = Dce::new();
        let (out, changed) = dce.apply(f).unwrap();
        assert!(changed);
        assert_eq!(out.body.len(), 1);
    }

    #[test]
    fn keeps_binding_used_only_in_merge() {
        let x = Name::original("x");
        let mut merge = parajit_ir::Merge::new();
        merge.insert(
            Name::original("m"),
            (Expr::typed(ExprKind::Var(x.clone()), Type::i32()), Expr::const_(Literal::I32(0))),
        );
        let f = Function {
            name: "f".into(),
            formal_args: Formal::positional_only(vec!["x".into()]),
            body: vec![
                Stmt::If {
                    cond: Expr::const_(Literal::Bool(true)),
                    true_block: vec![],
                    false_block: vec![],
                    merge,
                },
                Stmt::Return(Expr::typed(ExprKind::Var(Name::original("m")), Type::i32())),
            ],
            arg_types: Some(vec![Type::i32()]),
            return_type: Some(Type::i32()),
            arg_names: vec![x],
        };
        let mut dce = Dce::new();
        let (out, _changed) = dce.apply(f).unwrap();
        assert_eq!(out.body.len(), 2);
    }

    #[test]
    fn while_survives_even_with_empty_body_and_merge() {
        let f = Function {
            name: "f".into(),
            formal_args: Formal::positional_only(vec![]),
            body: vec![
                Stmt::While {
                    cond: Expr::const_(Literal::Bool(true)),
                    body: vec![],
                    merge: parajit_ir::Merge::new(),
                },
                Stmt::Return(Expr::const_(Literal::I32(0))),
            ],
            arg_types: Some(vec![]),
            return_type: Some(Type::i32()),
            arg_names: vec![],
        };
        let mut dce = Dce::new();
        let (out, _changed) = dce.apply(f).unwrap();
        assert!(matches!(out.body[0], Stmt::While { .. }));
    }
}
