//! The Inliner: replaces a statement-level call to a small typed
//! function with an α-renamed copy of its body, binding formals via
//! `Assign` and rewriting its terminal `Return` into an assignment to the
//! call site's own destination.
//!
//! Only statement-level call sites are inlined -- `y = f(args)` and a
//! trailing `return f(args)` -- since Simplify's argument-normalization
//! already hoists any call appearing as a sub-expression into exactly that
//! shape before the Inliner ever sees it (`transform_args`).

use std::collections::{HashMap, HashSet};

use parajit_ir::{Callee, Expr, ExprKind, Function, LValue, Merge, Name, NameSupply, Stmt, TypedFunctionCache, Type};

use crate::error::Result;
use crate::walker::Phase;

/// Default cap on callee body size (top-level statements) eligible for
/// inlining. Keeps the pipeline's fixpoint iteration bounded on deeply
/// recursive call graphs -- a function just under the cap inlined into a
/// dozen call sites would otherwise blow up body size geometrically.
pub const DEFAULT_MAX_INLINE_SIZE: usize = 8;

pub struct Inliner<'a> {
    names: &'a NameSupply,
    typed_functions: &'a TypedFunctionCache,
    max_inline_size: usize,
}

impl<'a> Inliner<'a> {
    pub fn new(names: &'a NameSupply, typed_functions: &'a TypedFunctionCache) -> Self {
        Inliner {
            names,
            typed_functions,
            max_inline_size: DEFAULT_MAX_INLINE_SIZE,
        }
    }

    pub fn with_max_size(mut self, max_inline_size: usize) -> Self {
        self.max_inline_size = max_inline_size;
        self
    }

    fn try_inline(&self, caller_name: &str, callee_name: &str, args: &[Expr]) -> Option<(Vec<Stmt>, Expr)> {
        if callee_name == caller_name {
            return None; // no self-recursive inlining
        }
        let arg_types: Vec<Type> = args.iter().map(|a| a.ty.clone().unwrap()).collect();
        let callee = self.typed_functions.get(callee_name, &arg_types)?;
        if callee.body.len() > self.max_inline_size {
            return None;
        }

        let bound = collect_bound_names(&callee.body);
        let mut subst: HashMap<Name, Name> = HashMap::new();
        for name in callee.arg_names.iter().chain(bound.iter()) {
            subst
                .entry(name.clone())
                .or_insert_with(|| self.names.fresh(name.base.clone()));
        }

        let mut renamed_body: Vec<Stmt> = callee.body.iter().map(|s| rename_stmt(s, &subst)).collect();
        let return_expr = match renamed_body.pop() {
            Some(Stmt::Return(e)) => e,
            Some(other) => {
                // Body doesn't end in a bare Return -- not inlinable under
                // our no-early-return assumption; put it back and bail.
                renamed_body.push(other);
                return None;
            }
            None => return None,
        };

        let mut prologue = Vec::with_capacity(callee.arg_names.len() + renamed_body.len());
        for (formal, arg) in callee.arg_names.iter().zip(args.iter()) {
            let renamed_formal = subst.get(formal).cloned().unwrap_or_else(|| formal.clone());
            prologue.push(Stmt::Assign(LValue::Var(renamed_formal), arg.clone()));
        }
        prologue.extend(renamed_body);

        Some((prologue, return_expr))
    }

    fn inline_block(&self, caller_name: &str, block: &[Stmt], changed: &mut bool) -> Vec<Stmt> {
        let mut out = Vec::with_capacity(block.len());
        for stmt in block {
            match stmt {
                Stmt::Assign(lhs, rhs) => {
                    if let ExprKind::Call(Callee::Named(callee_name), args) = &rhs.kind {
                        if let Some((prologue, value)) = self.try_inline(caller_name, callee_name, args) {
                            out.extend(prologue);
                            out.push(Stmt::Assign(lhs.clone(), value));
                            *changed = true;
                            continue;
                        }
                    }
                    out.push(stmt.clone());
                }
                Stmt::Return(rhs) => {
                    if let ExprKind::Call(Callee::Named(callee_name), args) = &rhs.kind {
                        if let Some((prologue, value)) = self.try_inline(caller_name, callee_name, args) {
                            out.extend(prologue);
                            out.push(Stmt::Return(value));
                            *changed = true;
                            continue;
                        }
                    }
                    out.push(stmt.clone());
                }
                Stmt::If {
                    cond,
                    true_block,
                    false_block,
                    merge,
                } => {
                    let new_true = self.inline_block(caller_name, true_block, changed);
                    let new_false = self.inline_block(caller_name, false_block, changed);
                    out.push(Stmt::If {
                        cond: cond.clone(),
                        true_block: new_true,
                        false_block: new_false,
                        merge: merge.clone(),
                    });
                }
                Stmt::While { cond, body, merge } => {
                    let new_body = self.inline_block(caller_name, body, changed);
                    out.push(Stmt::While {
                        cond: cond.clone(),
                        body: new_body,
                        merge: merge.clone(),
                    });
                }
            }
        }
        out
    }
}

impl<'a> Phase for Inliner<'a> {
    fn apply(&mut self, f: Function) -> Result<(Function, bool)> {
        let mut changed = false;
        let new_body = self.inline_block(&f.name, &f.body, &mut changed);
        Ok((Function { body: new_body, ..f }, changed))
    }

    fn name(&self) -> &'static str {
        "inline"
    }
}

fn collect_bound_names(body: &[Stmt]) -> HashSet<Name> {
    let mut out = HashSet::new();
    for stmt in body {
        collect_stmt(stmt, &mut out);
    }
    out
}

fn collect_stmt(stmt: &Stmt, out: &mut HashSet<Name>) {
    match stmt {
        Stmt::Assign(lhs, _) => {
            out.extend(lhs.bound_names().into_iter().cloned());
        }
        Stmt::If {
            true_block,
            false_block,
            merge,
            ..
        } => {
            out.extend(merge.keys().cloned());
            true_block.iter().for_each(|s| collect_stmt(s, out));
            false_block.iter().for_each(|s| collect_stmt(s, out));
        }
        Stmt::While { body, merge, .. } => {
            out.extend(merge.keys().cloned());
            body.iter().for_each(|s| collect_stmt(s, out));
        }
        Stmt::Return(_) => {}
    }
}

fn rename_name(name: &Name, subst: &HashMap<Name, Name>) -> Name {
    subst.get(name).cloned().unwrap_or_else(|| name.clone())
}

fn rename_stmt(stmt: &Stmt, subst: &HashMap<Name, Name>) -> Stmt {
    match stmt {
        Stmt::Assign(lhs, rhs) => Stmt::Assign(rename_lvalue(lhs, subst), rename_expr(rhs, subst)),
        Stmt::If {
            cond,
            true_block,
            false_block,
            merge,
        } => Stmt::If {
            cond: rename_expr(cond, subst),
            true_block: true_block.iter().map(|s| rename_stmt(s, subst)).collect(),
            false_block: false_block.iter().map(|s| rename_stmt(s, subst)).collect(),
            merge: rename_merge(merge, subst),
        },
        Stmt::While { cond, body, merge } => Stmt::While {
            cond: rename_expr(cond, subst),
            body: body.iter().map(|s| rename_stmt(s, subst)).collect(),
            merge: rename_merge(merge, subst),
        },
        Stmt::Return(e) => Stmt::Return(rename_expr(e, subst)),
    }
}

fn rename_merge(merge: &Merge, subst: &HashMap<Name, Name>) -> Merge {
    merge
        .iter()
        .map(|(n, (l, r))| {
            (
                rename_name(n, subst),
                (rename_expr(l, subst), rename_expr(r, subst)),
            )
        })
        .collect()
}

fn rename_lvalue(lv: &LValue, subst: &HashMap<Name, Name>) -> LValue {
    match lv {
        LValue::Var(n) => LValue::Var(rename_name(n, subst)),
        LValue::Index(base, idx) => {
            LValue::Index(Box::new(rename_expr(base, subst)), Box::new(rename_expr(idx, subst)))
        }
        LValue::Attribute(base, field) => LValue::Attribute(Box::new(rename_expr(base, subst)), field.clone()),
        LValue::Tuple(elts) => LValue::Tuple(elts.iter().map(|e| rename_lvalue(e, subst)).collect()),
    }
}

fn rename_expr(expr: &Expr, subst: &HashMap<Name, Name>) -> Expr {
    let kind = match &expr.kind {
        ExprKind::Const(lit) => ExprKind::Const(*lit),
        ExprKind::Var(n) => ExprKind::Var(rename_name(n, subst)),
        ExprKind::PrimCall(prim, args) => {
            ExprKind::PrimCall(*prim, args.iter().map(|a| rename_expr(a, subst)).collect())
        }
        ExprKind::Cast(v, t) => ExprKind::Cast(Box::new(rename_expr(v, subst)), t.clone()),
        ExprKind::Tuple(elts) => ExprKind::Tuple(elts.iter().map(|e| rename_expr(e, subst)).collect()),
        ExprKind::TupleProj(v, i) => ExprKind::TupleProj(Box::new(rename_expr(v, subst)), *i),
        ExprKind::Struct(fields) => ExprKind::Struct(
            fields.iter().map(|(n, e)| (n.clone(), rename_expr(e, subst))).collect(),
        ),
        ExprKind::Attribute(v, f) => ExprKind::Attribute(Box::new(rename_expr(v, subst)), f.clone()),
        ExprKind::Array(elts) => ExprKind::Array(elts.iter().map(|e| rename_expr(e, subst)).collect()),
        ExprKind::ArrayView {
            data,
            shape,
            strides,
            offset,
            total_elts,
        } => ExprKind::ArrayView {
            data: Box::new(rename_expr(data, subst)),
            shape: shape.iter().map(|e| rename_expr(e, subst)).collect(),
            strides: strides.iter().map(|e| rename_expr(e, subst)).collect(),
            offset: Box::new(rename_expr(offset, subst)),
            total_elts: Box::new(rename_expr(total_elts, subst)),
        },
        ExprKind::Index(base, idx) => {
            ExprKind::Index(Box::new(rename_expr(base, subst)), Box::new(rename_expr(idx, subst)))
        }
        ExprKind::Slice { start, stop, step } => ExprKind::Slice {
            start: Box::new(rename_expr(start, subst)),
            stop: Box::new(rename_expr(stop, subst)),
            step: Box::new(rename_expr(step, subst)),
        },
        ExprKind::Closure { callee, captured_args } => ExprKind::Closure {
            callee: callee.clone(),
            captured_args: captured_args.iter().map(|e| rename_expr(e, subst)).collect(),
        },
        ExprKind::ClosureElt(v, i) => ExprKind::ClosureElt(Box::new(rename_expr(v, subst)), *i),
        ExprKind::Call(callee, args) => ExprKind::Call(
            match callee {
                Callee::Named(n) => Callee::Named(n.clone()),
                Callee::Value(v) => Callee::Value(Box::new(rename_expr(v, subst))),
            },
            args.iter().map(|a| rename_expr(a, subst)).collect(),
        ),
        ExprKind::Adverb(adverb) => ExprKind::Adverb(Box::new(rename_adverb(adverb, subst))),
    };
    Expr {
        kind,
        ty: expr.ty.clone(),
    }
}

fn rename_adverb(adverb: &parajit_ir::AdverbExpr, subst: &HashMap<Name, Name>) -> parajit_ir::AdverbExpr {
    use parajit_ir::AdverbExpr::*;
    match adverb {
        Map { f, args, axis } => Map {
            f: f.clone(),
            args: args.iter().map(|a| rename_expr(a, subst)).collect(),
            axis: *axis,
        },
        AllPairs { f, x, y, axis } => AllPairs {
            f: f.clone(),
            x: rename_expr(x, subst),
            y: rename_expr(y, subst),
            axis: *axis,
        },
        Reduce {
            f,
            combine,
            args,
            init,
            axis,
        } => Reduce {
            f: f.clone(),
            combine: combine.clone(),
            args: args.iter().map(|a| rename_expr(a, subst)).collect(),
            init: rename_expr(init, subst),
            axis: *axis,
        },
        Scan {
            f,
            combine,
            emit,
            args,
            init,
            axis,
        } => Scan {
            f: f.clone(),
            combine: combine.clone(),
            emit: emit.clone(),
            args: args.iter().map(|a| rename_expr(a, subst)).collect(),
            init: rename_expr(init, subst),
            axis: *axis,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parajit_ir::{Formal, Literal, Prim};

    fn add_one_typed() -> Function {
        let x = Name::original("x");
        Function {
            name: "add_one".into(),
            formal_args: Formal::positional_only(vec!["x".into()]),
            body: vec![Stmt::Return(Expr::typed(
                ExprKind::PrimCall(
                    Prim::Add,
                    vec![Expr::typed(ExprKind::Var(x.clone()), Type::i32()), Expr::const_(Literal::I32(1))],
                ),
                Type::i32(),
            ))],
            arg_types: Some(vec![Type::i32()]),
            return_type: Some(Type::i32()),
            arg_names: vec![x],
        }
    }

    #[test]
    fn inlines_statement_level_call_and_binds_formal() {
        let cache = TypedFunctionCache::new();
        cache.insert(vec![Type::i32()], add_one_typed());
        let names = NameSupply::new();
        let mut inliner = Inliner::new(&names, &cache);

        let y = Name::original("y");
        let caller = Function {
            name: "caller".into(),
            formal_args: Formal::positional_only(vec!["a".into()]),
            body: vec![
                Stmt::Assign(
                    LValue::Var(y.clone()),
                    Expr::typed(
                        ExprKind::Call(
                            Callee::Named("add_one".into()),
                            vec![Expr::typed(ExprKind::Var(Name::original("a")), Type::i32())],
                        ),
                        Type::i32(),
                    ),
                ),
                Stmt::Return(Expr::typed(ExprKind::Var(y), Type::i32())),
            ],
            arg_types: Some(vec![Type::i32()]),
            return_type: Some(Type::i32()),
            arg_names: vec![Name::original("a")],
        };

        let (out, changed) = inliner.apply(caller).unwrap();
        assert!(changed);
        // formal-binding Assign + the inlined PrimCall Assign + the original y Assign + Return = 4
        assert_eq!(out.body.len(), 4);
        assert!(!out
            .body
            .iter()
            .any(|s| matches!(s, Stmt::Assign(_, e) if matches!(e.kind, ExprKind::Call(..)))));
    }

    #[test]
    fn refuses_self_recursive_inline() {
        let cache = TypedFunctionCache::new();
        let names = NameSupply::new();
        let mut inliner = Inliner::new(&names, &cache);
        let f = Function {
            name: "rec".into(),
            formal_args: Formal::positional_only(vec!["x".into()]),
            body: vec![Stmt::Return(Expr::typed(
                ExprKind::Call(
                    Callee::Named("rec".into()),
                    vec![Expr::typed(ExprKind::Var(Name::original("x")), Type::i32())],
                ),
                Type::i32(),
            ))],
            arg_types: Some(vec![Type::i32()]),
            return_type: Some(Type::i32()),
            arg_names: vec![Name::original("x")],
        };
        let (out, changed) = inliner.apply(f).unwrap();
        assert!(!changed);
        assert!(matches!(&out.body[0], Stmt::Return(e) if matches!(e.kind, ExprKind::Call(..))));
    }
}
