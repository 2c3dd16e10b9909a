//! `use_count`: a mapping from variable name to number of reads in a
//! function's body. Simplify seeds its live mutable copy from this
//! analysis and decrements it as rewrites fold away reads (dead
//! rhs elision).

use std::collections::HashMap;

use parajit_ir::{Expr, ExprKind, Function, LValue, Name, Stmt};

pub fn use_count(function: &Function) -> HashMap<Name, u32> {
    let mut counts = HashMap::new();
    for stmt in &function.body {
        visit_stmt(stmt, &mut counts);
    }
    counts
}

fn bump(counts: &mut HashMap<Name, u32>, name: &Name) {
    *counts.entry(name.clone()).or_insert(0) += 1;
}

fn visit_stmt(stmt: &Stmt, counts: &mut HashMap<Name, u32>) {
    match stmt {
        Stmt::Assign(lhs, rhs) => {
            visit_lvalue_reads(lhs, counts);
            visit_expr(rhs, counts);
        }
        Stmt::If {
            cond,
            true_block,
            false_block,
            merge,
        } => {
            visit_expr(cond, counts);
            true_block.iter().for_each(|s| visit_stmt(s, counts));
            false_block.iter().for_each(|s| visit_stmt(s, counts));
            for (_, (l, r)) in merge {
                visit_expr(l, counts);
                visit_expr(r, counts);
            }
        }
        Stmt::While { cond, body, merge } => {
            visit_expr(cond, counts);
            body.iter().for_each(|s| visit_stmt(s, counts));
            for (_, (l, r)) in merge {
                visit_expr(l, counts);
                visit_expr(r, counts);
            }
        }
        Stmt::Return(e) => visit_expr(e, counts),
    }
}

/// `Index`/`Attribute` lvalues read their base expression (they mutate
/// through an existing binding rather than rebinding); `Var`/`Tuple`
/// lvalues introduce bindings and read nothing.
fn visit_lvalue_reads(lv: &LValue, counts: &mut HashMap<Name, u32>) {
    match lv {
        LValue::Var(_) => {}
        LValue::Index(base, idx) => {
            visit_expr(base, counts);
            visit_expr(idx, counts);
        }
        LValue::Attribute(base, _) => visit_expr(base, counts),
        LValue::Tuple(elts) => elts.iter().for_each(|e| visit_lvalue_reads(e, counts)),
    }
}

fn visit_expr(expr: &Expr, counts: &mut HashMap<Name, u32>) {
    match &expr.kind {
        ExprKind::Const(_) => {}
        ExprKind::Var(name) => bump(counts, name),
        ExprKind::PrimCall(_, args) | ExprKind::Tuple(args) | ExprKind::Array(args) => {
            args.iter().for_each(|a| visit_expr(a, counts));
        }
        ExprKind::Cast(v, _) => visit_expr(v, counts),
        ExprKind::TupleProj(v, _) => visit_expr(v, counts),
        ExprKind::Struct(fields) => fields.iter().for_each(|(_, v)| visit_expr(v, counts)),
        ExprKind::Attribute(v, _) => visit_expr(v, counts),
        ExprKind::ArrayView {
            data,
            shape,
            strides,
            offset,
            total_elts,
        } => {
            visit_expr(data, counts);
            shape.iter().for_each(|e| visit_expr(e, counts));
            strides.iter().for_each(|e| visit_expr(e, counts));
            visit_expr(offset, counts);
            visit_expr(total_elts, counts);
        }
        ExprKind::Index(base, idx) => {
            visit_expr(base, counts);
            visit_expr(idx, counts);
        }
        ExprKind::Slice { start, stop, step } => {
            visit_expr(start, counts);
            visit_expr(stop, counts);
            visit_expr(step, counts);
        }
        ExprKind::Closure { captured_args, .. } => {
            captured_args.iter().for_each(|e| visit_expr(e, counts));
        }
        ExprKind::ClosureElt(v, _) => visit_expr(v, counts),
        ExprKind::Call(callee, args) => {
            if let parajit_ir::Callee::Value(v) = callee {
                visit_expr(v, counts);
            }
            args.iter().for_each(|a| visit_expr(a, counts));
        }
        ExprKind::Adverb(adverb) => visit_adverb(adverb, counts),
    }
}

fn visit_adverb(adverb: &parajit_ir::AdverbExpr, counts: &mut HashMap<Name, u32>) {
    use parajit_ir::AdverbExpr::*;
    match adverb {
        Map { args, .. } => args.iter().for_each(|a| visit_expr(a, counts)),
        AllPairs { x, y, .. } => {
            visit_expr(x, counts);
            visit_expr(y, counts);
        }
        Reduce { args, init, .. } => {
            args.iter().for_each(|a| visit_expr(a, counts));
            visit_expr(init, counts);
        }
        Scan { args, init, .. } => {
            args.iter().for_each(|a| visit_expr(a, counts));
            visit_expr(init, counts);
        }
    }
}
