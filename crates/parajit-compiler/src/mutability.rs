//! `TypeBasedMutabilityAnalysis`: the set of types whose instances may be
//! observably mutated, derived purely from each typed node's `ty` field
//!. Backs the `immutable(e)` predicate Simplify uses to gate CSE
//! and argument-flattening admission.

use parajit_ir::{Expr, ExprKind, Function, LValue, Stmt, Type};

/// The result of running the mutability analysis over a typed function:
/// every distinct type observed in the function that [`Type::is_mutable`]
/// considers mutable (arrays, slices, and structs transitively containing
/// one). A pure function over a typed function; re-run per pass
/// invocation rather than cached, since passes may introduce or
/// drop nodes between runs.
#[derive(Debug, Default)]
pub struct TypeBasedMutabilityAnalysis {
    mutable_types: Vec<Type>,
}

impl TypeBasedMutabilityAnalysis {
    pub fn run(function: &Function) -> Self {
        let mut analysis = TypeBasedMutabilityAnalysis::default();
        for stmt in &function.body {
            analysis.visit_stmt(stmt);
        }
        analysis
    }

    pub fn mutable_types(&self) -> &[Type] {
        &self.mutable_types
    }

    fn record(&mut self, ty: &Type) {
        if ty.is_mutable() && !self.mutable_types.contains(ty) {
            self.mutable_types.push(ty.clone());
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign(lhs, rhs) => {
                self.visit_lvalue(lhs);
                self.visit_expr(rhs);
            }
            Stmt::If {
                cond,
                true_block,
                false_block,
                merge,
            } => {
                self.visit_expr(cond);
                for s in true_block {
                    self.visit_stmt(s);
                }
                for s in false_block {
                    self.visit_stmt(s);
                }
                for (l, r) in merge.values() {
                    self.visit_expr(l);
                    self.visit_expr(r);
                }
            }
            Stmt::While { cond, body, merge } => {
                self.visit_expr(cond);
                for s in body {
                    self.visit_stmt(s);
                }
                for (l, r) in merge.values() {
                    self.visit_expr(l);
                    self.visit_expr(r);
                }
            }
            Stmt::Return(e) => self.visit_expr(e),
        }
    }

    fn visit_lvalue(&mut self, lv: &LValue) {
        match lv {
            LValue::Var(_) => {}
            LValue::Index(base, idx) => {
                self.visit_expr(base);
                self.visit_expr(idx);
            }
            LValue::Attribute(base, _) => self.visit_expr(base),
            LValue::Tuple(elts) => elts.iter().for_each(|e| self.visit_lvalue(e)),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        if let Some(ty) = &expr.ty {
            self.record(ty);
        }
        match &expr.kind {
            ExprKind::Const(_) | ExprKind::Var(_) => {}
            ExprKind::PrimCall(_, args) | ExprKind::Tuple(args) | ExprKind::Array(args) => {
                args.iter().for_each(|a| self.visit_expr(a));
            }
            ExprKind::Cast(v, _) => self.visit_expr(v),
            ExprKind::TupleProj(v, _) => self.visit_expr(v),
            ExprKind::Struct(fields) => fields.iter().for_each(|(_, v)| self.visit_expr(v)),
            ExprKind::Attribute(v, _) => self.visit_expr(v),
            ExprKind::ArrayView {
                data,
                shape,
                strides,
                offset,
                total_elts,
            } => {
                self.visit_expr(data);
                shape.iter().for_each(|e| self.visit_expr(e));
                strides.iter().for_each(|e| self.visit_expr(e));
                self.visit_expr(offset);
                self.visit_expr(total_elts);
            }
            ExprKind::Index(base, idx) => {
                self.visit_expr(base);
                self.visit_expr(idx);
            }
            ExprKind::Slice { start, stop, step } => {
                self.visit_expr(start);
                self.visit_expr(stop);
                self.visit_expr(step);
            }
            ExprKind::Closure { captured_args, .. } => {
                captured_args.iter().for_each(|e| self.visit_expr(e));
            }
            ExprKind::ClosureElt(v, _) => self.visit_expr(v),
            ExprKind::Call(callee, args) => {
                if let parajit_ir::Callee::Value(v) = callee {
                    self.visit_expr(v);
                }
                args.iter().for_each(|a| self.visit_expr(a));
            }
            ExprKind::Adverb(adverb) => self.visit_adverb(adverb),
        }
    }

    fn visit_adverb(&mut self, adverb: &parajit_ir::AdverbExpr) {
        use parajit_ir::AdverbExpr::*;
        match adverb {
            Map { args, .. } => args.iter().for_each(|a| self.visit_expr(a)),
            AllPairs { x, y, .. } => {
                self.visit_expr(x);
                self.visit_expr(y);
            }
            Reduce { args, init, .. } => {
                args.iter().for_each(|a| self.visit_expr(a));
                self.visit_expr(init);
            }
            Scan { args, init, .. } => {
                args.iter().for_each(|a| self.visit_expr(a));
                self.visit_expr(init);
            }
        }
    }
}
