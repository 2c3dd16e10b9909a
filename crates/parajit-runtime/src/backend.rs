//! `BackendLowering`: the contract a native codegen backend
//! would implement, and a reference implementation that checks the same
//! four preconditions a real backend's lowering pass would and wraps the
//! typed IR itself as the "compiled" artifact.

use std::collections::HashMap;
use std::sync::Arc;

use parajit_ir::{AdverbExpr, Callee, Expr, ExprKind, Function, Merge, Stmt};

use crate::error::{Error, Result};

/// An opaque, lowering-ready artifact. Real backends would hold generated
/// machine code and a function pointer; the reference implementation
/// holds the typed function plus every typed function it (transitively)
/// calls, so `dispatch` can run it with the tree-walking interpreter.
pub struct CompiledArtifact {
    pub entry: Arc<Function>,
    pub functions: HashMap<String, Arc<Function>>,
}

/// The external-interface contract lowering/codegen exposes to the
/// compiler core: given a fully typed, optimized function meeting
/// the four preconditions below, produce a `CompiledArtifact`.
pub trait BackendLowering {
    fn lower(&self, entry: Arc<Function>, catalog: &dyn Fn(&str) -> Option<Arc<Function>>) -> Result<CompiledArtifact>;
}

/// The reference backend: performs the precondition checks a real
/// lowering stage would perform, then wraps the typed IR as its own
/// compiled artifact. Never generates native code.
#[derive(Debug, Default)]
pub struct ReferenceBackend;

impl ReferenceBackend {
    pub fn new() -> Self {
        ReferenceBackend
    }
}

impl BackendLowering for ReferenceBackend {
    #[tracing::instrument(skip(self, entry, catalog), fields(function = %entry.name))]
    fn lower(&self, entry: Arc<Function>, catalog: &dyn Fn(&str) -> Option<Arc<Function>>) -> Result<CompiledArtifact> {
        check_preconditions(&entry)?;

        let mut functions = HashMap::new();
        let mut pending = vec![entry.clone()];
        while let Some(f) = pending.pop() {
            if functions.contains_key(&f.name) {
                continue;
            }
            check_preconditions(&f)?;
            for name in called_function_names(&f.body) {
                if !functions.contains_key(&name) {
                    if let Some(callee) = catalog(&name) {
                        pending.push(callee);
                    } else {
                        return Err(Error::LoweringPrecondition {
                            function: f.name.clone(),
                            reason: format!("callee '{name}' not found in the typed-function catalog"),
                        });
                    }
                }
            }
            functions.insert(f.name.clone(), f);
        }

        Ok(CompiledArtifact {
            entry,
            functions,
        })
    }
}

/// Precondition (a): every node is typed. (b): loop conditions are
/// simple. (c): merge values are simple. (d): no `Call` remains whose
/// callee is a closure over a typed function (`Callee::Value` wrapping a
/// `Closure`/`ClosureElt`/`Var` -- those must have been rewritten to
/// direct `Callee::Named` calls by Simplify's closure-call rule before
/// lowering).
fn check_preconditions(f: &Function) -> Result<()> {
    if !f.is_typed() {
        return Err(Error::LoweringPrecondition {
            function: f.name.clone(),
            reason: "function has not been specialized (arg_types is None)".into(),
        });
    }
    check_block(&f.name, &f.body)
}

fn check_block(function: &str, block: &[Stmt]) -> Result<()> {
    for stmt in block {
        match stmt {
            Stmt::Assign(_, rhs) => check_expr(function, rhs)?,
            Stmt::Return(e) => check_expr(function, e)?,
            Stmt::If {
                cond,
                true_block,
                false_block,
                merge,
            } => {
                check_expr(function, cond)?;
                check_block(function, true_block)?;
                check_block(function, false_block)?;
                check_merge(function, merge)?;
            }
            Stmt::While { cond, body, merge } => {
                check_simple(function, cond, "loop condition")?;
                check_block(function, body)?;
                check_merge(function, merge)?;
            }
        }
    }
    Ok(())
}

fn check_merge(function: &str, merge: &Merge) -> Result<()> {
    for (name, (left, right)) in merge {
        check_simple(function, left, &format!("merge left value for '{name}'"))?;
        check_simple(function, right, &format!("merge right value for '{name}'"))?;
    }
    Ok(())
}

fn check_simple(function: &str, e: &Expr, what: &str) -> Result<()> {
    check_expr(function, e)?;
    if !e.is_simple() {
        return Err(Error::LoweringPrecondition {
            function: function.to_string(),
            reason: format!("{what} is not simple: {e:?}"),
        });
    }
    Ok(())
}

fn check_expr(function: &str, e: &Expr) -> Result<()> {
    if e.ty.is_none() {
        return Err(Error::LoweringPrecondition {
            function: function.to_string(),
            reason: format!("untyped node remains: {:?}", e.kind),
        });
    }
    match &e.kind {
        ExprKind::Call(Callee::Value(inner), args) => {
            return Err(Error::LoweringPrecondition {
                function: function.to_string(),
                reason: format!("call through closure value remains (callee expr {inner:?}, {} args)", args.len()),
            });
        }
        ExprKind::PrimCall(_, args) | ExprKind::Tuple(args) | ExprKind::Array(args) => {
            for a in args {
                check_expr(function, a)?;
            }
        }
        ExprKind::Call(Callee::Named(_), args) => {
            for a in args {
                check_expr(function, a)?;
            }
        }
        ExprKind::Cast(inner, _) | ExprKind::TupleProj(inner, _) | ExprKind::Attribute(inner, _) | ExprKind::ClosureElt(inner, _) => {
            check_expr(function, inner)?;
        }
        ExprKind::Struct(fields) => {
            for (_, v) in fields {
                check_expr(function, v)?;
            }
        }
        ExprKind::Index(target, index) => {
            check_expr(function, target)?;
            check_expr(function, index)?;
        }
        ExprKind::Slice { start, stop, step } => {
            check_expr(function, start)?;
            check_expr(function, stop)?;
            check_expr(function, step)?;
        }
        ExprKind::ArrayView {
            data,
            shape,
            strides,
            offset,
            total_elts,
        } => {
            check_expr(function, data)?;
            for s in shape.iter().chain(strides).chain(std::iter::once(&**offset)).chain(std::iter::once(&**total_elts)) {
                check_expr(function, s)?;
            }
        }
        ExprKind::Closure { captured_args, .. } => {
            for a in captured_args {
                check_expr(function, a)?;
            }
        }
        ExprKind::Adverb(adverb) => check_adverb(function, adverb)?,
        ExprKind::Const(_) | ExprKind::Var(_) => {}
    }
    Ok(())
}

fn check_adverb(function: &str, adverb: &AdverbExpr) -> Result<()> {
    match adverb {
        AdverbExpr::Map { args, .. } => args.iter().try_for_each(|a| check_expr(function, a)),
        AdverbExpr::AllPairs { x, y, .. } => {
            check_expr(function, x)?;
            check_expr(function, y)
        }
        AdverbExpr::Reduce { args, init, .. } => {
            for a in args {
                check_expr(function, a)?;
            }
            check_expr(function, init)
        }
        AdverbExpr::Scan { args, init, .. } => {
            for a in args {
                check_expr(function, a)?;
            }
            check_expr(function, init)
        }
    }
}

fn called_function_names(block: &[Stmt]) -> Vec<String> {
    let mut out = Vec::new();
    collect_called(block, &mut out);
    out
}

fn collect_called(block: &[Stmt], out: &mut Vec<String>) {
    for stmt in block {
        match stmt {
            Stmt::Assign(_, e) | Stmt::Return(e) => collect_called_expr(e, out),
            Stmt::If {
                cond,
                true_block,
                false_block,
                merge,
            } => {
                collect_called_expr(cond, out);
                collect_called(true_block, out);
                collect_called(false_block, out);
                for (left, right) in merge.values() {
                    collect_called_expr(left, out);
                    collect_called_expr(right, out);
                }
            }
            Stmt::While { cond, body, merge } => {
                collect_called_expr(cond, out);
                collect_called(body, out);
                for (left, right) in merge.values() {
                    collect_called_expr(left, out);
                    collect_called_expr(right, out);
                }
            }
        }
    }
}

fn collect_called_expr(e: &Expr, out: &mut Vec<String>) {
    match &e.kind {
        ExprKind::Call(Callee::Named(name), args) => {
            out.push(name.clone());
            for a in args {
                collect_called_expr(a, out);
            }
        }
        ExprKind::Call(Callee::Value(inner), args) => {
            collect_called_expr(inner, out);
            for a in args {
                collect_called_expr(a, out);
            }
        }
        ExprKind::PrimCall(_, args) | ExprKind::Tuple(args) | ExprKind::Array(args) => {
            for a in args {
                collect_called_expr(a, out);
            }
        }
        ExprKind::Cast(inner, _) | ExprKind::TupleProj(inner, _) | ExprKind::Attribute(inner, _) | ExprKind::ClosureElt(inner, _) => {
            collect_called_expr(inner, out);
        }
        ExprKind::Struct(fields) => {
            for (_, v) in fields {
                collect_called_expr(v, out);
            }
        }
        ExprKind::Index(target, index) => {
            collect_called_expr(target, out);
            collect_called_expr(index, out);
        }
        ExprKind::Slice { start, stop, step } => {
            collect_called_expr(start, out);
            collect_called_expr(stop, out);
            collect_called_expr(step, out);
        }
        ExprKind::ArrayView {
            data,
            shape,
            strides,
            offset,
            total_elts,
        } => {
            collect_called_expr(data, out);
            for s in shape.iter().chain(strides).chain(std::iter::once(&**offset)).chain(std::iter::once(&**total_elts)) {
                collect_called_expr(s, out);
            }
        }
        ExprKind::Closure { captured_args, .. } => {
            for a in captured_args {
                collect_called_expr(a, out);
            }
        }
        ExprKind::Adverb(adverb) => collect_called_adverb(adverb, out),
        ExprKind::Const(_) | ExprKind::Var(_) => {}
    }
}

fn collect_called_adverb(adverb: &AdverbExpr, out: &mut Vec<String>) {
    let push_callee = |c: &Callee, out: &mut Vec<String>| {
        if let Callee::Named(name) = c {
            out.push(name.clone());
        }
    };
    match adverb {
        AdverbExpr::Map { f, args, .. } => {
            push_callee(f, out);
            args.iter().for_each(|a| collect_called_expr(a, out));
        }
        AdverbExpr::AllPairs { f, x, y, .. } => {
            push_callee(f, out);
            collect_called_expr(x, out);
            collect_called_expr(y, out);
        }
        AdverbExpr::Reduce { f, combine, args, init, .. } => {
            push_callee(f, out);
            push_callee(combine, out);
            args.iter().for_each(|a| collect_called_expr(a, out));
            collect_called_expr(init, out);
        }
        AdverbExpr::Scan { f, combine, emit, args, init, .. } => {
            push_callee(f, out);
            push_callee(combine, out);
            push_callee(emit, out);
            args.iter().for_each(|a| collect_called_expr(a, out));
            collect_called_expr(init, out);
        }
    }
}
