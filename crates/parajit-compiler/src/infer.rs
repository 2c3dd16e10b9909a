//! Type and shape inference: the specializer that, given an untyped
//! function and an ordered tuple of argument types, produces a typed
//! function and caches it.

use std::collections::HashMap;
use std::sync::Arc;

use parajit_ir::{
    bind, combine_types, AdverbExpr, AdverbKind, Actual, Callee, Expr, ExprKind, Function, LValue,
    Merge, Name, Stmt, Type, TypedFunctionCache, UntypedFunctionRegistry,
};

use crate::error::{Error, Result};

/// A type environment: the types bound to each SSA name visible at the
/// current point in the walk. Plain `HashMap` rather than `ScopedMap`
/// because SSA names never collide across branches -- each branch mints
/// its own distinct versioned names, so there is nothing to shadow; a
/// flat map accumulating bindings as they're produced is sufficient and
/// matches how the merge map itself reconciles divergent branches.
type TypeEnv = HashMap<Name, Type>;

/// Specializes untyped functions against concrete argument-type tuples,
/// consulting and populating the shared [`TypedFunctionCache`].
pub struct Specializer<'a> {
    pub untyped: &'a UntypedFunctionRegistry,
    pub cache: &'a TypedFunctionCache,
}

impl<'a> Specializer<'a> {
    pub fn new(untyped: &'a UntypedFunctionRegistry, cache: &'a TypedFunctionCache) -> Self {
        Specializer { untyped, cache }
    }

    /// Specialize `name` over `arg_types`. Cache hit returns immediately;
    /// cache miss performs abstract interpretation over the body and
    /// registers the result.
    #[tracing::instrument(skip(self), fields(function = %name))]
    pub fn specialize(&self, name: &str, arg_types: &[Type]) -> Result<Arc<Function>> {
        if let Some(hit) = self.cache.get(name, arg_types) {
            tracing::debug!("specialization cache hit");
            return Ok(hit);
        }
        tracing::debug!("specialization cache miss");
        let untyped = self
            .untyped
            .get(name)
            .map_err(|_| Error::UnknownFunction(name.to_string()))?;
        let typed = infer_function(&untyped, arg_types)?;
        Ok(self.cache.insert(arg_types.to_vec(), typed))
    }
}

/// Perform abstract interpretation over the untyped body and emit a
/// typed copy of `function`.
pub fn infer_function(function: &Function, arg_types: &[Type]) -> Result<Function> {
    // Call sites hand the specializer an ordered, purely positional
    // argument-type tuple (no keyword types flow through `Specializer`
    // yet), so the actual bundle built from it is positional-only. `bind`
    // still does the real work of resolving it against `formal_args`:
    // positional args fill positional formals left to right, and any
    // positional formal `bind` can't fill from the actual falls back to
    // the formal's keyword default (evaluated once, in an empty
    // environment, to recover its type).
    let actual = Actual::<Type>::positional_only(arg_types.to_vec());
    let bound_types = bind(
        &function.formal_args,
        &actual,
        |default_expr| -> parajit_ir::Result<Type> {
            let mut default_env = TypeEnv::new();
            let typed = infer_expr(default_expr, &mut default_env)
                .map_err(|e| parajit_ir::Error::AssertionFailure(e.to_string()))?;
            typed.ty.ok_or_else(|| {
                parajit_ir::Error::AssertionFailure(
                    "keyword default expression produced no type".into(),
                )
            })
        },
    )
    .map_err(|e| Error::InferenceError {
        node: function.name.clone(),
        reason: e.to_string(),
    })?;

    let param_names: Vec<&String> = function
        .formal_args
        .positional
        .iter()
        .chain(
            function
                .formal_args
                .keyword_defaults
                .keys()
                .filter(|k| !function.formal_args.positional.contains(k)),
        )
        .collect();

    if param_names.len() != bound_types.len() {
        return Err(Error::InferenceError {
            node: function.name.clone(),
            reason: format!(
                "expected {} bound arguments, got {}",
                param_names.len(),
                bound_types.len()
            ),
        });
    }

    let mut env = TypeEnv::new();
    let mut arg_names = Vec::with_capacity(bound_types.len());
    for (param, ty) in param_names.into_iter().zip(&bound_types) {
        let name = Name::original(param.clone());
        env.insert(name.clone(), ty.clone());
        arg_names.push(name);
    }

    let (body, return_type) = infer_block(&function.body, &mut env)?;
    let return_type = return_type.ok_or_else(|| Error::InferenceError {
        node: function.name.clone(),
        reason: "function body has no reachable Return".into(),
    })?;

    Ok(Function {
        name: function.name.clone(),
        formal_args: function.formal_args.clone(),
        body,
        arg_types: Some(bound_types),
        return_type: Some(return_type),
        arg_names,
    })
}

/// Infer types through a block, threading `env`. Returns the rewritten,
/// fully typed block and the type of the first `Return` reached (there
/// may be several, across branches; callers unify across them when
/// needed -- at the top level a single function has one effective return
/// type per the common-numeric/combine rules).
fn infer_block(block: &[Stmt], env: &mut TypeEnv) -> Result<(Vec<Stmt>, Option<Type>)> {
    let mut out = Vec::with_capacity(block.len());
    let mut return_type = None;
    for stmt in block {
        let (typed_stmt, ret) = infer_stmt(stmt, env)?;
        out.push(typed_stmt);
        if let Some(ret_ty) = ret {
            return_type = Some(match return_type {
                Some(existing) => combine_types(&existing, &ret_ty)?,
                None => ret_ty,
            });
        }
    }
    Ok((out, return_type))
}

fn infer_stmt(stmt: &Stmt, env: &mut TypeEnv) -> Result<(Stmt, Option<Type>)> {
    match stmt {
        Stmt::Assign(lhs, rhs) => {
            let typed_rhs = infer_expr(rhs, env)?;
            let rhs_ty = typed_rhs.ty.clone().expect("infer_expr always types its node");
            let typed_lhs = bind_lvalue(lhs, &rhs_ty, env)?;
            Ok((Stmt::Assign(typed_lhs, typed_rhs), None))
        }
        Stmt::If {
            cond,
            true_block,
            false_block,
            merge,
        } => {
            let typed_cond = infer_expr(cond, env)?;
            expect_bool(&typed_cond)?;

            let mut true_env = env.clone();
            let (typed_true, true_ret) = infer_block(true_block, &mut true_env)?;
            let mut false_env = env.clone();
            let (typed_false, false_ret) = infer_block(false_block, &mut false_env)?;

            let typed_merge = infer_merge(merge, &true_env, &false_env, env)?;

            let ret = match (true_ret, false_ret) {
                (Some(a), Some(b)) => Some(combine_types(&a, &b)?),
                (Some(a), None) | (None, Some(a)) => Some(a),
                (None, None) => None,
            };

            Ok((
                Stmt::If {
                    cond: typed_cond,
                    true_block: typed_true,
                    false_block: typed_false,
                    merge: typed_merge,
                },
                ret,
            ))
        }
        Stmt::While { cond, body, merge } => {
            // Seed the merge-bound names with their pre-loop types, then
            // iterate body inference to a type fixpoint: the finite type
            // lattice guarantees this terminates, but we cap
            // iterations defensively against a malformed back edge.
            let mut loop_env = env.clone();
            for (name, (pre, _back)) in merge {
                let pre_typed = infer_expr(pre, env)?;
                loop_env.insert(
                    name.clone(),
                    pre_typed.ty.clone().expect("infer_expr always types its node"),
                );
            }

            let mut typed_body = body.clone();
            let mut typed_merge = merge.clone();
            const MAX_FIXPOINT_ITERS: usize = 16;
            for _ in 0..MAX_FIXPOINT_ITERS {
                let mut iter_env = loop_env.clone();
                let (next_body, _) = infer_block(body, &mut iter_env)?;
                let next_merge = infer_merge(merge, &iter_env, env, env)?;

                let mut converged = true;
                let mut widened = loop_env.clone();
                for (name, (_, back)) in &next_merge {
                    let back_ty = back.ty.clone().expect("infer_expr always types its node");
                    let prior = loop_env.get(name).cloned();
                    let combined = match &prior {
                        Some(p) if *p == back_ty => back_ty,
                        Some(p) => {
                            converged = false;
                            combine_types(p, &back_ty)?
                        }
                        None => {
                            converged = false;
                            back_ty
                        }
                    };
                    widened.insert(name.clone(), combined);
                }
                loop_env = widened;
                typed_body = next_body;
                typed_merge = next_merge;
                if converged {
                    break;
                }
            }

            for (name, ty) in &loop_env {
                env.insert(name.clone(), ty.clone());
            }
            let typed_cond = infer_expr(cond, &mut loop_env)?;
            expect_bool(&typed_cond)?;

            Ok((
                Stmt::While {
                    cond: typed_cond,
                    body: typed_body,
                    merge: typed_merge,
                },
                None,
            ))
        }
        Stmt::Return(e) => {
            let typed = infer_expr(e, env)?;
            let ty = typed.ty.clone();
            Ok((Stmt::Return(typed), ty))
        }
    }
}

fn infer_merge(
    merge: &Merge,
    left_env: &TypeEnv,
    right_env: &TypeEnv,
    outer_env: &mut TypeEnv,
) -> Result<Merge> {
    let mut typed_merge = Merge::new();
    for (name, (left, right)) in merge {
        let mut l_env = left_env.clone();
        let mut r_env = right_env.clone();
        let typed_left = infer_expr(left, &mut l_env)?;
        let typed_right = infer_expr(right, &mut r_env)?;
        let lt = typed_left.ty.clone().expect("infer_expr always types its node");
        let rt = typed_right.ty.clone().expect("infer_expr always types its node");
        let joined = combine_types(&lt, &rt)?;
        outer_env.insert(name.clone(), joined);
        typed_merge.insert(name.clone(), (typed_left, typed_right));
    }
    Ok(typed_merge)
}

fn bind_lvalue(lv: &LValue, ty: &Type, env: &mut TypeEnv) -> Result<LValue> {
    match lv {
        LValue::Var(name) => {
            env.insert(name.clone(), ty.clone());
            Ok(LValue::Var(name.clone()))
        }
        LValue::Index(base, idx) => {
            let typed_base = infer_expr(base, env)?;
            let typed_idx = infer_expr(idx, env)?;
            Ok(LValue::Index(Box::new(typed_base), Box::new(typed_idx)))
        }
        LValue::Attribute(base, field) => {
            let typed_base = infer_expr(base, env)?;
            Ok(LValue::Attribute(Box::new(typed_base), field.clone()))
        }
        LValue::Tuple(elts) => {
            let elt_types = match ty {
                Type::Tuple(ts) if ts.len() == elts.len() => ts.clone(),
                _ => {
                    return Err(Error::InferenceError {
                        node: "tuple destructuring assignment".into(),
                        reason: format!("rhs type {} is not a {}-tuple", ty, elts.len()),
                    })
                }
            };
            let bound: Result<Vec<LValue>> = elts
                .iter()
                .zip(elt_types.iter())
                .map(|(e, t)| bind_lvalue(e, t, env))
                .collect();
            Ok(LValue::Tuple(bound?))
        }
    }
}

fn expect_bool(e: &Expr) -> Result<()> {
    match &e.ty {
        Some(Type::Ground(parajit_ir::GroundType::Bool)) => Ok(()),
        other => Err(Error::InferenceError {
            node: "condition".into(),
            reason: format!("expected bool, got {:?}", other),
        }),
    }
}

fn infer_expr(expr: &Expr, env: &mut TypeEnv) -> Result<Expr> {
    let kind_and_ty: (ExprKind, Type) = match &expr.kind {
        ExprKind::Const(lit) => (ExprKind::Const(*lit), lit.ty()),
        ExprKind::Var(name) => {
            let ty = env.get(name).cloned().ok_or_else(|| {
                Error::Ir(parajit_ir::Error::NameNotFound(name.to_string()))
            })?;
            (ExprKind::Var(name.clone()), ty)
        }
        ExprKind::PrimCall(prim, args) => {
            let typed_args: Result<Vec<Expr>> = args.iter().map(|a| infer_expr(a, env)).collect();
            let typed_args = typed_args?;
            let ground_args: Option<Vec<parajit_ir::GroundType>> =
                typed_args.iter().map(|a| a.ty.as_ref().and_then(Type::as_ground)).collect();
            let ground_args = ground_args.ok_or_else(|| Error::InferenceError {
                node: format!("{}", prim),
                reason: "non-ground argument to PrimCall".into(),
            })?;
            let result = prim.result_type(&ground_args).ok_or_else(|| Error::InferenceError {
                node: format!("{}", prim),
                reason: format!("incompatible argument types {:?}", ground_args),
            })?;
            (
                ExprKind::PrimCall(*prim, typed_args),
                Type::Ground(result),
            )
        }
        ExprKind::Cast(v, target) => {
            let typed_v = infer_expr(v, env)?;
            (ExprKind::Cast(Box::new(typed_v), target.clone()), target.clone())
        }
        ExprKind::Tuple(elts) => {
            let typed: Result<Vec<Expr>> = elts.iter().map(|e| infer_expr(e, env)).collect();
            let typed = typed?;
            let tys = typed.iter().map(|e| e.ty.clone().unwrap()).collect();
            (ExprKind::Tuple(typed), Type::Tuple(tys))
        }
        ExprKind::TupleProj(base, idx) => {
            let typed_base = infer_expr(base, env)?;
            let ty = match typed_base.ty.as_ref().unwrap() {
                Type::Tuple(elts) => elts.get(*idx).cloned().ok_or_else(|| {
                    Error::Ir(parajit_ir::Error::AssertionFailure(format!(
                        "tuple projection index {} out of range",
                        idx
                    )))
                })?,
                other => {
                    return Err(Error::InferenceError {
                        node: "TupleProj".into(),
                        reason: format!("base is not a tuple type: {}", other),
                    })
                }
            };
            (ExprKind::TupleProj(Box::new(typed_base), *idx), ty)
        }
        ExprKind::Struct(fields) => {
            let typed: Result<Vec<(String, Expr)>> = fields
                .iter()
                .map(|(name, e)| Ok((name.clone(), infer_expr(e, env)?)))
                .collect();
            let typed = typed?;
            let struct_fields = typed
                .iter()
                .map(|(name, e)| parajit_ir::Field {
                    name: name.clone(),
                    ty: e.ty.clone().unwrap(),
                })
                .collect();
            let struct_name = format!("Struct{}", struct_hash(&typed));
            (
                ExprKind::Struct(typed),
                Type::Struct {
                    name: struct_name,
                    fields: struct_fields,
                },
            )
        }
        ExprKind::Attribute(base, field) => {
            let typed_base = infer_expr(base, env)?;
            let ty = typed_base
                .ty
                .as_ref()
                .unwrap()
                .field_type(field)
                .cloned()
                .ok_or_else(|| {
                    Error::Ir(parajit_ir::Error::AssertionFailure(format!(
                        "field '{}' not found in struct layout",
                        field
                    )))
                })?;
            (ExprKind::Attribute(Box::new(typed_base), field.clone()), ty)
        }
        ExprKind::Array(elts) => {
            let typed: Result<Vec<Expr>> = elts.iter().map(|e| infer_expr(e, env)).collect();
            let typed = typed?;
            let elt_ty = typed
                .first()
                .and_then(|e| e.ty.clone())
                .unwrap_or_else(|| Type::i32());
            (ExprKind::Array(typed), Type::array(elt_ty, 1))
        }
        ExprKind::ArrayView {
            data,
            shape,
            strides,
            offset,
            total_elts,
        } => {
            let typed_data = infer_expr(data, env)?;
            let typed_shape: Result<Vec<Expr>> = shape.iter().map(|e| infer_expr(e, env)).collect();
            let typed_strides: Result<Vec<Expr>> =
                strides.iter().map(|e| infer_expr(e, env)).collect();
            let typed_offset = infer_expr(offset, env)?;
            let typed_total = infer_expr(total_elts, env)?;
            let rank = shape.len() as u32;
            let elt_ty = typed_data
                .ty
                .as_ref()
                .and_then(Type::lower_rank)
                .unwrap_or_else(|| typed_data.ty.clone().unwrap());
            (
                ExprKind::ArrayView {
                    data: Box::new(typed_data),
                    shape: typed_shape?,
                    strides: typed_strides?,
                    offset: Box::new(typed_offset),
                    total_elts: Box::new(typed_total),
                },
                Type::array(elt_ty, rank),
            )
        }
        ExprKind::Index(base, idx) => {
            let typed_base = infer_expr(base, env)?;
            let typed_idx = infer_expr(idx, env)?;
            let ty = typed_base.ty.as_ref().unwrap().lower_rank().ok_or_else(|| {
                Error::InferenceError {
                    node: "Index".into(),
                    reason: format!("cannot index into type {}", typed_base.ty.as_ref().unwrap()),
                }
            })?;
            (ExprKind::Index(Box::new(typed_base), Box::new(typed_idx)), ty)
        }
        ExprKind::Slice { start, stop, step } => {
            let typed_start = infer_expr(start, env)?;
            let typed_stop = infer_expr(stop, env)?;
            let typed_step = infer_expr(step, env)?;
            let i64_ty = Type::i64();
            (
                ExprKind::Slice {
                    start: Box::new(typed_start),
                    stop: Box::new(typed_stop),
                    step: Box::new(typed_step),
                },
                i64_ty,
            )
        }
        ExprKind::Closure {
            callee,
            captured_args,
        } => {
            let typed_caps: Result<Vec<Expr>> =
                captured_args.iter().map(|e| infer_expr(e, env)).collect();
            let typed_caps = typed_caps?;
            let captures = typed_caps.iter().map(|e| e.ty.clone().unwrap()).collect();
            (
                ExprKind::Closure {
                    callee: callee.clone(),
                    captured_args: typed_caps,
                },
                Type::Closure {
                    fn_name: callee.clone(),
                    captures,
                },
            )
        }
        ExprKind::ClosureElt(base, idx) => {
            let typed_base = infer_expr(base, env)?;
            let ty = match typed_base.ty.as_ref().unwrap() {
                Type::Closure { captures, .. } => captures.get(*idx).cloned().ok_or_else(|| {
                    Error::Ir(parajit_ir::Error::AssertionFailure(
                        "closure element index out of range".into(),
                    ))
                })?,
                other => {
                    return Err(Error::InferenceError {
                        node: "ClosureElt".into(),
                        reason: format!("base is not a closure type: {}", other),
                    })
                }
            };
            (ExprKind::ClosureElt(Box::new(typed_base), *idx), ty)
        }
        ExprKind::Call(callee, args) => {
            let typed_callee = match callee {
                Callee::Named(n) => Callee::Named(n.clone()),
                Callee::Value(v) => Callee::Value(Box::new(infer_expr(v, env)?)),
            };
            let typed_args: Result<Vec<Expr>> = args.iter().map(|a| infer_expr(a, env)).collect();
            let typed_args = typed_args?;
            // The core does not itself recursively specialize callees here
            // (that's the pipeline driver's job, walking call graphs
            // top-down); a bare `Call` node is typed `Unknown`-free only
            // once the pipeline has replaced it with a direct call to an
            // already-specialized function and propagated its return
            // type. Until then we require an explicit annotation upstream.
            let ty = expr.ty.clone().ok_or_else(|| Error::InferenceError {
                node: "Call".into(),
                reason: "callee return type must be resolved before inference reaches this Call"
                    .into(),
            })?;
            (ExprKind::Call(typed_callee, typed_args), ty)
        }
        ExprKind::Adverb(adverb) => {
            let (typed_adverb, ty) = infer_adverb(adverb, env)?;
            (ExprKind::Adverb(Box::new(typed_adverb)), ty)
        }
    };
    Ok(Expr::typed(kind_and_ty.0, kind_and_ty.1))
}

fn struct_hash(fields: &[(String, Expr)]) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    for (name, e) in fields {
        name.hash(&mut hasher);
        format!("{:?}", e.ty).hash(&mut hasher);
    }
    hasher.finish()
}

/// Adverb result-type rules (restricted to the type lattice; the
/// shape lattice's rank/dimension reasoning lives in `adverb.rs` where
/// axis-level dimensions actually matter for lowering).
fn infer_adverb(adverb: &AdverbExpr, env: &mut TypeEnv) -> Result<(AdverbExpr, Type)> {
    match adverb {
        AdverbExpr::Map { f, args, axis } => {
            let typed_args: Result<Vec<Expr>> = args.iter().map(|a| infer_expr(a, env)).collect();
            let typed_args = typed_args?;
            let elt_ty = adverb_elt_type(&typed_args, AdverbKind::Map)?;
            let rank = typed_args
                .iter()
                .map(|a| a.ty.as_ref().map(Type::rank).unwrap_or(0))
                .max()
                .unwrap_or(1)
                .max(1);
            Ok((
                AdverbExpr::Map {
                    f: f.clone(),
                    args: typed_args,
                    axis: *axis,
                },
                Type::array(elt_ty, rank),
            ))
        }
        AdverbExpr::AllPairs { f, x, y, axis } => {
            let typed_x = infer_expr(x, env)?;
            let typed_y = infer_expr(y, env)?;
            let elt_ty = typed_x.ty.as_ref().unwrap().clone();
            Ok((
                AdverbExpr::AllPairs {
                    f: f.clone(),
                    x: typed_x,
                    y: typed_y,
                    axis: *axis,
                },
                Type::array(elt_ty, 2),
            ))
        }
        AdverbExpr::Reduce {
            f,
            combine,
            args,
            init,
            axis,
        } => {
            let typed_args: Result<Vec<Expr>> = args.iter().map(|a| infer_expr(a, env)).collect();
            let typed_args = typed_args?;
            let typed_init = infer_expr(init, env)?;
            let ty = typed_init.ty.clone().unwrap();
            Ok((
                AdverbExpr::Reduce {
                    f: f.clone(),
                    combine: combine.clone(),
                    args: typed_args,
                    init: typed_init,
                    axis: *axis,
                },
                ty,
            ))
        }
        AdverbExpr::Scan {
            f,
            combine,
            emit,
            args,
            init,
            axis,
        } => {
            let typed_args: Result<Vec<Expr>> = args.iter().map(|a| infer_expr(a, env)).collect();
            let typed_args = typed_args?;
            let typed_init = infer_expr(init, env)?;
            let elt_ty = typed_init.ty.clone().unwrap();
            let rank = typed_args
                .iter()
                .map(|a| a.ty.as_ref().map(Type::rank).unwrap_or(0))
                .max()
                .unwrap_or(1)
                .max(1);
            Ok((
                AdverbExpr::Scan {
                    f: f.clone(),
                    combine: combine.clone(),
                    emit: emit.clone(),
                    args: typed_args,
                    init: typed_init,
                    axis: *axis,
                },
                Type::array(elt_ty, rank),
            ))
        }
    }
}

fn adverb_elt_type(args: &[Expr], kind: AdverbKind) -> Result<Type> {
    args.first()
        .and_then(|a| a.ty.clone())
        .map(|t| t.lower_rank().unwrap_or(t))
        .ok_or_else(|| Error::InferenceError {
            node: format!("{}", kind),
            reason: "adverb requires at least one array argument".into(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parajit_ir::{Formal, Literal, Prim};

    fn add_one() -> Function {
        Function::new_untyped(
            "add_one",
            Formal::positional_only(vec!["x".into()]),
            vec![Stmt::Return(Expr::untyped(ExprKind::PrimCall(
                Prim::Add,
                vec![
                    Expr::var(Name::original("x")),
                    Expr::const_(Literal::I32(1)),
                ],
            )))],
        )
    }

    #[test]
    fn specializes_prim_call_to_ground_type() {
        let f = infer_function(&add_one(), &[Type::i32()]).unwrap();
        assert_eq!(f.return_type, Some(Type::i32()));
        assert!(f.body[0].clone() != Stmt::Return(Expr::const_(Literal::I32(0))));
    }

    #[test]
    fn specialization_is_cached() {
        let untyped_reg = UntypedFunctionRegistry::new();
        untyped_reg.register(add_one()).unwrap();
        let cache = TypedFunctionCache::new();
        let specializer = Specializer::new(&untyped_reg, &cache);
        let a = specializer.specialize("add_one", &[Type::i32()]).unwrap();
        let b = specializer.specialize("add_one", &[Type::i32()]).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn if_merges_branch_types_via_combine() {
        let cond = Expr::const_(Literal::Bool(true));
        let merge_name = Name::original("x");
        let mut merge = Merge::new();
        merge.insert(
            merge_name.clone(),
            (Expr::const_(Literal::I32(1)), Expr::const_(Literal::I64(2))),
        );
        let f = Function::new_untyped(
            "g",
            Formal::positional_only(vec![]),
            vec![
                Stmt::If {
                    cond,
                    true_block: vec![],
                    false_block: vec![],
                    merge,
                },
                Stmt::Return(Expr::var(merge_name)),
            ],
        );
        let typed = infer_function(&f, &[]).unwrap();
        assert_eq!(typed.return_type, Some(Type::i64()));
    }

    #[test]
    fn unsupplied_keyword_arg_falls_back_to_default() {
        let mut defaults = indexmap::IndexMap::new();
        defaults.insert("y".to_string(), Expr::const_(Literal::I32(7)));
        // `y` is keyword-only (not in `positional`): `bind` resolves it
        // from its default whenever the call site supplies no keyword
        // type for it, which is always the case here since `Specializer`
        // only ever passes a positional argument-type tuple.
        let formal = Formal::new(vec!["x".into()], None, defaults).unwrap();
        let f = Function::new_untyped(
            "with_default",
            formal,
            vec![Stmt::Return(Expr::untyped(ExprKind::PrimCall(
                Prim::Add,
                vec![
                    Expr::var(Name::original("x")),
                    Expr::var(Name::original("y")),
                ],
            )))],
        );
        let typed = infer_function(&f, &[Type::i32()]).unwrap();
        assert_eq!(typed.arg_types, Some(vec![Type::i32(), Type::i32()]));
        assert_eq!(typed.return_type, Some(Type::i32()));
    }

    #[test]
    fn unresolvable_missing_required_argument_is_inference_error() {
        let f = Function::new_untyped(
            "needs_two",
            Formal::positional_only(vec!["x".into(), "y".into()]),
            vec![Stmt::Return(Expr::var(Name::original("x")))],
        );
        let err = infer_function(&f, &[Type::i32()]).unwrap_err();
        assert!(matches!(err, Error::InferenceError { .. }));
    }
}
