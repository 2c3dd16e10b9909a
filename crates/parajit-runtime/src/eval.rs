//! A small tree-walking evaluator for typed functions, split so a pure
//! op-evaluation function handles leaf
//! expressions (`eval_expr`, handling `Const`/`Var`/`PrimCall`/casts/
//! projections -- anything with no control-flow or call semantics of its
//! own) and a stateful walk (`Interpreter::exec_block`) for `If`/`While`/
//! `Call`/adverbs, which need an environment and a function table.
//!
//! This is reference scaffolding: it exists so `BackendLowering`'s
//! reference artifact is actually executable and so integration tests can
//! assert end-to-end results, not a model of how a real backend executes
//! compiled code.

use std::collections::HashMap;
use std::sync::Arc;

use parajit_ir::{AdverbExpr, Callee, Expr, ExprKind, Function, LValue, Literal, Merge, Name, Prim, Stmt};

use crate::error::{Error, Result};
use crate::value::{ArrayValue, Value};

/// Environment mapping SSA names to their current value. A plain
/// `HashMap` suffices -- SSA assignment means a name is written at most
/// once along any execution path, so there is never a need to restore a
/// shadowed binding.
pub type Env = HashMap<Name, Value>;

pub struct Interpreter<'a> {
    /// Every typed function reachable from the one being executed,
    /// resolved ahead of time by `backend::lower` when it builds the
    /// `CompiledArtifact`.
    functions: &'a HashMap<String, Arc<Function>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(functions: &'a HashMap<String, Arc<Function>>) -> Self {
        Interpreter { functions }
    }

    /// Run `f` to completion with `args` bound positionally to
    /// `f.arg_names`, returning the value its `Return` statement produces.
    pub fn call(&self, f: &Function, args: Vec<Value>) -> Result<Value> {
        if args.len() != f.arg_names.len() {
            return Err(Error::Interpreter(format!(
                "function '{}' expects {} args, got {}",
                f.name,
                f.arg_names.len(),
                args.len()
            )));
        }
        let mut env: Env = f.arg_names.iter().cloned().zip(args).collect();
        match self.exec_block(&f.body, &mut env)? {
            Some(v) => Ok(v),
            None => Err(Error::Interpreter(format!("function '{}' fell off the end without returning", f.name))),
        }
    }

    fn lookup(&self, name: &str) -> Result<&Arc<Function>> {
        self.functions
            .get(name)
            .ok_or_else(|| Error::Interpreter(format!("call to unresolved function '{name}'")))
    }

    /// Execute a statement block, returning `Some(value)` the moment a
    /// `Return` is reached, `None` if the block falls through.
    fn exec_block(&self, block: &[Stmt], env: &mut Env) -> Result<Option<Value>> {
        for stmt in block {
            match stmt {
                Stmt::Return(e) => return Ok(Some(self.eval(e, env)?)),
                Stmt::Assign(lvalue, rhs) => {
                    let v = self.eval(rhs, env)?;
                    self.assign(lvalue, v, env)?;
                }
                Stmt::If {
                    cond,
                    true_block,
                    false_block,
                    merge,
                } => {
                    let taken = self.eval(cond, env)?.as_bool()?;
                    let branch = if taken { true_block } else { false_block };
                    if let Some(ret) = self.exec_block(branch, env)? {
                        return Ok(Some(ret));
                    }
                    self.apply_merge(merge, taken, env)?;
                }
                Stmt::While { cond, body, merge } => {
                    self.apply_merge(merge, true, env)?;
                    while self.eval(cond, env)?.as_bool()? {
                        if let Some(ret) = self.exec_block(body, env)? {
                            return Ok(Some(ret));
                        }
                        self.apply_merge(merge, false, env)?;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Bind every merge name to its `left` (if entering/true) or `right`
    /// (if looping-back/false) value, evaluated in the environment as it
    /// stands right after the corresponding branch/iteration ran.
    fn apply_merge(&self, merge: &Merge, take_left: bool, env: &mut Env) -> Result<()> {
        let mut updates = Vec::with_capacity(merge.len());
        for (name, (left, right)) in merge {
            let value = if take_left {
                self.eval(left, env)?
            } else {
                self.eval(right, env)?
            };
            updates.push((name.clone(), value));
        }
        env.extend(updates);
        Ok(())
    }

    fn assign(&self, lvalue: &LValue, value: Value, env: &mut Env) -> Result<()> {
        match lvalue {
            LValue::Var(name) => {
                env.insert(name.clone(), value);
                Ok(())
            }
            LValue::Tuple(elts) => {
                let parts = value.as_tuple()?.to_vec();
                if parts.len() != elts.len() {
                    return Err(Error::Interpreter("tuple assignment arity mismatch".into()));
                }
                for (lv, v) in elts.iter().zip(parts) {
                    self.assign(lv, v, env)?;
                }
                Ok(())
            }
            LValue::Index(target, index) => {
                let idx = self.eval(index, env)?.as_index()?;
                let name = target.kind_var_name().ok_or_else(|| {
                    Error::Interpreter("indexed assignment target must be a variable".into())
                })?;
                let mut arr = env
                    .get(name)
                    .ok_or_else(|| Error::Interpreter(format!("unbound name '{name}'")))?
                    .as_array()?
                    .clone();
                write_outer(&mut arr, idx, value)?;
                env.insert(name.clone(), Value::Array(arr));
                Ok(())
            }
            LValue::Attribute(target, field) => {
                let name = target.kind_var_name().ok_or_else(|| {
                    Error::Interpreter("attribute assignment target must be a variable".into())
                })?;
                let current = env
                    .get(name)
                    .ok_or_else(|| Error::Interpreter(format!("unbound name '{name}'")))?
                    .clone();
                let updated = match current {
                    Value::Struct(sname, mut fields) => {
                        match fields.iter_mut().find(|(n, _)| n == field) {
                            Some((_, slot)) => *slot = value,
                            None => return Err(Error::Interpreter(format!("no field '{field}' to assign"))),
                        }
                        Value::Struct(sname, fields)
                    }
                    other => return Err(Error::Interpreter(format!("expected struct, found {other:?}"))),
                };
                env.insert(name.clone(), updated);
                Ok(())
            }
        }
    }

    pub fn eval(&self, e: &Expr, env: &Env) -> Result<Value> {
        match &e.kind {
            ExprKind::Const(lit) => Ok(Value::from_literal(*lit)),
            ExprKind::Var(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Interpreter(format!("unbound name '{name}'"))),
            ExprKind::PrimCall(prim, args) => self.eval_prim_call(*prim, args, env),
            ExprKind::Cast(inner, ty) => eval_cast(self.eval(inner, env)?, ty),
            ExprKind::Tuple(elts) => Ok(Value::Tuple(
                elts.iter().map(|x| self.eval(x, env)).collect::<Result<_>>()?,
            )),
            ExprKind::TupleProj(inner, idx) => {
                let v = self.eval(inner, env)?;
                v.as_tuple()?
                    .get(*idx)
                    .cloned()
                    .ok_or_else(|| Error::Interpreter(format!("tuple projection {idx} out of range")))
            }
            ExprKind::Struct(fields) => {
                let name = struct_type_name(e)?;
                let values = fields
                    .iter()
                    .map(|(n, x)| Ok((n.clone(), self.eval(x, env)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Struct(name, values))
            }
            ExprKind::Attribute(inner, field) => self.eval(inner, env)?.struct_field(field).cloned(),
            ExprKind::Array(elts) => {
                let values = elts.iter().map(|x| self.eval(x, env)).collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(ArrayValue {
                    shape: vec![values.len()],
                    data: values,
                }))
            }
            ExprKind::ArrayView {
                data,
                shape,
                strides,
                offset,
                total_elts,
            } => self.eval_array_view(data, shape, strides, offset, total_elts, env),
            ExprKind::Index(target, index) => {
                let arr = self.eval(target, env)?;
                let idx = self.eval(index, env)?.as_index()?;
                arr.as_array()?.slice_outer(idx)
            }
            ExprKind::Slice { start, stop, step } => {
                // `Slice` only reaches `eval` nested inside an `Index`'s
                // target position in this IR; evaluated standalone it has
                // no array to slice, so report the malformed-node case.
                let _ = (start, stop, step);
                Err(Error::Interpreter("Slice node evaluated outside of an Index".into()))
            }
            ExprKind::Closure { callee, captured_args } => Ok(Value::Closure {
                fn_name: callee.clone(),
                captured: captured_args.iter().map(|x| self.eval(x, env)).collect::<Result<_>>()?,
            }),
            ExprKind::ClosureElt(inner, idx) => match self.eval(inner, env)? {
                Value::Closure { captured, .. } => captured
                    .get(*idx)
                    .cloned()
                    .ok_or_else(|| Error::Interpreter(format!("closure element {idx} out of range"))),
                other => Err(Error::Interpreter(format!("expected closure, found {other:?}"))),
            },
            ExprKind::Call(callee, args) => self.eval_call(callee, args, env),
            ExprKind::Adverb(adverb) => self.eval_adverb(adverb, env),
        }
    }

    fn eval_prim_call(&self, prim: Prim, args: &[Expr], env: &Env) -> Result<Value> {
        let values = args.iter().map(|a| self.eval(a, env)).collect::<Result<Vec<_>>>()?;
        let literals = values
            .iter()
            .map(Value::as_literal)
            .collect::<Result<Vec<Literal>>>()?;
        Ok(Value::from_literal(prim.eval(&literals)))
    }

    fn eval_array_view(
        &self,
        data: &Expr,
        shape: &[Expr],
        strides: &[Expr],
        offset: &Expr,
        total_elts: &Expr,
        env: &Env,
    ) -> Result<Value> {
        let source = self.eval(data, env)?;
        let flat = flatten(&source)?;
        let shape: Vec<usize> = shape
            .iter()
            .map(|e| self.eval(e, env).and_then(|v| v.as_index()))
            .collect::<Result<_>>()?;
        let strides: Vec<i64> = strides
            .iter()
            .map(|e| -> Result<i64> {
                let v = self.eval(e, env)?;
                match v {
                    Value::I32(s) => Ok(s as i64),
                    Value::I64(s) => Ok(s),
                    other => Err(Error::Interpreter(format!("expected integer stride, found {other:?}"))),
                }
            })
            .collect::<Result<_>>()?;
        let offset = self.eval(offset, env)?.as_index()? as i64;
        let total = self.eval(total_elts, env)?.as_index()?;

        let mut out = Vec::with_capacity(total);
        let mut idx = vec![0usize; shape.len()];
        for _ in 0..total {
            let mut pos = offset;
            for (dim, stride) in idx.iter().zip(&strides) {
                pos += *dim as i64 * stride;
            }
            let pos = usize::try_from(pos)
                .map_err(|_| Error::Interpreter("array view computed a negative offset".into()))?;
            let v = flat
                .get(pos)
                .cloned()
                .ok_or_else(|| Error::Interpreter("array view indexed past backing storage".into()))?;
            out.push(v);
            for axis in (0..shape.len()).rev() {
                idx[axis] += 1;
                if idx[axis] < shape[axis] {
                    break;
                }
                idx[axis] = 0;
            }
        }
        Ok(Value::Array(ArrayValue { shape, data: out }))
    }

    fn eval_call(&self, callee: &Callee, args: &[Expr], env: &Env) -> Result<Value> {
        let arg_values = args.iter().map(|a| self.eval(a, env)).collect::<Result<Vec<_>>>()?;
        self.call_callee(callee, arg_values, env)
    }

    /// Resolve and invoke `callee` with `args` already evaluated. Shared
    /// by `Call` and by every adverb, whose `f`/`combine`/`emit` fields
    /// are themselves `Callee`s.
    fn call_callee(&self, callee: &Callee, args: Vec<Value>, env: &Env) -> Result<Value> {
        match callee {
            Callee::Named(name) => self.call(self.lookup(name)?, args),
            Callee::Value(inner) => match self.eval(inner, env)? {
                Value::Closure { fn_name, captured } => {
                    let mut all_args = captured;
                    all_args.extend(args);
                    self.call(self.lookup(&fn_name)?, all_args)
                }
                other => Err(Error::Interpreter(format!("expected closure callee, found {other:?}"))),
            },
        }
    }

    /// Sequential reference semantics for the four adverbs: the core
    /// emits a sequential scan as a default; parallel scan is a runtime
    /// concern. Real parallel execution happens through the work
    /// functions adverb lowering synthesizes, dispatched by
    /// `RuntimeDispatch`; this path exists so adverb expressions that
    /// never get lowered (e.g. ones evaluated directly by a test or CLI
    /// demo) still produce a result.
    fn eval_adverb(&self, adverb: &AdverbExpr, env: &Env) -> Result<Value> {
        match adverb {
            AdverbExpr::Map { f, args, axis } => {
                let arrays = args
                    .iter()
                    .map(|a| self.eval(a, env).and_then(|v| v.as_array().cloned()))
                    .collect::<Result<Vec<_>>>()?;
                let axis = *axis as usize;
                let len = arrays
                    .first()
                    .ok_or_else(|| Error::Interpreter("map requires at least one array argument".into()))?
                    .axis_extent(axis)?;
                let mut out = Vec::with_capacity(len);
                for i in 0..len {
                    let slice_args = arrays
                        .iter()
                        .map(|a| a.slice_outer(i))
                        .collect::<Result<Vec<_>>>()?;
                    out.push(self.call_callee(f, slice_args, env)?);
                }
                Ok(Value::Array(ArrayValue {
                    shape: vec![len],
                    data: out,
                }))
            }
            AdverbExpr::AllPairs { f, x, y, axis } => {
                let xa = self.eval(x, env)?.as_array()?.clone();
                let ya = self.eval(y, env)?.as_array()?.clone();
                let axis = *axis as usize;
                let xlen = xa.axis_extent(axis)?;
                let ylen = ya.axis_extent(axis)?;
                let mut rows = Vec::with_capacity(xlen);
                for i in 0..xlen {
                    let xi = xa.slice_outer(i)?;
                    let mut row = Vec::with_capacity(ylen);
                    for j in 0..ylen {
                        let yj = ya.slice_outer(j)?;
                        row.push(self.call_callee(f, vec![xi.clone(), yj], env)?);
                    }
                    rows.push(Value::Array(ArrayValue {
                        shape: vec![ylen],
                        data: row,
                    }));
                }
                Ok(Value::Array(ArrayValue {
                    shape: vec![xlen],
                    data: rows,
                }))
            }
            AdverbExpr::Reduce {
                f,
                combine,
                args,
                init,
                axis,
            } => {
                let arrays = args
                    .iter()
                    .map(|a| self.eval(a, env).and_then(|v| v.as_array().cloned()))
                    .collect::<Result<Vec<_>>>()?;
                let axis = *axis as usize;
                let len = arrays
                    .first()
                    .ok_or_else(|| Error::Interpreter("reduce requires at least one array argument".into()))?
                    .axis_extent(axis)?;
                let mut acc = self.eval(init, env)?;
                for i in 0..len {
                    let slice_args = arrays
                        .iter()
                        .map(|a| a.slice_outer(i))
                        .collect::<Result<Vec<_>>>()?;
                    let mapped = self.call_callee(f, slice_args, env)?;
                    acc = self.call_callee(combine, vec![acc, mapped], env)?;
                }
                Ok(acc)
            }
            AdverbExpr::Scan {
                f,
                combine,
                emit,
                args,
                init,
                axis,
            } => {
                let arrays = args
                    .iter()
                    .map(|a| self.eval(a, env).and_then(|v| v.as_array().cloned()))
                    .collect::<Result<Vec<_>>>()?;
                let axis = *axis as usize;
                let len = arrays
                    .first()
                    .ok_or_else(|| Error::Interpreter("scan requires at least one array argument".into()))?
                    .axis_extent(axis)?;
                let mut acc = self.eval(init, env)?;
                let mut out = Vec::with_capacity(len);
                for i in 0..len {
                    let slice_args = arrays
                        .iter()
                        .map(|a| a.slice_outer(i))
                        .collect::<Result<Vec<_>>>()?;
                    let mapped = self.call_callee(f, slice_args, env)?;
                    acc = self.call_callee(combine, vec![acc, mapped], env)?;
                    out.push(self.call_callee(emit, vec![acc.clone()], env)?);
                }
                Ok(Value::Array(ArrayValue {
                    shape: vec![len],
                    data: out,
                }))
            }
        }
    }
}

impl Expr {
    /// The variable name this expression resolves to, if it is a plain
    /// `Var` leaf. Used by indexed/attribute assignment, whose target is
    /// always a bare variable in this IR (no assignment through a nested
    /// projection).
    fn kind_var_name(&self) -> Option<&Name> {
        match &self.kind {
            ExprKind::Var(name) => Some(name),
            _ => None,
        }
    }
}

fn eval_cast(v: Value, ty: &parajit_ir::Type) -> Result<Value> {
    use parajit_ir::GroundType::*;
    let ground = ty
        .as_ground()
        .ok_or_else(|| Error::Interpreter("cast to non-ground type".into()))?;
    let lit = v.as_literal()?;
    Ok(Value::from_literal(match ground {
        Bool => Literal::Bool(lit.as_i64() != 0),
        I32 => Literal::I32(if matches!(lit, Literal::F32(_) | Literal::F64(_)) {
            lit.as_f64() as i32
        } else {
            lit.as_i64() as i32
        }),
        I64 => Literal::I64(if matches!(lit, Literal::F32(_) | Literal::F64(_)) {
            lit.as_f64() as i64
        } else {
            lit.as_i64()
        }),
        F32 => Literal::F32(lit.as_f64_portable() as f32),
        F64 => Literal::F64(lit.as_f64_portable()),
        Ptr(_) => return Err(Error::Interpreter("cannot cast to a pointer type".into())),
    }))
}

/// `Literal::as_f64` panics on non-float literals; casts need a version
/// that widens integers too.
trait AsF64Portable {
    fn as_f64_portable(&self) -> f64;
}
impl AsF64Portable for Literal {
    fn as_f64_portable(&self) -> f64 {
        match self {
            Literal::F32(_) | Literal::F64(_) => self.as_f64(),
            _ => self.as_i64() as f64,
        }
    }
}

fn flatten(v: &Value) -> Result<Vec<Value>> {
    match v {
        Value::Array(a) => Ok(a.data.clone()),
        scalar => Ok(vec![scalar.clone()]),
    }
}

fn write_outer(arr: &mut ArrayValue, i: usize, value: Value) -> Result<()> {
    let extent = arr.axis_extent(0)?;
    if i >= extent {
        return Err(Error::Interpreter(format!("index {i} out of bounds for extent {extent}")));
    }
    if arr.rank() == 1 {
        arr.data[i] = value;
        return Ok(());
    }
    let inner_len = arr.data.len() / extent;
    let inner = value.as_array()?;
    if inner.data.len() != inner_len {
        return Err(Error::Interpreter("indexed assignment shape mismatch".into()));
    }
    arr.data[i * inner_len..(i + 1) * inner_len].clone_from_slice(&inner.data);
    Ok(())
}

fn struct_type_name(e: &Expr) -> Result<String> {
    match &e.ty {
        Some(parajit_ir::Type::Struct { name, .. }) => Ok(name.clone()),
        _ => Err(Error::Interpreter("Struct literal missing its struct type".into())),
    }
}
