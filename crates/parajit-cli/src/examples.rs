//! Built-in demonstration programs. Each one is grounded in an
//! end-to-end optimization scenario or, for the adverb pair, in
//! `adverb.rs`'s own unit tests -- the CLI just drives the same
//! pipeline a real dispatch wrapper would, from the outside, with
//! concrete argument values.
//!
//! The scalar examples build already-typed `Function` literals directly
//! (as `parajit-compiler`'s `tests/end_to_end.rs` does) rather than going
//! through `Specializer`: `infer_expr`'s `Call` rule requires a callee's
//! return type to already be resolved (see `infer.rs`), so a bare
//! `Call`-carrying untyped function can't be specialized standalone --
//! the pipeline driver only ever sees calls after the producer or an
//! earlier specialization pass has annotated them. The adverb callees
//! have no `Call` nodes of their own, so those go through the ordinary
//! untyped-registry + `Specializer` route.

use std::collections::HashMap;
use std::sync::Arc;

use parajit_compiler::{AdverbApi, AdverbSpec, CompilerOptions, PipelineConfig, Pipeline, Specializer};
use parajit_ir::{
    Expr, ExprKind, Formal, Function, LValue, Literal, Merge, Name, NameSupply, Prim, Stmt, Type,
    TypedFunctionCache, UntypedFunctionRegistry,
};
use parajit_runtime::{
    partition_ranges, BackendLowering, Interpreter, ReferenceBackend, RuntimeDispatch, ThreadPoolDispatch, Value,
};

use crate::error::{CliError, CliResult};

/// Everything a scalar example needs to hand back to `main`: the
/// optimized, typed function (for `--print-ir`) and the value it
/// produced for the given arguments.
pub struct ScalarRun {
    pub optimized: Arc<parajit_ir::Function>,
    pub result: Value,
}

/// Same shape for the adverb pair, plus the synthesized work function
/// (distinct from the wrapper -- see `adverb.rs`) since that's the
/// more interesting artifact to print for these two.
pub struct AdverbRun {
    pub work_function: Arc<parajit_ir::Function>,
    pub result: Value,
}

fn run_through_backend(f: Arc<parajit_ir::Function>, args: Vec<Value>) -> CliResult<Value> {
    let backend = ReferenceBackend::new();
    let artifact = backend.lower(f, &|_| None).map_err(CliError::Runtime)?;
    let interp = Interpreter::new(&artifact.functions);
    interp.call(&artifact.entry, args).map_err(CliError::Runtime)
}

/// `A(x) = x+1`, `B(x) = A(x)`, `C(x) = B(x)`; `optimize(C)`
/// collapses the call chain entirely.
pub fn inline_chain(x: i64) -> CliResult<ScalarRun> {
    let xn = Name::original("x");

    let a = parajit_ir::Function {
        name: "A".into(),
        formal_args: Formal::positional_only(vec!["x".into()]),
        body: vec![Stmt::Return(Expr::typed(
            ExprKind::PrimCall(
                Prim::Add,
                vec![Expr::typed(ExprKind::Var(xn.clone()), Type::i64()), Expr::const_(Literal::I64(1))],
            ),
            Type::i64(),
        ))],
        arg_types: Some(vec![Type::i64()]),
        return_type: Some(Type::i64()),
        arg_names: vec![xn.clone()],
    };
    let b = parajit_ir::Function {
        name: "B".into(),
        formal_args: Formal::positional_only(vec!["x".into()]),
        body: vec![Stmt::Return(Expr::typed(
            ExprKind::Call(parajit_ir::Callee::Named("A".into()), vec![Expr::typed(ExprKind::Var(xn.clone()), Type::i64())]),
            Type::i64(),
        ))],
        arg_types: Some(vec![Type::i64()]),
        return_type: Some(Type::i64()),
        arg_names: vec![xn.clone()],
    };
    let c = parajit_ir::Function {
        name: "C".into(),
        formal_args: Formal::positional_only(vec!["x".into()]),
        body: vec![Stmt::Return(Expr::typed(
            ExprKind::Call(parajit_ir::Callee::Named("B".into()), vec![Expr::typed(ExprKind::Var(xn.clone()), Type::i64())]),
            Type::i64(),
        ))],
        arg_types: Some(vec![Type::i64()]),
        return_type: Some(Type::i64()),
        arg_names: vec![xn],
    };

    let names = NameSupply::new();
    let typed_functions = TypedFunctionCache::new();
    typed_functions.insert(vec![Type::i64()], a);
    typed_functions.insert(vec![Type::i64()], b);

    let pipeline = Pipeline::new(&names, &typed_functions);
    let optimized = pipeline
        .optimize(Arc::new(c), &PipelineConfig::default())
        .map_err(CliError::Compiler)?;
    let result = run_through_backend(optimized.clone(), vec![Value::I64(x)])?;
    Ok(ScalarRun { optimized, result })
}

/// `f(x): y=4*1; z=y+1; a=z/5; b=x*a; return b` folds to
/// `return x`.
pub fn const_fold(x: i64) -> CliResult<ScalarRun> {
    let xn = Name::original("x");
    let y = Name::original("y");
    let z = Name::original("z");
    let a = Name::original("a");
    let b = Name::original("b");

    let f = parajit_ir::Function {
        name: "f".into(),
        formal_args: Formal::positional_only(vec!["x".into()]),
        body: vec![
            Stmt::Assign(
                LValue::Var(y.clone()),
                Expr::typed(ExprKind::PrimCall(Prim::Mul, vec![Expr::const_(Literal::I64(4)), Expr::const_(Literal::I64(1))]), Type::i64()),
            ),
            Stmt::Assign(
                LValue::Var(z.clone()),
                Expr::typed(
                    ExprKind::PrimCall(Prim::Add, vec![Expr::typed(ExprKind::Var(y), Type::i64()), Expr::const_(Literal::I64(1))]),
                    Type::i64(),
                ),
            ),
            Stmt::Assign(
                LValue::Var(a.clone()),
                Expr::typed(ExprKind::PrimCall(Prim::Div, vec![Expr::typed(ExprKind::Var(z), Type::i64()), Expr::const_(Literal::I64(5))]), Type::i64()),
            ),
            Stmt::Assign(
                LValue::Var(b.clone()),
                Expr::typed(
                    ExprKind::PrimCall(Prim::Mul, vec![Expr::typed(ExprKind::Var(xn.clone()), Type::i64()), Expr::typed(ExprKind::Var(a), Type::i64())]),
                    Type::i64(),
                ),
            ),
            Stmt::Return(Expr::typed(ExprKind::Var(b), Type::i64())),
        ],
        arg_types: Some(vec![Type::i64()]),
        return_type: Some(Type::i64()),
        arg_names: vec![xn],
    };

    let names = NameSupply::new();
    let typed_functions = TypedFunctionCache::new();
    let pipeline = Pipeline::new(&names, &typed_functions);
    let optimized = pipeline
        .optimize(Arc::new(f), &PipelineConfig::default())
        .map_err(CliError::Compiler)?;
    let result = run_through_backend(optimized.clone(), vec![Value::I64(x)])?;
    Ok(ScalarRun { optimized, result })
}

/// `g(b): if b then x=1 else x=1; return x` phi-collapses
/// to `return 1` regardless of `b`.
pub fn branch_const(b: bool) -> CliResult<ScalarRun> {
    let bn = Name::original("b");
    let x = Name::original("x");
    let mut merge = Merge::new();
    merge.insert(x.clone(), (Expr::const_(Literal::I64(1)), Expr::const_(Literal::I64(1))));

    let g = parajit_ir::Function {
        name: "g".into(),
        formal_args: Formal::positional_only(vec!["b".into()]),
        body: vec![
            Stmt::If {
                cond: Expr::typed(ExprKind::Var(bn.clone()), Type::bool()),
                true_block: vec![],
                false_block: vec![],
                merge,
            },
            Stmt::Return(Expr::typed(ExprKind::Var(x), Type::i64())),
        ],
        arg_types: Some(vec![Type::bool()]),
        return_type: Some(Type::i64()),
        arg_names: vec![bn],
    };

    let names = NameSupply::new();
    let typed_functions = TypedFunctionCache::new();
    let pipeline = Pipeline::new(&names, &typed_functions);
    let optimized = pipeline
        .optimize(Arc::new(g), &PipelineConfig::default())
        .map_err(CliError::Compiler)?;
    let result = run_through_backend(optimized.clone(), vec![Value::Bool(b)])?;
    Ok(ScalarRun { optimized, result })
}

/// `h(): x=1+1; if x==2 then return 0+0 else return 1*1+0`
/// -- the condition is always true, so the whole body collapses to
/// `return 0`.
pub fn always_true_branch() -> CliResult<ScalarRun> {
    let x = Name::original("x");
    let h = parajit_ir::Function {
        name: "h".into(),
        formal_args: Formal::positional_only(vec![]),
        body: vec![
            Stmt::Assign(
                LValue::Var(x.clone()),
                Expr::typed(ExprKind::PrimCall(Prim::Add, vec![Expr::const_(Literal::I64(1)), Expr::const_(Literal::I64(1))]), Type::i64()),
            ),
            Stmt::If {
                cond: Expr::typed(
                    ExprKind::PrimCall(Prim::Eq, vec![Expr::typed(ExprKind::Var(x), Type::i64()), Expr::const_(Literal::I64(2))]),
                    Type::bool(),
                ),
                true_block: vec![Stmt::Return(Expr::typed(
                    ExprKind::PrimCall(Prim::Add, vec![Expr::const_(Literal::I64(0)), Expr::const_(Literal::I64(0))]),
                    Type::i64(),
                ))],
                false_block: vec![Stmt::Return(Expr::typed(
                    ExprKind::PrimCall(
                        Prim::Add,
                        vec![
                            Expr::typed(ExprKind::PrimCall(Prim::Mul, vec![Expr::const_(Literal::I64(1)), Expr::const_(Literal::I64(1))]), Type::i64()),
                            Expr::const_(Literal::I64(0)),
                        ],
                    ),
                    Type::i64(),
                ))],
                merge: Merge::new(),
            },
        ],
        arg_types: Some(vec![]),
        return_type: Some(Type::i64()),
        arg_names: vec![],
    };

    let names = NameSupply::new();
    let typed_functions = TypedFunctionCache::new();
    let pipeline = Pipeline::new(&names, &typed_functions);
    let optimized = pipeline
        .optimize(Arc::new(h), &PipelineConfig::default())
        .map_err(CliError::Compiler)?;
    let result = run_through_backend(optimized.clone(), vec![])?;
    Ok(ScalarRun { optimized, result })
}

/// `x=1+2; if x==2 then return 0 else return 1` -- the
/// condition is always false, so the body collapses to `return 1`.
pub fn always_false_branch() -> CliResult<ScalarRun> {
    let x = Name::original("x");
    let f = parajit_ir::Function {
        name: "always_false".into(),
        formal_args: Formal::positional_only(vec![]),
        body: vec![
            Stmt::Assign(
                LValue::Var(x.clone()),
                Expr::typed(ExprKind::PrimCall(Prim::Add, vec![Expr::const_(Literal::I64(1)), Expr::const_(Literal::I64(2))]), Type::i64()),
            ),
            Stmt::If {
                cond: Expr::typed(
                    ExprKind::PrimCall(Prim::Eq, vec![Expr::typed(ExprKind::Var(x), Type::i64()), Expr::const_(Literal::I64(2))]),
                    Type::bool(),
                ),
                true_block: vec![Stmt::Return(Expr::const_(Literal::I64(0)))],
                false_block: vec![Stmt::Return(Expr::const_(Literal::I64(1)))],
                merge: Merge::new(),
            },
        ],
        arg_types: Some(vec![]),
        return_type: Some(Type::i64()),
        arg_names: vec![],
    };

    let names = NameSupply::new();
    let typed_functions = TypedFunctionCache::new();
    let pipeline = Pipeline::new(&names, &typed_functions);
    let optimized = pipeline
        .optimize(Arc::new(f), &PipelineConfig::default())
        .map_err(CliError::Compiler)?;
    let result = run_through_backend(optimized.clone(), vec![])?;
    Ok(ScalarRun { optimized, result })
}

/// A loop that rebuilds a rank-1 array on its back edge
/// must not have the allocation hoisted out by CSE -- re-running the
/// optimized function still produces a fresh `[1]` every call.
pub fn volatile_loop() -> CliResult<ScalarRun> {
    let i = Name::original("i");
    let out = Name::original("out");
    let arr_ty = Type::array(Type::i64(), 1);

    let mut while_merge = Merge::new();
    while_merge.insert(
        i.clone(),
        (
            Expr::const_(Literal::I64(0)),
            Expr::typed(
                ExprKind::PrimCall(Prim::Add, vec![Expr::typed(ExprKind::Var(i.clone()), Type::i64()), Expr::const_(Literal::I64(1))]),
                Type::i64(),
            ),
        ),
    );
    while_merge.insert(
        out.clone(),
        (
            Expr::typed(ExprKind::Array(vec![Expr::const_(Literal::I64(0))]), arr_ty.clone()),
            Expr::typed(ExprKind::Var(out.clone()), arr_ty.clone()),
        ),
    );

    let f = parajit_ir::Function {
        name: "vol".into(),
        formal_args: Formal::positional_only(vec![]),
        body: vec![
            Stmt::While {
                cond: Expr::typed(
                    ExprKind::PrimCall(Prim::Lt, vec![Expr::typed(ExprKind::Var(i), Type::i64()), Expr::const_(Literal::I64(1))]),
                    Type::bool(),
                ),
                body: vec![Stmt::Assign(
                    LValue::Var(out.clone()),
                    Expr::typed(ExprKind::Array(vec![Expr::const_(Literal::I64(1))]), arr_ty.clone()),
                )],
                merge: while_merge,
            },
            Stmt::Return(Expr::typed(ExprKind::Var(out), arr_ty)),
        ],
        arg_types: Some(vec![]),
        return_type: Some(Type::array(Type::i64(), 1)),
        arg_names: vec![],
    };

    let names = NameSupply::new();
    let typed_functions = TypedFunctionCache::new();
    let pipeline = Pipeline::new(&names, &typed_functions);
    let optimized = pipeline
        .optimize(Arc::new(f), &PipelineConfig::default())
        .map_err(CliError::Compiler)?;
    let result = run_through_backend(optimized.clone(), vec![])?;
    Ok(ScalarRun { optimized, result })
}

fn register_scalar_fn(untyped: &UntypedFunctionRegistry, name: &str, arity: usize, body_builder: impl Fn(&[Name]) -> Vec<Stmt>) {
    let names: Vec<Name> = (0..arity).map(|i| Name::original(format!("p{i}"))).collect();
    let positional = names.iter().map(|n| n.base.clone()).collect();
    untyped
        .register(Function::new_untyped(name, Formal::positional_only(positional), body_builder(&names)))
        .expect("example callee name is unique within this run");
}

/// Dispatch `work_fn` across `workers` reference-runtime threads over
/// `input` and concatenate each worker's `output` slice
/// back into a single array, in partition order -- the reassembly step a
/// real dispatch wrapper performs once the runtime call returns.
fn dispatch_array(
    work_fn: &Arc<parajit_ir::Function>,
    catalog: HashMap<String, Arc<parajit_ir::Function>>,
    args_value: Value,
    num_iters: usize,
    workers: usize,
) -> CliResult<Vec<Value>> {
    let backend = ReferenceBackend::new();
    let artifact = backend
        .lower(work_fn.clone(), &|name| catalog.get(name).cloned())
        .map_err(CliError::Runtime)?;
    let dispatcher = ThreadPoolDispatch::new();
    let worker_count = workers.max(1).min(num_iters.max(1));
    let results = dispatcher
        .dispatch(&artifact, vec![args_value; worker_count], num_iters, Value::I32(0))
        .map_err(CliError::Runtime)?;

    let mut flattened = Vec::with_capacity(num_iters);
    for (worker_result, (start, stop)) in results.iter().zip(partition_ranges(num_iters, worker_count)) {
        let output = worker_result.struct_field("output").map_err(CliError::Runtime)?;
        match output {
            Value::Array(a) => {
                if a.len() != stop - start {
                    return Err(CliError::Runtime(parajit_runtime::Error::Interpreter(format!(
                        "worker produced {} elements for range [{start}, {stop})",
                        a.len()
                    ))));
                }
                flattened.extend(a.data.iter().cloned());
            }
            other => return Err(CliError::Runtime(parajit_runtime::Error::Interpreter(format!("expected array output, got {other:?}")))),
        }
    }
    Ok(flattened)
}

/// `map(double, [1, 2, 3, 4, 5, 6])` over `workers` reference-runtime
/// threads: synthesizes the work function for `double`, dispatches
/// it, and reassembles the doubled array.
pub fn map_double(input: Vec<i64>, workers: usize) -> CliResult<AdverbRun> {
    let names = NameSupply::new();
    let untyped = UntypedFunctionRegistry::new();
    let typed = TypedFunctionCache::new();
    register_scalar_fn(&untyped, "double", 1, |p| {
        vec![Stmt::Return(Expr::untyped(ExprKind::PrimCall(Prim::Mul, vec![Expr::var(p[0].clone()), Expr::const_(Literal::I64(2))])))]
    });

    let specializer = Specializer::new(&untyped, &typed);
    let double_typed = specializer.specialize("double", &[Type::i64()]).map_err(CliError::Compiler)?;

    let api = AdverbApi::new(&names, &untyped, &typed);
    let pipeline = Pipeline::new(&names, &typed);
    let spec = AdverbSpec::Map { f: "double".into(), arity: 1, axis: 0 };
    let arg_types = vec![Type::array(Type::i64(), 1)];
    let wrapper = api
        .specialize_wrapper(&spec, &arg_types, &pipeline, &PipelineConfig::default())
        .map_err(CliError::Compiler)?;
    let work_fn = api
        .synthesize_work_function(&spec, &wrapper, &CompilerOptions::default())
        .map_err(CliError::Compiler)?;

    let struct_ty = work_fn.function.arg_types.as_ref().and_then(|t| t.get(2)).cloned();
    let args_value = build_args_struct(&struct_ty, &[("arg0", Value::Array(parajit_runtime::ArrayValue { shape: vec![input.len()], data: input.iter().map(|v| Value::I64(*v)).collect() }))])?;

    let mut catalog = HashMap::new();
    catalog.insert("double".to_string(), double_typed);

    let n = input.len();
    let flattened = dispatch_array(&work_fn.function, catalog, args_value, n, workers)?;
    Ok(AdverbRun {
        work_function: work_fn.function.clone(),
        result: Value::Array(parajit_runtime::ArrayValue { shape: vec![n], data: flattened }),
    })
}

/// `reduce(identity, add, [1..=n], init=0)` over `workers` reference
/// threads: each worker sums its own slice, then the CLI combines the
/// per-worker partial sums sequentially with `add` -- exactly the final
/// step left to "the runtime" since ordering between workers is
/// unspecified and `combine` must be associative.
pub fn reduce_sum(input: Vec<i64>, workers: usize) -> CliResult<AdverbRun> {
    let names = NameSupply::new();
    let untyped = UntypedFunctionRegistry::new();
    let typed = TypedFunctionCache::new();
    register_scalar_fn(&untyped, "identity", 1, |p| vec![Stmt::Return(Expr::var(p[0].clone()))]);
    register_scalar_fn(&untyped, "add", 2, |p| {
        vec![Stmt::Return(Expr::untyped(ExprKind::PrimCall(Prim::Add, vec![Expr::var(p[0].clone()), Expr::var(p[1].clone())])))]
    });

    let specializer = Specializer::new(&untyped, &typed);
    let identity_typed = specializer.specialize("identity", &[Type::i64()]).map_err(CliError::Compiler)?;
    let add_typed = specializer.specialize("add", &[Type::i64(), Type::i64()]).map_err(CliError::Compiler)?;

    let api = AdverbApi::new(&names, &untyped, &typed);
    let pipeline = Pipeline::new(&names, &typed);
    let spec = AdverbSpec::Reduce { f: "identity".into(), combine: "add".into(), arity: 1, axis: 0 };
    let arg_types = vec![Type::array(Type::i64(), 1), Type::i64()];
    let wrapper = api
        .specialize_wrapper(&spec, &arg_types, &pipeline, &PipelineConfig::default())
        .map_err(CliError::Compiler)?;
    let work_fn = api
        .synthesize_work_function(&spec, &wrapper, &CompilerOptions::default())
        .map_err(CliError::Compiler)?;

    let struct_ty = work_fn.function.arg_types.as_ref().and_then(|t| t.get(2)).cloned();
    let args_value = build_args_struct(
        &struct_ty,
        &[
            ("arg0", Value::Array(parajit_runtime::ArrayValue { shape: vec![input.len()], data: input.iter().map(|v| Value::I64(*v)).collect() })),
            ("init", Value::I64(0)),
        ],
    )?;

    let mut catalog = HashMap::new();
    catalog.insert("identity".to_string(), identity_typed);
    catalog.insert("add".to_string(), add_typed.clone());

    let n = input.len();
    let backend = ReferenceBackend::new();
    let artifact = backend
        .lower(work_fn.function.clone(), &|name| catalog.get(name).cloned())
        .map_err(CliError::Runtime)?;
    let worker_count = workers.max(1).min(n.max(1));
    let dispatcher = ThreadPoolDispatch::new();
    let partials = dispatcher
        .dispatch(&artifact, vec![args_value; worker_count], n, Value::I32(0))
        .map_err(CliError::Runtime)?;

    let empty_functions = HashMap::new();
    let interp = Interpreter::new(&empty_functions);
    let mut acc = Value::I64(0);
    for partial in &partials {
        let output = partial.struct_field("output").map_err(CliError::Runtime)?.clone();
        acc = interp.call(&add_typed, vec![acc, output]).map_err(CliError::Runtime)?;
    }

    Ok(AdverbRun {
        work_function: work_fn.function.clone(),
        result: acc,
    })
}

fn build_args_struct(struct_ty: &Option<Type>, provided: &[(&str, Value)]) -> CliResult<Value> {
    let struct_ty = struct_ty.clone().ok_or_else(|| {
        CliError::Runtime(parajit_runtime::Error::Interpreter("work function has no args-struct type".into()))
    })?;
    let Type::Struct { name, fields } = struct_ty else {
        return Err(CliError::Runtime(parajit_runtime::Error::Interpreter("expected args-struct type".into())));
    };
    let mut values = Vec::with_capacity(fields.len());
    for field in &fields {
        let value = match provided.iter().find(|(n, _)| *n == field.name) {
            Some((_, v)) => v.clone(),
            None => Value::zero_of(&field.ty).map_err(CliError::Runtime)?,
        };
        values.push((field.name.clone(), value));
    }
    Ok(Value::Struct(name, values))
}
