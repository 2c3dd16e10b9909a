//! Adverb wrapping and parallel work-function synthesis.
//!
//! Two things live here, matching the two-level structure adverb
//! dispatch requires:
//!
//! 1. A front facade ([`AdverbApi::wrap`]) that, given an adverb kind plus
//!    the callee/combine/emit function names involved, produces (and
//!    registers, idempotently) a thin *untyped wrapper function* whose body
//!    is exactly the adverb expression. This is the vehicle that lets an
//!    adverb call at the host boundary go through the ordinary
//!    specialize -> optimize pipeline like any other function --
//!    `infer_adverb` in `infer.rs` already derives the adverb's own result
//!    type once this wrapper is specialized.
//! 2. Work-function synthesis ([`AdverbApi::synthesize_work_function`]),
//!    which takes that specialized-and-optimized wrapper and produces the
//!    parallel work function keyed on `(adverb_kind, callee_name,
//!    argument_types)`: a specialization-args struct carrying one field per
//!    wrapper argument plus `output`, and a work function with the fixed
//!    `(start, stop, args, tile_sizes)` signature whose body slices each
//!    array argument to `[start, stop)` and re-issues the adverb over the
//!    slice. Replicating the args struct per worker and dispatching is
//!    `parajit-runtime`'s job, consuming the `Function` this returns
//!    through `BackendLowering`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use parajit_ir::{
    AdverbExpr, AdverbKind, Callee, Expr, ExprKind, Field, Formal, Function, GroundType, LValue,
    Literal, Name, NameSupply, Stmt, StructRegistry, Type, TypedFunctionCache,
    UntypedFunctionRegistry,
};

use crate::error::{Error, Result};
use crate::infer::{infer_function, Specializer};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::simplify::Simplify;
use crate::walker::run_to_fixpoint;

/// `CompilerOptions` bundles the pipeline's own config with the knobs
/// specific to adverb synthesis, mirroring the familiar
/// `CompileOptions` aggregate shape.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub pipeline: PipelineConfig,
    /// Cap on Simplify fixpoint iterations when normalizing a synthesized
    /// work function. Work functions are small (one adverb call, one
    /// attribute write) and converge in a handful of iterations; kept
    /// separate from the main pipeline's cap so callers can tune each
    /// independently.
    pub max_simplify_iters: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            pipeline: PipelineConfig::default(),
            max_simplify_iters: 8,
        }
    }
}

/// A fully described adverb call site: which adverb, which callee(s), how
/// many positional array/scalar arguments, and the call-site axis: an
/// integer constant fixed at call-site syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdverbSpec {
    Map {
        f: String,
        arity: usize,
        axis: i64,
    },
    AllPairs {
        f: String,
        axis: i64,
    },
    Reduce {
        f: String,
        combine: String,
        arity: usize,
        axis: i64,
    },
    Scan {
        f: String,
        combine: String,
        emit: String,
        arity: usize,
        axis: i64,
    },
}

impl AdverbSpec {
    pub fn kind(&self) -> AdverbKind {
        match self {
            AdverbSpec::Map { .. } => AdverbKind::Map,
            AdverbSpec::AllPairs { .. } => AdverbKind::AllPairs,
            AdverbSpec::Reduce { .. } => AdverbKind::Reduce,
            AdverbSpec::Scan { .. } => AdverbKind::Scan,
        }
    }

    pub fn callee(&self) -> &str {
        match self {
            AdverbSpec::Map { f, .. }
            | AdverbSpec::AllPairs { f, .. }
            | AdverbSpec::Reduce { f, .. }
            | AdverbSpec::Scan { f, .. } => f,
        }
    }

    pub fn axis(&self) -> i64 {
        match self {
            AdverbSpec::Map { axis, .. }
            | AdverbSpec::AllPairs { axis, .. }
            | AdverbSpec::Reduce { axis, .. }
            | AdverbSpec::Scan { axis, .. } => *axis,
        }
    }

    /// Number of positional array/scalar arguments, excluding `init` --
    /// `Reduce`/`Scan` carry `init` as its own field in the IR, not part
    /// of `args`. `AllPairs` is always binary (`x`, `y`).
    pub fn arity(&self) -> usize {
        match self {
            AdverbSpec::Map { arity, .. } => *arity,
            AdverbSpec::AllPairs { .. } => 2,
            AdverbSpec::Reduce { arity, .. } => *arity,
            AdverbSpec::Scan { arity, .. } => *arity,
        }
    }

    pub fn has_init(&self) -> bool {
        matches!(self, AdverbSpec::Reduce { .. } | AdverbSpec::Scan { .. })
    }

    /// Name of the untyped wrapper function this spec produces. Includes
    /// the axis so two call sites over the same callee at different axes
    /// don't collide -- axis is baked into the wrapper body as a literal,
    /// not threaded through as an argument.
    pub fn wrapper_name(&self) -> String {
        format!("{}${}@{}", self.kind(), self.callee(), self.axis())
    }
}

/// Memoization key for a synthesized work function: `(adverb_kind,
/// callee_name, argument_types)`. `Type` isn't `Hash` (it
/// nests `Vec<Type>`/`String` in ways not worth deriving it for), so the
/// key is the same triple rendered through `Display` -- two argument-type
/// tuples that print identically are structurally identical for every type
/// this IR can express.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkFunctionKey(String);

impl WorkFunctionKey {
    pub fn new(adverb: AdverbKind, callee: &str, arg_types: &[Type]) -> Self {
        let types = arg_types
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        WorkFunctionKey(format!("{}:{}({})", adverb, callee, types))
    }
}

impl std::fmt::Display for WorkFunctionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A synthesized, typed, Simplify-normalized work function plus the key it
/// was memoized under.
#[derive(Debug, Clone)]
pub struct WorkFunction {
    pub key: WorkFunctionKey,
    pub function: Arc<Function>,
}

/// Front facade and work-function synthesizer for the four adverbs --
/// the adverb API and work-function synthesis. Holds its own struct
/// registry (for specialization-args struct types) and work-function
/// memoization table; shares the untyped registry, typed-function cache,
/// and fresh-name supply with the rest of the pipeline.
pub struct AdverbApi<'a> {
    names: &'a NameSupply,
    untyped: &'a UntypedFunctionRegistry,
    typed: &'a TypedFunctionCache,
    structs: Mutex<StructRegistry>,
    work_fns: Mutex<HashMap<WorkFunctionKey, Arc<Function>>>,
}

impl<'a> AdverbApi<'a> {
    pub fn new(
        names: &'a NameSupply,
        untyped: &'a UntypedFunctionRegistry,
        typed: &'a TypedFunctionCache,
    ) -> Self {
        AdverbApi {
            names,
            untyped,
            typed,
            structs: Mutex::new(StructRegistry::new()),
            work_fns: Mutex::new(HashMap::new()),
        }
    }

    /// Produce the untyped wrapper function for `spec`, registering it on
    /// first use and returning the existing registration on every
    /// subsequent call for the same `(kind, callee, axis)` -- registries are
    /// append-only, so this checks before registering rather than
    /// treating a second call as an error.
    #[tracing::instrument(skip(self, spec), fields(wrapper = %spec.wrapper_name()))]
    pub fn wrap(&self, spec: &AdverbSpec) -> Result<Arc<Function>> {
        let name = spec.wrapper_name();
        if self.untyped.contains(&name) {
            tracing::debug!("adverb wrapper already registered");
            return Ok(self.untyped.get(&name)?);
        }

        let mut positional: Vec<String> = (0..spec.arity()).map(|i| format!("arg{i}")).collect();
        if spec.has_init() {
            positional.push("init".to_string());
        }

        let arg_var = |i: usize| Expr::var(Name::original(format!("arg{i}")));

        let adverb = match spec {
            AdverbSpec::Map { f, axis, arity } => AdverbExpr::Map {
                f: Callee::Named(f.clone()),
                args: (0..*arity).map(arg_var).collect(),
                axis: *axis,
            },
            AdverbSpec::AllPairs { f, axis } => AdverbExpr::AllPairs {
                f: Callee::Named(f.clone()),
                x: arg_var(0),
                y: arg_var(1),
                axis: *axis,
            },
            AdverbSpec::Reduce {
                f,
                combine,
                axis,
                arity,
            } => AdverbExpr::Reduce {
                f: Callee::Named(f.clone()),
                combine: Callee::Named(combine.clone()),
                args: (0..*arity).map(arg_var).collect(),
                init: Expr::var(Name::original("init")),
                axis: *axis,
            },
            AdverbSpec::Scan {
                f,
                combine,
                emit,
                axis,
                arity,
            } => AdverbExpr::Scan {
                f: Callee::Named(f.clone()),
                combine: Callee::Named(combine.clone()),
                emit: Callee::Named(emit.clone()),
                args: (0..*arity).map(arg_var).collect(),
                init: Expr::var(Name::original("init")),
                axis: *axis,
            },
        };

        let body = vec![Stmt::Return(Expr::untyped(ExprKind::Adverb(Box::new(
            adverb,
        ))))];
        let function = Function::new_untyped(name, Formal::positional_only(positional), body);
        Ok(self.untyped.register(function)?)
    }

    /// Specialize and optimize `spec`'s wrapper over `arg_types` (the
    /// adverb call's own argument types, `init`'s type last for
    /// `Reduce`/`Scan`). The returned function's `return_type` is the
    /// adverb's result type, derived by `infer_adverb` during
    /// specialization; its `arg_types` is exactly `arg_types` again, ready
    /// to feed `synthesize_work_function`.
    #[tracing::instrument(skip(self, spec, arg_types, pipeline, config), fields(wrapper = %spec.wrapper_name()))]
    pub fn specialize_wrapper(
        &self,
        spec: &AdverbSpec,
        arg_types: &[Type],
        pipeline: &Pipeline<'_>,
        config: &PipelineConfig,
    ) -> Result<Arc<Function>> {
        self.wrap(spec)?;
        let specializer = Specializer::new(self.untyped, self.typed);
        let typed = specializer.specialize(&spec.wrapper_name(), arg_types)?;
        pipeline.optimize(typed, config)
    }

    /// Synthesize (or return the memoized) parallel work function for
    /// `spec`, given its already specialized-and-optimized `wrapper`.
    #[tracing::instrument(skip(self, spec, wrapper, options), fields(wrapper_name = %spec.wrapper_name()))]
    pub fn synthesize_work_function(
        &self,
        spec: &AdverbSpec,
        wrapper: &Arc<Function>,
        options: &CompilerOptions,
    ) -> Result<Arc<WorkFunction>> {
        let arg_types = wrapper.arg_types.clone().ok_or_else(|| Error::InferenceError {
            node: spec.wrapper_name(),
            reason: "wrapper must be specialized before work-function synthesis".into(),
        })?;

        let key = WorkFunctionKey::new(spec.kind(), spec.callee(), &arg_types);
        if let Some(hit) = self
            .work_fns
            .lock()
            .expect("work-function cache poisoned")
            .get(&key)
        {
            tracing::debug!(key = %key, "work-function cache hit");
            return Ok(Arc::new(WorkFunction {
                key,
                function: hit.clone(),
            }));
        }
        tracing::debug!(key = %key, "work-function cache miss");

        let output_ty = wrapper.return_type.clone().ok_or_else(|| Error::InferenceError {
            node: spec.wrapper_name(),
            reason: "wrapper has no inferred return type".into(),
        })?;

        let mut fields: Vec<Field> = Vec::with_capacity(arg_types.len() + 1);
        for (i, ty) in arg_types.iter().enumerate() {
            let is_init = spec.has_init() && i == arg_types.len() - 1;
            fields.push(Field {
                name: if is_init {
                    "init".to_string()
                } else {
                    format!("arg{i}")
                },
                ty: ty.clone(),
            });
        }
        fields.push(Field {
            name: "output".to_string(),
            ty: output_ty,
        });

        // Keyed on the full memoization key, not just the wrapper name:
        // two specializations of the same wrapper over different
        // argument types must not collide on one interned struct name,
        // since `StructRegistry::intern` keeps only the first layout
        // registered under a given name.
        let struct_name = sanitize_struct_name(&key.to_string());
        let args_ty = self
            .structs
            .lock()
            .expect("struct registry poisoned")
            .intern(struct_name, fields.clone());

        let untyped_work_fn = build_work_function(self.names, spec, &fields);
        let ptr_i32 = Type::Ground(GroundType::Ptr(Box::new(GroundType::I32)));
        let work_fn_arg_types = vec![Type::i32(), Type::i32(), args_ty, ptr_i32];
        let typed = infer_function(&untyped_work_fn, &work_fn_arg_types)?;

        let mut simplify = Simplify::new(self.names);
        let simplified = run_to_fixpoint(&mut simplify, typed, options.max_simplify_iters)?;

        let arc = Arc::new(simplified);
        let mut cache = self.work_fns.lock().expect("work-function cache poisoned");
        let arc = cache.entry(key.clone()).or_insert_with(|| arc.clone()).clone();
        Ok(Arc::new(WorkFunction {
            key,
            function: arc,
        }))
    }
}

fn sanitize_struct_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("WorkArgs_{cleaned}")
}

/// Build the untyped work function body: for each positional
/// field, a scalar is read straight off `args`; an array is sliced to
/// `[start, stop)` first. The init field (if any) is read straight off
/// `args` too -- each worker folds its own slice starting from the same
/// `init`; combining partial results across workers is the runtime's job
/// (`Reduce`'s combine must be associative). The inner adverb call is
/// then reissued over the (sliced) values and its result written to
/// `args.output`.
fn build_work_function(names: &NameSupply, spec: &AdverbSpec, fields: &[Field]) -> Function {
    let args_name = Name::original("args");
    let start = Name::original("start");
    let stop = Name::original("stop");

    let mut body = Vec::new();
    let mut sliced: Vec<Expr> = Vec::with_capacity(spec.arity());

    for field in fields.iter().take(spec.arity()) {
        let attr = Expr::untyped(ExprKind::Attribute(
            Box::new(Expr::var(args_name.clone())),
            field.name.clone(),
        ));
        let value = if field.ty.is_ground() {
            attr
        } else {
            Expr::untyped(ExprKind::Index(
                Box::new(attr),
                Box::new(Expr::untyped(ExprKind::Slice {
                    start: Box::new(Expr::var(start.clone())),
                    stop: Box::new(Expr::var(stop.clone())),
                    step: Box::new(Expr::const_(Literal::I64(1))),
                })),
            ))
        };
        let tmp = names.fresh(field.name.clone());
        body.push(Stmt::Assign(LValue::Var(tmp.clone()), value));
        sliced.push(Expr::var(tmp));
    }

    let init_expr = if spec.has_init() {
        let attr = Expr::untyped(ExprKind::Attribute(
            Box::new(Expr::var(args_name.clone())),
            "init".to_string(),
        ));
        let tmp = names.fresh("init");
        body.push(Stmt::Assign(LValue::Var(tmp.clone()), attr));
        Some(Expr::var(tmp))
    } else {
        None
    };

    let adverb = match spec {
        AdverbSpec::Map { f, axis, .. } => AdverbExpr::Map {
            f: Callee::Named(f.clone()),
            args: sliced,
            axis: *axis,
        },
        AdverbSpec::AllPairs { f, axis, .. } => AdverbExpr::AllPairs {
            f: Callee::Named(f.clone()),
            x: sliced[0].clone(),
            y: sliced[1].clone(),
            axis: *axis,
        },
        AdverbSpec::Reduce {
            f, combine, axis, ..
        } => AdverbExpr::Reduce {
            f: Callee::Named(f.clone()),
            combine: Callee::Named(combine.clone()),
            args: sliced,
            init: init_expr.expect("Reduce always carries init"),
            axis: *axis,
        },
        AdverbSpec::Scan {
            f,
            combine,
            emit,
            axis,
            ..
        } => AdverbExpr::Scan {
            f: Callee::Named(f.clone()),
            combine: Callee::Named(combine.clone()),
            emit: Callee::Named(emit.clone()),
            args: sliced,
            init: init_expr.expect("Scan always carries init"),
            axis: *axis,
        },
    };

    let result = names.fresh("result");
    body.push(Stmt::Assign(
        LValue::Var(result.clone()),
        Expr::untyped(ExprKind::Adverb(Box::new(adverb))),
    ));
    body.push(Stmt::Assign(
        LValue::Attribute(Box::new(Expr::var(args_name)), "output".to_string()),
        Expr::var(result.clone()),
    ));
    body.push(Stmt::Return(Expr::var(result)));

    let formal = Formal::positional_only(vec![
        "start".to_string(),
        "stop".to_string(),
        "args".to_string(),
        "tile_sizes".to_string(),
    ]);

    Function::new_untyped(format!("__work_{}", spec.wrapper_name()), formal, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parajit_ir::{Expr as IrExpr, ExprKind as IrExprKind, Prim, Type};

    fn add_one_fn(untyped: &UntypedFunctionRegistry) {
        untyped
            .register(Function::new_untyped(
                "add_one",
                Formal::positional_only(vec!["x".into()]),
                vec![Stmt::Return(IrExpr::untyped(IrExprKind::PrimCall(
                    Prim::Add,
                    vec![
                        IrExpr::var(Name::original("x")),
                        IrExpr::const_(Literal::I32(1)),
                    ],
                )))],
            ))
            .unwrap();
    }

    #[test]
    fn wrap_is_idempotent() {
        let names = NameSupply::new();
        let untyped = UntypedFunctionRegistry::new();
        let typed = TypedFunctionCache::new();
        add_one_fn(&untyped);
        let api = AdverbApi::new(&names, &untyped, &typed);

        let spec = AdverbSpec::Map {
            f: "add_one".into(),
            arity: 1,
            axis: 0,
        };
        let a = api.wrap(&spec).unwrap();
        let b = api.wrap(&spec).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn map_wrapper_specializes_to_array_return_type() {
        let names = NameSupply::new();
        let untyped = UntypedFunctionRegistry::new();
        let typed = TypedFunctionCache::new();
        add_one_fn(&untyped);
        let api = AdverbApi::new(&names, &untyped, &typed);
        let pipeline = Pipeline::new(&names, &typed);

        let spec = AdverbSpec::Map {
            f: "add_one".into(),
            arity: 1,
            axis: 0,
        };
        let arg_types = vec![Type::array(Type::i32(), 1)];
        let wrapper = api
            .specialize_wrapper(&spec, &arg_types, &pipeline, &PipelineConfig::default())
            .unwrap();
        assert_eq!(wrapper.return_type, Some(Type::array(Type::i32(), 1)));
    }

    #[test]
    fn synthesize_work_function_builds_args_struct_with_output_field() {
        let names = NameSupply::new();
        let untyped = UntypedFunctionRegistry::new();
        let typed = TypedFunctionCache::new();
        add_one_fn(&untyped);
        let api = AdverbApi::new(&names, &untyped, &typed);
        let pipeline = Pipeline::new(&names, &typed);

        let spec = AdverbSpec::Map {
            f: "add_one".into(),
            arity: 1,
            axis: 0,
        };
        let arg_types = vec![Type::array(Type::i32(), 1)];
        let wrapper = api
            .specialize_wrapper(&spec, &arg_types, &pipeline, &PipelineConfig::default())
            .unwrap();
        let work_fn = api
            .synthesize_work_function(&spec, &wrapper, &CompilerOptions::default())
            .unwrap();

        assert_eq!(work_fn.function.formal_args.arity(), 4);
        match &work_fn.function.arg_types {
            Some(types) => match &types[2] {
                Type::Struct { fields, .. } => {
                    assert_eq!(fields.len(), 2);
                    assert_eq!(fields[0].name, "arg0");
                    assert_eq!(fields[1].name, "output");
                }
                other => panic!("expected struct arg type, got {other:?}"),
            },
            None => panic!("work function must be typed"),
        }
    }

    #[test]
    fn synthesize_work_function_is_memoized_by_key() {
        let names = NameSupply::new();
        let untyped = UntypedFunctionRegistry::new();
        let typed = TypedFunctionCache::new();
        add_one_fn(&untyped);
        let api = AdverbApi::new(&names, &untyped, &typed);
        let pipeline = Pipeline::new(&names, &typed);

        let spec = AdverbSpec::Map {
            f: "add_one".into(),
            arity: 1,
            axis: 0,
        };
        let arg_types = vec![Type::array(Type::i32(), 1)];
        let wrapper = api
            .specialize_wrapper(&spec, &arg_types, &pipeline, &PipelineConfig::default())
            .unwrap();
        let first = api
            .synthesize_work_function(&spec, &wrapper, &CompilerOptions::default())
            .unwrap();
        let second = api
            .synthesize_work_function(&spec, &wrapper, &CompilerOptions::default())
            .unwrap();
        assert!(Arc::ptr_eq(&first.function, &second.function));
    }

    #[test]
    fn reduce_wrapper_carries_init_as_trailing_positional() {
        let names = NameSupply::new();
        let untyped = UntypedFunctionRegistry::new();
        let typed = TypedFunctionCache::new();
        add_one_fn(&untyped);
        untyped
            .register(Function::new_untyped(
                "add",
                Formal::positional_only(vec!["a".into(), "b".into()]),
                vec![Stmt::Return(IrExpr::untyped(IrExprKind::PrimCall(
                    Prim::Add,
                    vec![
                        IrExpr::var(Name::original("a")),
                        IrExpr::var(Name::original("b")),
                    ],
                )))],
            ))
            .unwrap();
        let api = AdverbApi::new(&names, &untyped, &typed);

        let spec = AdverbSpec::Reduce {
            f: "add_one".into(),
            combine: "add".into(),
            arity: 1,
            axis: 0,
        };
        let wrapper = api.wrap(&spec).unwrap();
        assert_eq!(
            wrapper.formal_args.positional,
            vec!["arg0".to_string(), "init".to_string()]
        );
    }
}
