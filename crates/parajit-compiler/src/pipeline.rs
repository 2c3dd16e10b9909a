//! The `optimize` driver: a fixed `[Simplify, Inliner, Simplify]`
//! pipeline, each pass run to its own fixpoint with a DCE sweep between
//! stages, memoized in an optimized-function cache keyed by function name
//! alone, since a typed function's name already uniquely determines its
//! `arg_types` once specialized.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use parajit_ir::{Function, NameSupply, TypedFunctionCache};

use crate::dce::Dce;
use crate::error::Result;
use crate::inline::Inliner;
use crate::simplify::Simplify;
use crate::walker::{run_to_fixpoint, Phase};

/// Cap on fixpoint iterations per pass invocation within one `optimize`
/// call. Separate from `run_to_fixpoint`'s own cap parameter so pipeline
/// callers can tune it without touching the transform framework.
pub const DEFAULT_MAX_PASS_ITERS: usize = 32;

/// `opt_tile`: whether adverb lowering should apply its tile-size
/// optimization when synthesizing work functions, consulted by
/// `adverb.rs`, not by this driver directly. `copy`: see `Pipeline::optimize`.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub opt_tile: bool,
    pub copy: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            opt_tile: true,
            copy: true,
        }
    }
}

pub struct Pipeline<'a> {
    names: &'a NameSupply,
    typed_functions: &'a TypedFunctionCache,
    cache: Mutex<HashMap<String, Arc<Function>>>,
    max_pass_iters: usize,
}

impl<'a> Pipeline<'a> {
    pub fn new(names: &'a NameSupply, typed_functions: &'a TypedFunctionCache) -> Self {
        Pipeline {
            names,
            typed_functions,
            cache: Mutex::new(HashMap::new()),
            max_pass_iters: DEFAULT_MAX_PASS_ITERS,
        }
    }

    pub fn cached(&self, name: &str) -> Option<Arc<Function>> {
        self.cache.lock().expect("optimize cache mutex poisoned").get(name).cloned()
    }

    /// Optimize `f`, or return the cached result if this function name was
    /// optimized before. `config.copy` picks how the pipeline obtains an
    /// owned `Function` to transform out of the `Arc` the specializer
    /// handed back: `true` always clones (safe when the caller keeps its
    /// own `Arc` alive elsewhere), `false` tries `Arc::try_unwrap` first
    /// and only clones if another reference is still outstanding.
    #[tracing::instrument(skip(self, f), fields(function = %f.name))]
    pub fn optimize(&self, f: Arc<Function>, config: &PipelineConfig) -> Result<Arc<Function>> {
        if let Some(cached) = self.cached(&f.name) {
            tracing::debug!(function = %f.name, "optimize cache hit");
            return Ok(cached);
        }

        let name = f.name.clone();
        let owned = if config.copy {
            (*f).clone()
        } else {
            match Arc::try_unwrap(f) {
                Ok(owned) => owned,
                Err(shared) => (*shared).clone(),
            }
        };

        let optimized = self.run_stages(owned)?;
        let result = Arc::new(optimized);
        let mut cache = self.cache.lock().expect("optimize cache mutex poisoned");
        let result = cache.entry(name).or_insert_with(|| result.clone()).clone();
        Ok(result)
    }

    fn run_stages(&self, f: Function) -> Result<Function> {
        let mut simplify = Simplify::new(self.names);
        let f = run_to_fixpoint(&mut simplify, f, self.max_pass_iters)?;
        let f = self.dce(f)?;

        let mut inliner = Inliner::new(self.names, self.typed_functions);
        let f = run_to_fixpoint(&mut inliner, f, self.max_pass_iters)?;
        let f = self.dce(f)?;

        let mut simplify_again = Simplify::new(self.names);
        let f = run_to_fixpoint(&mut simplify_again, f, self.max_pass_iters)?;
        self.dce(f)
    }

    fn dce(&self, f: Function) -> Result<Function> {
        let mut dce = Dce::new();
        let (f, _changed) = dce.apply(f)?;
        Ok(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parajit_ir::{Expr, ExprKind, Formal, Literal, Name, Prim, Type};

    fn const_fold_candidate() -> Function {
        let y = Name::original("y");
        Function {
            name: "f".into(),
            formal_args: Formal::positional_only(vec![]),
            body: vec![
                Stmt::Assign(
                    parajit_ir::LValue::Var(y.clone()),
                    Expr::typed(
                        ExprKind::PrimCall(Prim::Add, vec![Expr::const_(Literal::I32(1)), Expr::const_(Literal::I32(2))]),
                        Type::i32(),
                    ),
                ),
                Stmt::Return(Expr::typed(ExprKind::Var(y), Type::i32())),
            ],
            arg_types: Some(vec![]),
            return_type: Some(Type::i32()),
            arg_names: vec![],
        }
    }

    use parajit_ir::Stmt;

    #[test]
    fn optimize_folds_constants_and_caches_by_name() {
        let names = NameSupply::new();
        let typed_functions = TypedFunctionCache::new();
        let pipeline = Pipeline::new(&names, &typed_functions);

        let f = Arc::new(const_fold_candidate());
        let optimized = pipeline.optimize(f, &PipelineConfig::default()).unwrap();
        match &optimized.body[0] {
            Stmt::Return(e) => assert_eq!(e.kind, ExprKind::Const(Literal::I32(3))),
            other => panic!("expected folded Return, got {other:?}"),
        }

        let second = pipeline.optimize(Arc::new(const_fold_candidate()), &PipelineConfig::default()).unwrap();
        assert!(Arc::ptr_eq(&optimized, &second));
    }

    /// Two quantified invariants, exercised together over
    /// randomly generated straight-line integer functions rather than
    /// hand-picked cases: "`optimize(optimize(f)) == optimize(f))`"
    /// (structural equality, checked here by optimizing two independently
    /// built copies of the same random function under distinct names
    /// since `Pipeline`'s cache is keyed by name) and "every node in a
    /// typed function carries a type; re-running inference on the output
    /// produces the same types" (checked by feeding the optimized body
    /// back through `infer_function` and comparing the inferred return
    /// type against the one `optimize` produced).
    mod random_program_properties {
        use super::*;
        use crate::infer::infer_function;
        use parajit_ir::{Expr, ExprKind, Formal, Literal, Name, Prim};
        use rand::{Rng, SeedableRng};
        use rand_chacha::ChaCha8Rng;

        fn random_expr(rng: &mut ChaCha8Rng, depth: u32) -> Expr {
            if depth == 0 || rng.gen_bool(0.35) {
                if rng.gen_bool(0.5) {
                    Expr::var(Name::original("x"))
                } else {
                    Expr::untyped(ExprKind::Const(Literal::I32(rng.gen_range(-20..=20))))
                }
            } else {
                let prim = [Prim::Add, Prim::Sub, Prim::Mul][rng.gen_range(0..3)];
                let lhs = random_expr(rng, depth - 1);
                let rhs = random_expr(rng, depth - 1);
                Expr::untyped(ExprKind::PrimCall(prim, vec![lhs, rhs]))
            }
        }

        fn random_untyped_function(rng: &mut ChaCha8Rng, name: &str) -> Function {
            Function::new_untyped(
                name,
                Formal::positional_only(vec!["x".into()]),
                vec![Stmt::Return(random_expr(rng, 4))],
            )
        }

        #[test]
        fn optimize_is_idempotent_and_preserves_types_on_random_programs() {
            let mut rng = ChaCha8Rng::seed_from_u64(0xA55A_C0DE);
            let names = NameSupply::new();
            let typed_functions = TypedFunctionCache::new();
            let pipeline = Pipeline::new(&names, &typed_functions);

            for i in 0..200 {
                let seed_fn = random_untyped_function(&mut rng, &format!("rand_{i}_a"));
                let typed = infer_function(&seed_fn, &[Type::i32()]).unwrap();

                let optimized = pipeline
                    .optimize(Arc::new(typed.clone()), &PipelineConfig::default())
                    .unwrap();

                // Idempotence: optimizing a second, independently-typed copy
                // of the same program (under a distinct cache key) yields a
                // structurally identical function.
                let mut again_fn = seed_fn.clone();
                again_fn.name = format!("rand_{i}_b");
                let typed_again = infer_function(&again_fn, &[Type::i32()]).unwrap();
                let optimized_again = pipeline
                    .optimize(Arc::new(typed_again), &PipelineConfig::default())
                    .unwrap();
                assert_eq!(optimized.body, optimized_again.body, "program {i} not idempotent");
                assert_eq!(optimized.return_type, optimized_again.return_type);

                // Type preservation: re-inferring over the optimized body
                // (itself still untyped-compatible input, since `infer_expr`
                // never consults a node's pre-existing `ty`) must recover
                // the same return type `optimize` settled on.
                let mut reinferred_source = (*optimized).clone();
                reinferred_source.arg_types = None;
                reinferred_source.return_type = None;
                let reinferred = infer_function(&reinferred_source, &[Type::i32()]).unwrap();
                assert_eq!(reinferred.return_type, optimized.return_type, "program {i} changed type on re-inference");
            }
        }
    }
}
