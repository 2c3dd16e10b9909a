//! End-to-end scenarios for `Pipeline::optimize`: build already-typed
//! `Function` literals directly (the way `inline.rs`'s and `pipeline.rs`'s
//! unit tests do -- `infer_expr`'s `Call` arm expects a pre-typed callee,
//! so these can't be driven through the untyped specializer without first
//! hand-annotating a catalog), run them through the real pipeline, and
//! check both the resulting IR shape and, via the reference interpreter,
//! the value the optimized function actually computes.

use std::collections::HashMap;
use std::sync::Arc;

use parajit_compiler::{Pipeline, PipelineConfig};
use parajit_ir::{
    Expr, ExprKind, Formal, LValue, Literal, Merge, Name, NameSupply, Prim, Stmt, Type,
    TypedFunctionCache,
};
use parajit_runtime::{Interpreter, Value};

fn call_optimized(f: &parajit_ir::Function, args: Vec<Value>) -> Value {
    let functions = HashMap::new();
    let interp = Interpreter::new(&functions);
    interp.call(f, args).unwrap()
}

#[test]
fn inlining_chain_collapses_to_a_single_addition() {
    let x = Name::original("x");

    let a = parajit_ir::Function {
        name: "A".into(),
        formal_args: Formal::positional_only(vec!["x".into()]),
        body: vec![Stmt::Return(Expr::typed(
            ExprKind::PrimCall(Prim::Add, vec![Expr::typed(ExprKind::Var(x.clone()), Type::i32()), Expr::const_(Literal::I32(1))]),
            Type::i32(),
        ))],
        arg_types: Some(vec![Type::i32()]),
        return_type: Some(Type::i32()),
        arg_names: vec![x.clone()],
    };

    let b = parajit_ir::Function {
        name: "B".into(),
        formal_args: Formal::positional_only(vec!["x".into()]),
        body: vec![Stmt::Return(Expr::typed(
            ExprKind::Call(parajit_ir::Callee::Named("A".into()), vec![Expr::typed(ExprKind::Var(x.clone()), Type::i32())]),
            Type::i32(),
        ))],
        arg_types: Some(vec![Type::i32()]),
        return_type: Some(Type::i32()),
        arg_names: vec![x.clone()],
    };

    let c = parajit_ir::Function {
        name: "C".into(),
        formal_args: Formal::positional_only(vec!["x".into()]),
        body: vec![Stmt::Return(Expr::typed(
            ExprKind::Call(parajit_ir::Callee::Named("B".into()), vec![Expr::typed(ExprKind::Var(x), Type::i32())]),
            Type::i32(),
        ))],
        arg_types: Some(vec![Type::i32()]),
        return_type: Some(Type::i32()),
        arg_names: vec![Name::original("x")],
    };

    let typed_functions = TypedFunctionCache::new();
    typed_functions.insert(vec![Type::i32()], a);
    typed_functions.insert(vec![Type::i32()], b);

    let names = NameSupply::new();
    let pipeline = Pipeline::new(&names, &typed_functions);
    let optimized = pipeline.optimize(Arc::new(c), &PipelineConfig::default()).unwrap();

    assert!(optimized.body.len() <= 2);
    assert!(!optimized.body.iter().any(|s| matches!(s, Stmt::Assign(_, e) if matches!(e.kind, ExprKind::Call(..)))
        || matches!(s, Stmt::Return(e) if matches!(e.kind, ExprKind::Call(..)))));

    assert_eq!(call_optimized(&optimized, vec![Value::I32(1)]), Value::I32(2));
}

#[test]
fn constant_folding_chain_reduces_to_the_formal() {
    let x = Name::original("x");
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
                Expr::typed(ExprKind::PrimCall(Prim::Mul, vec![Expr::const_(Literal::I32(4)), Expr::const_(Literal::I32(1))]), Type::i32()),
            ),
            Stmt::Assign(
                LValue::Var(z.clone()),
                Expr::typed(ExprKind::PrimCall(Prim::Add, vec![Expr::typed(ExprKind::Var(y), Type::i32()), Expr::const_(Literal::I32(1))]), Type::i32()),
            ),
            Stmt::Assign(
                LValue::Var(a.clone()),
                Expr::typed(ExprKind::PrimCall(Prim::Div, vec![Expr::typed(ExprKind::Var(z), Type::i32()), Expr::const_(Literal::I32(5))]), Type::i32()),
            ),
            Stmt::Assign(
                LValue::Var(b.clone()),
                Expr::typed(
                    ExprKind::PrimCall(Prim::Mul, vec![Expr::typed(ExprKind::Var(x.clone()), Type::i32()), Expr::typed(ExprKind::Var(a), Type::i32())]),
                    Type::i32(),
                ),
            ),
            Stmt::Return(Expr::typed(ExprKind::Var(b), Type::i32())),
        ],
        arg_types: Some(vec![Type::i32()]),
        return_type: Some(Type::i32()),
        arg_names: vec![x],
    };

    let names = NameSupply::new();
    let typed_functions = TypedFunctionCache::new();
    let pipeline = Pipeline::new(&names, &typed_functions);
    let optimized = pipeline.optimize(Arc::new(f), &PipelineConfig::default()).unwrap();

    assert_eq!(optimized.body.len(), 1);
    match &optimized.body[0] {
        Stmt::Return(e) => assert!(matches!(e.kind, ExprKind::Var(_))),
        other => panic!("expected a single Return, got {other:?}"),
    }
    assert_eq!(call_optimized(&optimized, vec![Value::I32(1)]), Value::I32(1));
}

#[test]
fn constants_across_control_flow_phi_collapse_to_a_single_return() {
    let x = Name::original("x");
    let b = Name::original("b");
    let mut merge = Merge::new();
    merge.insert(x.clone(), (Expr::const_(Literal::I32(1)), Expr::const_(Literal::I32(1))));

    let g = parajit_ir::Function {
        name: "g".into(),
        formal_args: Formal::positional_only(vec!["b".into()]),
        body: vec![
            Stmt::If {
                cond: Expr::typed(ExprKind::Var(b.clone()), Type::bool()),
                true_block: vec![],
                false_block: vec![],
                merge,
            },
            Stmt::Return(Expr::typed(ExprKind::Var(x), Type::i32())),
        ],
        arg_types: Some(vec![Type::bool()]),
        return_type: Some(Type::i32()),
        arg_names: vec![b],
    };

    let names = NameSupply::new();
    let typed_functions = TypedFunctionCache::new();
    let pipeline = Pipeline::new(&names, &typed_functions);
    let optimized = pipeline.optimize(Arc::new(g), &PipelineConfig::default()).unwrap();

    assert_eq!(optimized.body.len(), 1);
    assert_eq!(call_optimized(&optimized, vec![Value::Bool(true)]), Value::I32(1));
}

#[test]
fn always_true_branch_reduces_to_the_taken_side() {
    let x = Name::original("x");

    let h = parajit_ir::Function {
        name: "h".into(),
        formal_args: Formal::positional_only(vec![]),
        body: vec![
            Stmt::Assign(
                LValue::Var(x.clone()),
                Expr::typed(ExprKind::PrimCall(Prim::Add, vec![Expr::const_(Literal::I32(1)), Expr::const_(Literal::I32(1))]), Type::i32()),
            ),
            Stmt::If {
                cond: Expr::typed(
                    ExprKind::PrimCall(Prim::Eq, vec![Expr::typed(ExprKind::Var(x), Type::i32()), Expr::const_(Literal::I32(2))]),
                    Type::bool(),
                ),
                true_block: vec![Stmt::Return(Expr::typed(
                    ExprKind::PrimCall(Prim::Add, vec![Expr::const_(Literal::I32(0)), Expr::const_(Literal::I32(0))]),
                    Type::i32(),
                ))],
                false_block: vec![Stmt::Return(Expr::typed(
                    ExprKind::PrimCall(
                        Prim::Add,
                        vec![Expr::typed(ExprKind::PrimCall(Prim::Mul, vec![Expr::const_(Literal::I32(1)), Expr::const_(Literal::I32(1))]), Type::i32()), Expr::const_(Literal::I32(0))],
                    ),
                    Type::i32(),
                ))],
                merge: Merge::new(),
            },
        ],
        arg_types: Some(vec![]),
        return_type: Some(Type::i32()),
        arg_names: vec![],
    };

    let names = NameSupply::new();
    let typed_functions = TypedFunctionCache::new();
    let pipeline = Pipeline::new(&names, &typed_functions);
    let optimized = pipeline.optimize(Arc::new(h), &PipelineConfig::default()).unwrap();

    assert_eq!(optimized.body.len(), 1);
    assert_eq!(call_optimized(&optimized, vec![]), Value::I32(0));
}

#[test]
fn always_false_branch_reduces_to_the_taken_side() {
    let x = Name::original("x");

    let f = parajit_ir::Function {
        name: "f".into(),
        formal_args: Formal::positional_only(vec![]),
        body: vec![
            Stmt::Assign(
                LValue::Var(x.clone()),
                Expr::typed(ExprKind::PrimCall(Prim::Add, vec![Expr::const_(Literal::I32(1)), Expr::const_(Literal::I32(2))]), Type::i32()),
            ),
            Stmt::If {
                cond: Expr::typed(
                    ExprKind::PrimCall(Prim::Eq, vec![Expr::typed(ExprKind::Var(x), Type::i32()), Expr::const_(Literal::I32(2))]),
                    Type::bool(),
                ),
                true_block: vec![Stmt::Return(Expr::const_(Literal::I32(0)))],
                false_block: vec![Stmt::Return(Expr::const_(Literal::I32(1)))],
                merge: Merge::new(),
            },
        ],
        arg_types: Some(vec![]),
        return_type: Some(Type::i32()),
        arg_names: vec![],
    };

    let names = NameSupply::new();
    let typed_functions = TypedFunctionCache::new();
    let pipeline = Pipeline::new(&names, &typed_functions);
    let optimized = pipeline.optimize(Arc::new(f), &PipelineConfig::default()).unwrap();

    assert_eq!(optimized.body.len(), 1);
    assert_eq!(call_optimized(&optimized, vec![]), Value::I32(1));
}

/// A loop that rebuilds a rank-1 array on its back edge, starting from a
/// textually identical `Array([0])` default on entry. `immutable`
/// (simplify.rs) must exclude array-typed expressions from CSE
/// admission -- if it didn't, the optimizer could risk treating the
/// loop-entry default and the in-body reassignment as interchangeable,
/// and re-running the optimized function would no longer produce a
/// fresh `[1]` on every call.
#[test]
fn volatile_array_through_loop_is_not_hoisted_by_cse() {
    let i = Name::original("i");
    let out = Name::original("out");
    let arr_ty = Type::array(Type::i32(), 1);

    let mut while_merge = Merge::new();
    while_merge.insert(
        i.clone(),
        (
            Expr::const_(Literal::I32(0)),
            Expr::typed(
                ExprKind::PrimCall(Prim::Add, vec![Expr::typed(ExprKind::Var(i.clone()), Type::i32()), Expr::const_(Literal::I32(1))]),
                Type::i32(),
            ),
        ),
    );
    while_merge.insert(
        out.clone(),
        (
            Expr::typed(ExprKind::Array(vec![Expr::const_(Literal::I32(0))]), arr_ty.clone()),
            Expr::typed(ExprKind::Var(out.clone()), arr_ty.clone()),
        ),
    );

    let f = parajit_ir::Function {
        name: "vol".into(),
        formal_args: Formal::positional_only(vec![]),
        body: vec![
            Stmt::While {
                cond: Expr::typed(
                    ExprKind::PrimCall(Prim::Lt, vec![Expr::typed(ExprKind::Var(i), Type::i32()), Expr::const_(Literal::I32(1))]),
                    Type::bool(),
                ),
                body: vec![Stmt::Assign(
                    LValue::Var(out.clone()),
                    Expr::typed(ExprKind::Array(vec![Expr::const_(Literal::I32(1))]), arr_ty.clone()),
                )],
                merge: while_merge,
            },
            Stmt::Return(Expr::typed(ExprKind::Var(out), arr_ty)),
        ],
        arg_types: Some(vec![]),
        return_type: Some(Type::array(Type::i32(), 1)),
        arg_names: vec![],
    };

    let names = NameSupply::new();
    let typed_functions = TypedFunctionCache::new();
    let pipeline = Pipeline::new(&names, &typed_functions);
    let optimized = pipeline.optimize(Arc::new(f), &PipelineConfig::default()).unwrap();

    for _ in 0..2 {
        let result = call_optimized(&optimized, vec![]);
        match result {
            Value::Array(a) => assert_eq!(a.data, vec![Value::I32(1)]),
            other => panic!("expected an array result, got {other:?}"),
        }
    }
}
