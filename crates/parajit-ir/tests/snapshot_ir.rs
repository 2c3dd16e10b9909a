//! Snapshot tests for the on-disk shape of typed IR. `Function`/`Expr`/
//! `Stmt` derive `Serialize` for exactly this purpose (diagnostics and
//! these snapshots) -- a representative typed
//! specialization here, pinned with an inline snapshot so a change in
//! the IR's shape shows up as a diff in the test source itself rather
//! than a silently stale `.snap` file.

use parajit_ir::{Expr, ExprKind, Formal, Function, Name, Stmt, Type};

fn typed_identity() -> Function {
    let x = Name::original("x");
    Function {
        name: "id".into(),
        formal_args: Formal::positional_only(vec!["x".into()]),
        body: vec![Stmt::Return(Expr::typed(ExprKind::Var(x), Type::i32()))],
        arg_types: Some(vec![Type::i32()]),
        return_type: Some(Type::i32()),
        arg_names: vec![Name::original("x")],
    }
}

#[test]
fn typed_identity_function_snapshot() {
    insta::assert_json_snapshot!(typed_identity(), @r###"
    {
      "name": "id",
      "formal_args": {
        "positional": [
          "x"
        ],
        "variadic": null,
        "keyword_defaults": {}
      },
      "body": [
        {
          "Return": {
            "kind": {
              "Var": {
                "base": "x",
                "version": 0
              }
            },
            "ty": {
              "Ground": "I32"
            }
          }
        }
      ],
      "arg_types": [
        {
          "Ground": "I32"
        }
      ],
      "return_type": {
        "Ground": "I32"
      },
      "arg_names": [
        {
          "base": "x",
          "version": 0
        }
      ]
    }
    "###);
}
