//! Formal and actual argument bundles with keyword defaults.
//!
//! Modeled as a pair of plain structures: binding a
//! call site's [`Actual`] bundle against a function's [`Formal`]
//! descriptor is a pure function producing an ordered value vector, with
//! diagnostics on missing/extra keyword names.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expr::Expr;

/// A function's formal-argument descriptor: ordered positional names, an
/// optional variadic tail, and keyword defaults. Invariant: every name
/// (positional, variadic, keyword) is unique within the descriptor --
/// enforced by [`Formal::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formal {
    pub positional: Vec<String>,
    pub variadic: Option<String>,
    pub keyword_defaults: IndexMap<String, Expr>,
}

impl Formal {
    pub fn new(
        positional: Vec<String>,
        variadic: Option<String>,
        keyword_defaults: IndexMap<String, Expr>,
    ) -> Result<Formal> {
        let mut seen = std::collections::HashSet::new();
        for name in positional
            .iter()
            .chain(variadic.iter())
            .chain(keyword_defaults.keys())
        {
            if !seen.insert(name.clone()) {
                return Err(Error::AssertionFailure(format!(
                    "duplicate formal argument name '{}'",
                    name
                )));
            }
        }
        Ok(Formal {
            positional,
            variadic,
            keyword_defaults,
        })
    }

    pub fn positional_only(names: Vec<String>) -> Formal {
        Formal {
            positional: names,
            variadic: None,
            keyword_defaults: IndexMap::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.positional.len()
    }
}

/// An actual argument bundle at a call site: ordered positional values
/// plus a keyword map. Generic over `T` so the same shape binds both
/// value-level actuals (`Actual<Expr>`, at the call site) and type-level
/// actuals (`Actual<Type>`, the specializer's argument-type tuple derived
/// via [`Actual::transform`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actual<T> {
    pub positional: Vec<T>,
    pub keyword: IndexMap<String, T>,
}

impl<T> Actual<T> {
    pub fn positional_only(values: Vec<T>) -> Actual<T> {
        Actual {
            positional: values,
            keyword: IndexMap::new(),
        }
    }

    /// Map `f` over every value in the bundle, producing a new bundle of
    /// the same shape. Used to derive an argument-type bundle from a
    /// value bundle (`bundle.transform(|v| v.ty())`).
    pub fn transform<U>(&self, mut f: impl FnMut(&T) -> U) -> Actual<U> {
        Actual {
            positional: self.positional.iter().map(&mut f).collect(),
            keyword: self
                .keyword
                .iter()
                .map(|(k, v)| (k.clone(), f(v)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keyword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bind an actual-argument bundle against a formal descriptor, producing
/// the ordered vector of values each formal parameter resolves to:
/// positional args fill positional formals left to right, the variadic
/// tail (if present) receives any positional overflow, and keyword
/// formals resolve from the actual's keyword map or the formal's default
/// expression (left un-evaluated; the caller's type/value walk evaluates
/// it). Errors on missing required args or unknown keyword names -- both
/// are name-resolution failures.
pub fn bind<T: Clone>(
    formal: &Formal,
    actual: &Actual<T>,
    eval_default: impl Fn(&Expr) -> Result<T>,
) -> Result<Vec<T>> {
    let mut bound = Vec::with_capacity(formal.positional.len());
    let mut positional = actual.positional.iter();

    for name in &formal.positional {
        match positional.next() {
            Some(v) => bound.push(v.clone()),
            None => match formal.keyword_defaults.get(name) {
                Some(default_expr) => bound.push(eval_default(default_expr)?),
                None => {
                    return Err(Error::AssertionFailure(format!(
                        "missing required argument '{}'",
                        name
                    )))
                }
            },
        }
    }

    if formal.variadic.is_none() && positional.next().is_some() {
        return Err(Error::AssertionFailure(
            "too many positional arguments".into(),
        ));
    }

    for (name, default_expr) in &formal.keyword_defaults {
        if formal.positional.contains(name) {
            continue;
        }
        match actual.keyword.get(name) {
            Some(v) => bound.push(v.clone()),
            None => bound.push(eval_default(default_expr)?),
        }
    }

    for name in actual.keyword.keys() {
        let known = formal.keyword_defaults.contains_key(name);
        if !known {
            return Err(Error::AssertionFailure(format!(
                "unexpected keyword argument '{}'",
                name
            )));
        }
    }

    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn formal_rejects_duplicate_names() {
        let r = Formal::new(vec!["x".into(), "x".into()], None, IndexMap::new());
        assert!(r.is_err());
    }

    #[test]
    fn transform_maps_positional_and_keyword() {
        let mut kw = IndexMap::new();
        kw.insert("k".to_string(), 3i32);
        let actual = Actual {
            positional: vec![1, 2],
            keyword: kw,
        };
        let typed = actual.transform(|v| *v * 10);
        assert_eq!(typed.positional, vec![10, 20]);
        assert_eq!(typed.keyword["k"], 30);
    }

    #[test]
    fn bind_fills_positional_then_keyword_defaults() {
        let mut defaults = IndexMap::new();
        defaults.insert("y".to_string(), Expr::const_(crate::literal::Literal::I32(9)));
        let formal = Formal::new(vec!["x".into()], None, defaults).unwrap();
        let actual = Actual::<Type>::positional_only(vec![Type::i32()]);
        let bound = bind(&formal, &actual, |_| Ok(Type::i32())).unwrap();
        assert_eq!(bound, vec![Type::i32(), Type::i32()]);
    }

    #[test]
    fn bind_errors_on_missing_required_argument() {
        let formal = Formal::positional_only(vec!["x".into(), "y".into()]);
        let actual = Actual::<Type>::positional_only(vec![Type::i32()]);
        assert!(bind(&formal, &actual, |_| Ok(Type::i32())).is_err());
    }

    #[test]
    fn bind_errors_on_unknown_keyword() {
        let formal = Formal::positional_only(vec!["x".into()]);
        let mut kw = IndexMap::new();
        kw.insert("bogus".to_string(), Type::i32());
        let actual = Actual {
            positional: vec![Type::i32()],
            keyword: kw,
        };
        assert!(bind(&formal, &actual, |_| Ok(Type::i32())).is_err());
    }
}
