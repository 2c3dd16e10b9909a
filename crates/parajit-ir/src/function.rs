//! Function records and the two function registries: untyped functions
//! interned by name, and typed functions cached by `(name, arg_types)`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::args::Formal;
use crate::error::{Error, Result};
use crate::names::Name;
use crate::stmt::Block;
use crate::types::Type;

/// `{ name, formal_args, body, optionally: arg_types, return_type,
/// arg_names }`. The same struct represents both untyped and
/// typed functions -- `arg_types`/`return_type`/`arg_names` are `None`
/// until specialization fills them in, and every expression node's `ty`
/// (see `expr.rs`) is `None` until then too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub formal_args: Formal,
    pub body: Block,
    pub arg_types: Option<Vec<Type>>,
    pub return_type: Option<Type>,
    /// The fresh SSA names bound to each formal parameter, in positional
    /// order. Populated alongside `arg_types` by the specializer.
    pub arg_names: Vec<Name>,
}

impl Function {
    pub fn new_untyped(name: impl Into<String>, formal_args: Formal, body: Block) -> Function {
        Function {
            name: name.into(),
            formal_args,
            body,
            arg_types: None,
            return_type: None,
            arg_names: Vec::new(),
        }
    }

    pub fn is_typed(&self) -> bool {
        self.arg_types.is_some()
    }
}

/// The untyped-function registry: functions interned by name at
/// construction and never mutated thereafter, under an append-only
/// registration policy. Guards its single map with a mutex so
/// concurrent compilations of distinct functions can register without
/// racing.
#[derive(Debug, Default)]
pub struct UntypedFunctionRegistry {
    functions: Mutex<HashMap<String, Arc<Function>>>,
}

impl UntypedFunctionRegistry {
    pub fn new() -> Self {
        UntypedFunctionRegistry::default()
    }

    /// Register a new untyped function. Errors if `name` is already
    /// registered -- registration is append-only; re-registering under
    /// the same name (even with identical IR) is a producer bug.
    pub fn register(&self, function: Function) -> Result<Arc<Function>> {
        let mut functions = self.functions.lock().expect("registry mutex poisoned");
        if functions.contains_key(&function.name) {
            return Err(Error::AssertionFailure(format!(
                "function '{}' already registered",
                function.name
            )));
        }
        let arc = Arc::new(function);
        functions.insert(arc.name.clone(), arc.clone());
        Ok(arc)
    }

    pub fn get(&self, name: &str) -> Result<Arc<Function>> {
        self.functions
            .lock()
            .expect("registry mutex poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NameNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions
            .lock()
            .expect("registry mutex poisoned")
            .contains_key(name)
    }
}

/// The specialization cache: typed functions keyed by `(untyped_name,
/// arg_types)`. Read-mostly; writes occur only on
/// specialization misses.
#[derive(Debug, Default)]
pub struct TypedFunctionCache {
    cache: Mutex<HashMap<(String, Vec<Type>), Arc<Function>>>,
}

impl TypedFunctionCache {
    pub fn new() -> Self {
        TypedFunctionCache::default()
    }

    pub fn get(&self, name: &str, arg_types: &[Type]) -> Option<Arc<Function>> {
        self.cache
            .lock()
            .expect("typed cache mutex poisoned")
            .get(&(name.to_string(), arg_types.to_vec()))
            .cloned()
    }

    /// Insert a freshly specialized function, keyed on its own name and
    /// argument types. The typed function is expected to already carry
    /// `arg_types` equal to the key -- callers specialize first, then
    /// cache the result under the types they specialized against.
    pub fn insert(&self, arg_types: Vec<Type>, function: Function) -> Arc<Function> {
        let arc = Arc::new(function);
        let mut cache = self.cache.lock().expect("typed cache mutex poisoned");
        cache
            .entry((arc.name.clone(), arg_types))
            .or_insert_with(|| arc.clone());
        arc
    }

    pub fn len(&self) -> usize {
        self.cache.lock().expect("typed cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
