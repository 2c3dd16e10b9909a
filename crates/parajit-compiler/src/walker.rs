//! The transform framework: a scoped-environment primitive shared by every
//! pass, a statement emitter for hoisting temporaries into the current
//! block, and the phase-composition helper the pipeline driver uses to run
//! a pass to its own fixpoint.
//!
//! There is deliberately no generic "visitor" trait here -- IR-node
//! dispatch is a plain tagged-variant `match` in each
//! transform, not a dynamic-dispatch visitor. What every pass *does*
//! share is: a scoped symbol/expression environment, a fresh-name supply,
//! and a place to emit newly introduced statements. That's what this
//! module provides.

use std::collections::HashMap;
use std::hash::Hash;

use parajit_ir::{Name, NameSupply, Stmt};

/// A stack of maps with push/pop tied to block entry/exit. Lookup walks
/// top-down (innermost scope first), matching `available_expressions`'s
/// and any symbol environment's scoping contract.
#[derive(Debug)]
pub struct ScopedMap<K, V> {
    scopes: Vec<HashMap<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> Default for ScopedMap<K, V> {
    fn default() -> Self {
        ScopedMap {
            scopes: vec![HashMap::new()],
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> ScopedMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a new nested scope (block entry).
    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Leave the innermost scope (block exit), discarding its bindings.
    pub fn pop(&mut self) {
        self.scopes.pop();
        debug_assert!(!self.scopes.is_empty(), "popped the root scope");
    }

    /// Insert into the innermost scope.
    pub fn insert(&mut self, key: K, value: V) {
        self.scopes
            .last_mut()
            .expect("at least one scope always present")
            .insert(key, value);
    }

    /// Look up `key`, walking from the innermost scope outward.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.scopes.iter().rev().find_map(|scope| scope.get(key))
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Run `f` within a freshly pushed scope, popping it on return
    /// regardless of how `f` returns. This is the shape every per-block
    /// transform uses for `available_expressions`.
    pub fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push();
        let r = f(self);
        self.pop();
        r
    }
}

/// A place for a pass to emit newly introduced statements (hoisted temps,
/// normalized phi branches) into the block currently being built, plus the
/// fresh-name supply every pass shares for minting new SSA names.
pub struct Emitter<'a> {
    pub names: &'a NameSupply,
    out: Vec<Stmt>,
}

impl<'a> Emitter<'a> {
    pub fn new(names: &'a NameSupply) -> Self {
        Emitter {
            names,
            out: Vec::new(),
        }
    }

    pub fn push(&mut self, stmt: Stmt) {
        self.out.push(stmt);
    }

    pub fn fresh(&self, base: impl Into<String>) -> Name {
        self.names.fresh(base)
    }

    /// Drain the statements emitted so far, resetting the buffer. Called
    /// once per source statement as the pass walks the original block,
    /// interleaving hoisted temps with the (possibly rewritten) original
    /// statement.
    pub fn take(&mut self) -> Vec<Stmt> {
        std::mem::take(&mut self.out)
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }
}

/// A single IR→IR transform over a typed function. Implementors run their
/// rewrite once; [`run_to_fixpoint`] is the pipeline-level helper that
/// repeats a pass until it reports no further change: each pass runs
/// until its own transform fixpoint.
pub trait Phase {
    /// Apply this phase once, returning the rewritten function and
    /// whether anything actually changed (structural difference from the
    /// input). Passes that can't cheaply detect no-op application may
    /// conservatively return `true`; `run_to_fixpoint` still terminates
    /// via the iteration cap.
    fn apply(&mut self, f: parajit_ir::Function) -> crate::error::Result<(parajit_ir::Function, bool)>;

    fn name(&self) -> &'static str;
}

/// Run `phase` repeatedly until it reports no change, or `max_iters` is
/// reached (a defensive cap -- every pass in this pipeline is designed to
/// converge in a handful of iterations on realistic programs; hitting the
/// cap indicates a non-terminating rewrite and is logged, not an error).
pub fn run_to_fixpoint(
    phase: &mut dyn Phase,
    mut f: parajit_ir::Function,
    max_iters: usize,
) -> crate::error::Result<parajit_ir::Function> {
    for iter in 0..max_iters {
        let (next, changed) = phase.apply(f)?;
        f = next;
        if !changed {
            tracing::debug!(pass = phase.name(), iterations = iter + 1, "reached fixpoint");
            return Ok(f);
        }
    }
    tracing::warn!(
        pass = phase.name(),
        max_iters,
        "did not reach fixpoint within iteration cap"
    );
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_map_shadows_inner_over_outer() {
        let mut m: ScopedMap<&str, i32> = ScopedMap::new();
        m.insert("x", 1);
        m.scoped(|m| {
            m.insert("x", 2);
            assert_eq!(m.get(&"x"), Some(&2));
        });
        assert_eq!(m.get(&"x"), Some(&1));
    }

    #[test]
    fn scoped_map_pop_discards_inner_bindings() {
        let mut m: ScopedMap<&str, i32> = ScopedMap::new();
        m.scoped(|m| {
            m.insert("y", 5);
        });
        assert_eq!(m.get(&"y"), None);
    }

    #[test]
    fn emitter_take_drains_and_resets() {
        let supply = NameSupply::new();
        let mut e = Emitter::new(&supply);
        assert!(e.is_empty());
        e.push(Stmt::Return(parajit_ir::Expr::var(e.fresh("t"))));
        assert!(!e.is_empty());
        let stmts = e.take();
        assert_eq!(stmts.len(), 1);
        assert!(e.is_empty());
    }
}
