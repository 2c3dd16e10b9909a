//! `RuntimeDispatch`: the concurrency contract between a
//! compiled work function and the thread pool that runs it. The
//! reference implementation, `ThreadPoolDispatch`, matches the contract
//! exactly with `std::thread::scope`: disjoint `[start, stop)` ranges
//! covering `[0, N)`, no partial-write visibility between workers
//! (each worker owns its own args-struct value, not a shared one), blocks
//! until every worker completes, and never cancels a worker early.

use crate::backend::CompiledArtifact;
use crate::error::{Error, Result};
use crate::eval::Interpreter;
use crate::value::Value;

/// Given a compiled work function, one args-struct value per worker, the
/// total iteration count `N`, and the tile-size vector the work function
/// expects as its fourth formal, run the work function once per worker
/// over disjoint `[start, stop)` ranges covering `[0, N)` and return each
/// worker's resulting args-struct value (with its `output` field filled).
pub trait RuntimeDispatch {
    fn dispatch(
        &self,
        artifact: &CompiledArtifact,
        args_per_worker: Vec<Value>,
        num_iters: usize,
        tile_sizes: Value,
    ) -> Result<Vec<Value>>;
}

/// The reference dispatcher. Spawns one scoped OS thread per entry in
/// `args_per_worker`; ordering between workers is unspecified, matching
/// the requirement that a `Reduce`'s combine must be associative and a `Scan`'s
/// emit must be order-independent under whatever parallel scheme a real
/// runtime picks (this reference scheme is one worker range per slot,
/// nothing fancier).
#[derive(Debug, Default)]
pub struct ThreadPoolDispatch;

impl ThreadPoolDispatch {
    pub fn new() -> Self {
        ThreadPoolDispatch
    }
}

impl RuntimeDispatch for ThreadPoolDispatch {
    #[tracing::instrument(skip(self, artifact, args_per_worker, tile_sizes), fields(function = %artifact.entry.name, num_iters, workers = args_per_worker.len()))]
    fn dispatch(
        &self,
        artifact: &CompiledArtifact,
        args_per_worker: Vec<Value>,
        num_iters: usize,
        tile_sizes: Value,
    ) -> Result<Vec<Value>> {
        let num_workers = args_per_worker.len();
        if num_workers == 0 {
            return Err(Error::DispatchContract("dispatch requires at least one worker".into()));
        }
        let ranges = partition_ranges(num_iters, num_workers);
        let interp = Interpreter::new(&artifact.functions);
        let entry = &artifact.entry;

        let results: Vec<Result<Value>> = std::thread::scope(|scope| {
            let handles: Vec<_> = ranges
                .into_iter()
                .zip(args_per_worker)
                .map(|((start, stop), worker_args)| {
                    let interp = &interp;
                    let tile_sizes = tile_sizes.clone();
                    scope.spawn(move || {
                        interp.call(
                            entry,
                            vec![
                                Value::I32(start as i32),
                                Value::I32(stop as i32),
                                worker_args,
                                tile_sizes,
                            ],
                        )
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("dispatch worker thread panicked"))
                .collect()
        });

        results.into_iter().collect()
    }
}

/// Split `[0, num_iters)` into `num_workers` disjoint, contiguous ranges
/// as evenly as the remainder allows -- the first `num_iters % num_workers`
/// workers get one extra element. Public so callers that need to
/// reassemble per-worker output slices (e.g. the CLI demo) partition
/// identically to the dispatcher itself.
pub fn partition_ranges(num_iters: usize, num_workers: usize) -> Vec<(usize, usize)> {
    let base = num_iters / num_workers;
    let remainder = num_iters % num_workers;
    let mut ranges = Vec::with_capacity(num_workers);
    let mut start = 0;
    for worker in 0..num_workers {
        let extra = if worker < remainder { 1 } else { 0 };
        let stop = start + base + extra;
        ranges.push((start, stop));
        start = stop;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_cover_range_exactly_once() {
        let ranges = partition_ranges(10, 3);
        assert_eq!(ranges, vec![(0, 4), (4, 7), (7, 10)]);
        let total: usize = ranges.iter().map(|(s, e)| e - s).sum();
        assert_eq!(total, 10);
    }

    #[test]
    fn partitions_handle_more_workers_than_iters() {
        let ranges = partition_ranges(2, 5);
        assert_eq!(ranges, vec![(0, 1), (1, 2), (2, 2), (2, 2), (2, 2)]);
    }

    #[test]
    fn dispatch_rejects_zero_workers() {
        use crate::backend::{BackendLowering, ReferenceBackend};
        use parajit_ir::{Expr, ExprKind, Formal, Name, Stmt, Type};
        use std::sync::Arc;

        let work_fn = Arc::new(parajit_ir::Function {
            name: "work".into(),
            formal_args: Formal::positional_only(vec!["start".into(), "stop".into(), "args".into(), "tiles".into()]),
            body: vec![Stmt::Return(Expr::typed(ExprKind::Var(Name::original("start")), Type::i32()))],
            arg_types: Some(vec![Type::i32(), Type::i32(), Type::i32(), Type::i32()]),
            return_type: Some(Type::i32()),
            arg_names: vec![
                Name::original("start"),
                Name::original("stop"),
                Name::original("args"),
                Name::original("tiles"),
            ],
        });
        let backend = ReferenceBackend::new();
        let artifact = backend.lower(work_fn, &|_| None).unwrap();
        let dispatcher = ThreadPoolDispatch::new();
        let err = dispatcher.dispatch(&artifact, vec![], 10, Value::I32(0));
        assert!(err.is_err());
    }

    #[test]
    fn dispatch_runs_worker_per_range_and_returns_start_values() {
        use crate::backend::{BackendLowering, ReferenceBackend};
        use parajit_ir::{Expr, ExprKind, Formal, Name, Stmt, Type};
        use std::sync::Arc;

        let work_fn = Arc::new(parajit_ir::Function {
            name: "work".into(),
            formal_args: Formal::positional_only(vec!["start".into(), "stop".into(), "args".into(), "tiles".into()]),
            body: vec![Stmt::Return(Expr::typed(ExprKind::Var(Name::original("start")), Type::i32()))],
            arg_types: Some(vec![Type::i32(), Type::i32(), Type::i32(), Type::i32()]),
            return_type: Some(Type::i32()),
            arg_names: vec![
                Name::original("start"),
                Name::original("stop"),
                Name::original("args"),
                Name::original("tiles"),
            ],
        });
        let backend = ReferenceBackend::new();
        let artifact = backend.lower(work_fn, &|_| None).unwrap();
        let dispatcher = ThreadPoolDispatch::new();
        let results = dispatcher
            .dispatch(&artifact, vec![Value::I32(0), Value::I32(0)], 10, Value::I32(0))
            .unwrap();
        assert_eq!(results, vec![Value::I32(0), Value::I32(5)]);
    }
}
