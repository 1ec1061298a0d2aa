//! Traversal, pruning, and fold internals.

use std::ops::Bound;
use std::time::Instant;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::executor::ExecMode;
use crate::predicate::{BucketConstraint, CompiledQuery, Predicate};
use crate::report::ReportMonoid;
use crate::tree::{PartitionNode, PartitionTree, RecordId, RecordStore};

/// Records scanned between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 1024;

pub(super) fn run_query<R, T, M>(
    tree: &PartitionTree<R>,
    query: &CompiledQuery<R>,
    map: &M,
    mode: ExecMode,
    parallel_threshold: usize,
    cancel: Option<&CancellationToken>,
) -> StoreResult<T>
where
    R: Send + Sync,
    T: ReportMonoid,
    M: Fn(&R) -> StoreResult<T> + Send + Sync,
{
    let started = Instant::now();

    let (leaves, pruned_subtrees) = prune(tree.root(), query.constraints());
    let parallel = match mode {
        ExecMode::Sequential => false,
        ExecMode::Parallel => true,
        ExecMode::Auto => leaves.len() >= parallel_threshold,
    };

    debug!(
        leaves = leaves.len(),
        pruned_subtrees,
        parallel,
        full_scan = query.is_full_scan(),
        "scanning pruned partition tree"
    );

    let store = tree.store();
    let residual = query.residual();

    let result = if parallel {
        // One task per surviving leaf; each folds its own partial, the
        // partials merge afterwards in whatever order they landed.
        let partials: Vec<StoreResult<T>> = leaves
            .par_iter()
            .map(|ids| scan_leaf(store, ids, residual, map, cancel))
            .collect();

        let mut acc = T::identity();
        for partial in partials {
            acc = acc.combine(partial?);
        }
        acc
    } else {
        let mut acc = T::identity();
        for ids in &leaves {
            acc = acc.combine(scan_leaf(store, ids, residual, map, cancel)?);
        }
        acc
    };

    debug!(
        elapsed_us = started.elapsed().as_micros() as u64,
        "query complete"
    );

    Ok(result)
}

/// Collect the id slices of every leaf surviving the per-level
/// constraints, counting the subtrees skipped on the way down.
fn prune<'t>(
    root: &'t PartitionNode,
    constraints: &[BucketConstraint],
) -> (Vec<&'t [RecordId]>, usize) {
    let mut leaves = Vec::new();
    let mut pruned = 0;
    collect(root, constraints, &mut leaves, &mut pruned);
    (leaves, pruned)
}

fn collect<'t>(
    node: &'t PartitionNode,
    constraints: &[BucketConstraint],
    out: &mut Vec<&'t [RecordId]>,
    pruned: &mut usize,
) {
    match node {
        PartitionNode::Leaf { ids } => out.push(ids.as_slice()),
        PartitionNode::Internal { level, children } => match constraints.get(*level) {
            None | Some(BucketConstraint::Unconstrained) => {
                for child in children.values() {
                    collect(child, constraints, out, pruned);
                }
            }
            Some(BucketConstraint::Empty) => *pruned += children.len(),
            Some(BucketConstraint::Range { lo, hi }) => {
                let lower = lo.map_or(Bound::Unbounded, Bound::Included);
                let upper = hi.map_or(Bound::Unbounded, Bound::Included);
                let mut visited = 0;
                for (_, child) in children.range((lower, upper)) {
                    visited += 1;
                    collect(child, constraints, out, pruned);
                }
                *pruned += children.len() - visited;
            }
            Some(BucketConstraint::In(keys)) => {
                let mut visited = 0;
                for key in keys {
                    if let Some(child) = children.get(key) {
                        visited += 1;
                        collect(child, constraints, out, pruned);
                    }
                }
                *pruned += children.len() - visited;
            }
        },
    }
}

/// Scan one leaf: residual check, map, fold. Cancellation is observed at
/// chunk boundaries; a cancelled scan discards its partial.
fn scan_leaf<R, T, M>(
    store: &RecordStore<R>,
    ids: &[RecordId],
    residual: &Predicate<R>,
    map: &M,
    cancel: Option<&CancellationToken>,
) -> StoreResult<T>
where
    T: ReportMonoid,
    M: Fn(&R) -> StoreResult<T>,
{
    let mut acc = T::identity();

    for chunk in ids.chunks(CANCEL_CHECK_INTERVAL) {
        if let Some(token) = cancel
            && token.is_cancelled()
        {
            return Err(StoreError::Cancelled);
        }

        for &id in chunk {
            let record = store.record(id);
            if residual.matches(record)? {
                acc = acc.combine(map(record)?);
            }
        }
    }

    Ok(acc)
}
