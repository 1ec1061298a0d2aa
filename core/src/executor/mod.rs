//! Query execution: pruned traversal and monoid fold over the partition
//! tree.
//!
//! All query state lives in the call; the tree and its record store are
//! shared read-only, so any number of queries may run against one tree
//! concurrently without coordination.

mod engine;

use tokio_util::sync::CancellationToken;

use crate::error::StoreResult;
use crate::predicate::{CompiledQuery, Predicate, compile};
use crate::report::ReportMonoid;
use crate::tree::PartitionTree;

/// Surviving-leaf count at which [`ExecMode::Auto`] switches to the
/// parallel path.
const DEFAULT_PARALLEL_THRESHOLD: usize = 4;

/// How leaf scans are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Parallel when enough leaves survive pruning, sequential otherwise.
    #[default]
    Auto,
    Sequential,
    Parallel,
}

/// Executes compiled queries against a partition tree.
///
/// The executor holds only scheduling configuration; it is cheap to
/// construct per query and reusable across queries and trees.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    mode: ExecMode,
    parallel_threshold: usize,
    cancel: Option<CancellationToken>,
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryExecutor {
    pub fn new() -> Self {
        Self {
            mode: ExecMode::Auto,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            cancel: None,
        }
    }

    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    /// Surviving-leaf count at which [`ExecMode::Auto`] goes parallel.
    pub fn with_parallel_threshold(mut self, leaves: usize) -> Self {
        self.parallel_threshold = leaves;
        self
    }

    /// Attach a cancellation token. A cancelled query stops scanning at
    /// the next record-chunk boundary, discards all partial results, and
    /// returns [`StoreError::Cancelled`](crate::error::StoreError).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Run a compiled query: prune, apply the residual to surviving
    /// records, map each match, and fold with the report monoid.
    ///
    /// An empty matching set yields `T::identity()`. Evaluation errors
    /// abort the whole query; no partial report is ever returned.
    pub fn run<R, T, M>(
        &self,
        tree: &PartitionTree<R>,
        query: &CompiledQuery<R>,
        map: M,
    ) -> StoreResult<T>
    where
        R: Send + Sync,
        T: ReportMonoid,
        M: Fn(&R) -> T + Send + Sync,
    {
        self.try_run(tree, query, move |record| Ok(map(record)))
    }

    /// [`run`](Self::run) with a fallible map; the first mapping error
    /// aborts the query.
    pub fn try_run<R, T, M>(
        &self,
        tree: &PartitionTree<R>,
        query: &CompiledQuery<R>,
        map: M,
    ) -> StoreResult<T>
    where
        R: Send + Sync,
        T: ReportMonoid,
        M: Fn(&R) -> StoreResult<T> + Send + Sync,
    {
        engine::run_query(
            tree,
            query,
            &map,
            self.mode,
            self.parallel_threshold,
            self.cancel.as_ref(),
        )
    }

    /// Compile `predicate` against the tree's own catalog, then run it.
    pub fn report<R, T, M>(
        &self,
        tree: &PartitionTree<R>,
        predicate: &Predicate<R>,
        map: M,
    ) -> StoreResult<T>
    where
        R: Send + Sync,
        T: ReportMonoid,
        M: Fn(&R) -> T + Send + Sync,
    {
        let query = compile(predicate, tree.catalog())?;
        self.run(tree, &query, map)
    }
}
