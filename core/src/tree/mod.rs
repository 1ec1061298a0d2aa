//! The hierarchical partition structure and the record store it owns.

mod builder;
mod node;

pub use node::PartitionNode;

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::IndexCatalog;
use crate::error::{StoreError, StoreResult};
use crate::executor::QueryExecutor;
use crate::predicate::Predicate;
use crate::report::ReportMonoid;

/// Positional record identity, stable for the lifetime of one tree.
pub type RecordId = u32;

/// An immutable, indexable sequence of records.
///
/// The partition tree built over a store is its sole owner; once the
/// build completes, nothing mutates it.
pub struct RecordStore<R> {
    records: Vec<R>,
}

impl<R> RecordStore<R> {
    pub fn new(records: Vec<R>) -> StoreResult<Self> {
        if records.len() > RecordId::MAX as usize {
            return Err(StoreError::CapacityExceeded(records.len()));
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fetch by id. Ids handed out by the engine are always in range.
    pub fn record(&self, id: RecordId) -> &R {
        &self.records[id as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.iter()
    }
}

impl<R> fmt::Debug for RecordStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("len", &self.records.len())
            .finish()
    }
}

/// Structural summary of a built tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    pub records: usize,
    pub depth: usize,
    pub internal_nodes: usize,
    pub leaves: usize,
    pub largest_leaf: usize,
    pub smallest_leaf: usize,
}

/// The hierarchical partition structure: record store, catalog, and the
/// bucket-keyed node hierarchy built once over them.
///
/// A tree is immutable after construction. A changed dataset means a new
/// build; concurrent queries share the tree by reference without
/// coordination.
pub struct PartitionTree<R> {
    store: RecordStore<R>,
    catalog: IndexCatalog<R>,
    root: PartitionNode,
}

impl<R> PartitionTree<R> {
    /// Build the partition hierarchy for `records` under `catalog`.
    pub fn build(records: Vec<R>, catalog: IndexCatalog<R>) -> StoreResult<Self> {
        let started = Instant::now();
        let store = RecordStore::new(records)?;
        let root = builder::build_root(&store, &catalog)?;

        info!(
            records = store.len(),
            depth = catalog.depth(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "partition tree built"
        );

        Ok(Self {
            store,
            catalog,
            root,
        })
    }

    /// Number of records in the underlying store.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Number of index levels the tree was built with.
    pub fn depth(&self) -> usize {
        self.catalog.depth()
    }

    pub fn store(&self) -> &RecordStore<R> {
        &self.store
    }

    pub fn catalog(&self) -> &IndexCatalog<R> {
        &self.catalog
    }

    pub fn record(&self, id: RecordId) -> &R {
        self.store.record(id)
    }

    pub(crate) fn root(&self) -> &PartitionNode {
        &self.root
    }

    pub fn stats(&self) -> TreeStats {
        let (internal_nodes, leaves) = self.root.count_nodes();
        let mut largest_leaf = 0;
        let mut smallest_leaf = usize::MAX;
        self.root.for_each_leaf(&mut |ids| {
            largest_leaf = largest_leaf.max(ids.len());
            smallest_leaf = smallest_leaf.min(ids.len());
        });

        TreeStats {
            records: self.store.len(),
            depth: self.catalog.depth(),
            internal_nodes,
            leaves,
            largest_leaf,
            smallest_leaf: if leaves == 0 { 0 } else { smallest_leaf },
        }
    }

    /// Compile `predicate` against this tree's catalog and run it with a
    /// default executor. Convenience over [`QueryExecutor::report`].
    pub fn report<T, M>(&self, predicate: &Predicate<R>, map: M) -> StoreResult<T>
    where
        R: Send + Sync,
        T: ReportMonoid,
        M: Fn(&R) -> T + Send + Sync,
    {
        QueryExecutor::new().report(self, predicate, map)
    }
}

impl<R> fmt::Debug for PartitionTree<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionTree")
            .field("records", &self.store.len())
            .field("depth", &self.catalog.depth())
            .finish()
    }
}
