//! Strata — embedded in-memory analytical store.
//!
//! A typed record collection is partitioned once into a hierarchical
//! bucket tree described by an [`IndexCatalog`]; filtered map/reduce
//! queries compile into per-level pruning constraints plus a residual
//! check and run against the tree without scanning what pruning excludes.
//!
//! ```
//! use strata_core::{
//!     Count, FieldRef, FieldValue, IndexCatalog, IndexDescriptor, PartitionTree,
//! };
//!
//! struct Trade {
//!     price: i64,
//! }
//!
//! let catalog = IndexCatalog::new(vec![IndexDescriptor::fixed_width(
//!     0,
//!     "price",
//!     300,
//!     |t: &Trade| FieldValue::Int(t.price),
//! )?])?;
//!
//! let records: Vec<Trade> = [50, 150, 350, 650]
//!     .into_iter()
//!     .map(|price| Trade { price })
//!     .collect();
//! let tree = PartitionTree::build(records, catalog)?;
//!
//! let expensive = FieldRef::new("price", |t: &Trade| FieldValue::Int(t.price)).gt(100);
//! let Count(matching) = tree.report(&expensive, |_| Count(1))?;
//! assert_eq!(matching, 3);
//! # Ok::<(), strata_core::StoreError>(())
//! ```

pub mod catalog;
pub mod error;
pub mod executor;
pub mod predicate;
pub mod report;
pub mod tree;
pub mod value;

pub use catalog::{BucketKey, Direction, IndexCatalog, IndexDescriptor, IndexShape};
pub use error::{StoreError, StoreResult};
pub use executor::{ExecMode, QueryExecutor};
pub use predicate::{BucketConstraint, CompareOp, CompiledQuery, FieldRef, Predicate, compile};
pub use report::{Count, FloatSum, Max, Min, ReportMonoid, Sum};
pub use tree::{PartitionNode, PartitionTree, RecordId, RecordStore, TreeStats};
pub use value::FieldValue;
