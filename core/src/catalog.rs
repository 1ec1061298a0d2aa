//! Index catalog: the ordered list of partition levels.
//!
//! Each descriptor names a source field, a bucketing rule, and a shape
//! classification. Level 0 is the outermost partition; levels must be
//! unique and dense from 0. The declaration mechanism that authors
//! descriptors (attributes, a schema compiler, hand-written builders) is
//! external; the engine only consumes a validated catalog.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{StoreError, StoreResult};
use crate::value::FieldValue;

/// Partition key produced by an index's bucketing rule.
pub type BucketKey = i64;

/// Ordering relationship between a source field and its bucket keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexShape {
    /// Bucket keys are a non-decreasing (`Ascending`) or non-increasing
    /// (`Descending`) function of the source field, so range predicates
    /// translate to contiguous bucket ranges.
    ///
    /// Declaring `Monotonic` for a bucketing rule that is not actually
    /// monotonic silently breaks pruning soundness; the engine cannot
    /// detect the mismatch at runtime.
    Monotonic(Direction),
    /// No ordering guarantee (hash-derived keys and the like); only
    /// equality predicates translate.
    Opaque,
}

/// Sign of a monotonic bucketing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

type SourceFn<R> = Arc<dyn Fn(&R) -> FieldValue + Send + Sync>;
type BucketFn = Arc<dyn Fn(&FieldValue) -> Option<BucketKey> + Send + Sync>;

/// One partition level: where the value comes from and how it buckets.
///
/// Extraction is the composition `bucket(source(record))`. The source
/// accessor must be a pure, total function of the record; the bucketing
/// rule returns `None` for values it cannot place, which aborts a build
/// (surfacing the offending record id) but merely skips pushdown when it
/// happens to a query constant.
pub struct IndexDescriptor<R> {
    level: usize,
    field: String,
    source: SourceFn<R>,
    bucket: BucketFn,
    shape: IndexShape,
}

impl<R> IndexDescriptor<R> {
    /// A monotonic index over `field`.
    pub fn monotonic(
        level: usize,
        field: impl Into<String>,
        direction: Direction,
        source: impl Fn(&R) -> FieldValue + Send + Sync + 'static,
        bucket: impl Fn(&FieldValue) -> Option<BucketKey> + Send + Sync + 'static,
    ) -> Self {
        Self {
            level,
            field: field.into(),
            source: Arc::new(source),
            bucket: Arc::new(bucket),
            shape: IndexShape::Monotonic(direction),
        }
    }

    /// An opaque index over `field`.
    pub fn opaque(
        level: usize,
        field: impl Into<String>,
        source: impl Fn(&R) -> FieldValue + Send + Sync + 'static,
        bucket: impl Fn(&FieldValue) -> Option<BucketKey> + Send + Sync + 'static,
    ) -> Self {
        Self {
            level,
            field: field.into(),
            source: Arc::new(source),
            bucket: Arc::new(bucket),
            shape: IndexShape::Opaque,
        }
    }

    /// Fixed-width bucketing over an integer field: `floor(value / width)`.
    /// Ascending monotonic by construction.
    pub fn fixed_width(
        level: usize,
        field: impl Into<String>,
        width: i64,
        source: impl Fn(&R) -> FieldValue + Send + Sync + 'static,
    ) -> StoreResult<Self> {
        if width <= 0 {
            return Err(StoreError::Catalog(format!(
                "fixed-width bucketing requires a positive width, got {}",
                width
            )));
        }

        Ok(Self::monotonic(
            level,
            field,
            Direction::Ascending,
            source,
            move |value| match value {
                FieldValue::Int(v) => Some(v.div_euclid(width)),
                _ => None,
            },
        ))
    }

    /// Hashed bucketing: xxh3 of the value, modulo `buckets`. Opaque by
    /// construction.
    pub fn hashed(
        level: usize,
        field: impl Into<String>,
        buckets: u64,
        source: impl Fn(&R) -> FieldValue + Send + Sync + 'static,
    ) -> StoreResult<Self> {
        if buckets == 0 {
            return Err(StoreError::Catalog(
                "hashed bucketing requires at least one bucket".to_string(),
            ));
        }

        Ok(Self::opaque(level, field, source, move |value| {
            let hash = match value {
                FieldValue::Null => return None,
                FieldValue::Bool(b) => xxh3_64(&[u8::from(*b)]),
                FieldValue::Int(i) => xxh3_64(&i.to_le_bytes()),
                FieldValue::Float(x) => xxh3_64(&x.to_bits().to_le_bytes()),
                FieldValue::Str(s) => xxh3_64(s.as_bytes()),
            };
            Some((hash % buckets) as BucketKey)
        }))
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Name of the source field this index is derived from. Pushdown
    /// matches predicate conjuncts against this name.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn shape(&self) -> IndexShape {
        self.shape
    }

    /// Read the source field out of a record.
    pub fn source_value(&self, record: &R) -> FieldValue {
        (self.source)(record)
    }

    /// Apply the bucketing rule to an already-extracted value.
    pub fn bucket_of(&self, value: &FieldValue) -> Option<BucketKey> {
        (self.bucket)(value)
    }

    /// Full extraction: `bucket(source(record))`.
    pub fn extract(&self, record: &R) -> Option<BucketKey> {
        self.bucket_of(&self.source_value(record))
    }
}

impl<R> Clone for IndexDescriptor<R> {
    fn clone(&self) -> Self {
        Self {
            level: self.level,
            field: self.field.clone(),
            source: Arc::clone(&self.source),
            bucket: Arc::clone(&self.bucket),
            shape: self.shape,
        }
    }
}

impl<R> fmt::Debug for IndexDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDescriptor")
            .field("level", &self.level)
            .field("field", &self.field)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Validated, level-ordered list of index descriptors.
pub struct IndexCatalog<R> {
    levels: Vec<IndexDescriptor<R>>,
}

impl<R> IndexCatalog<R> {
    /// Build a catalog, validating that descriptor levels are unique and
    /// dense starting at 0. Descriptors may arrive in any order.
    pub fn new(mut descriptors: Vec<IndexDescriptor<R>>) -> StoreResult<Self> {
        descriptors.sort_by_key(|d| d.level);

        for (position, descriptor) in descriptors.iter().enumerate() {
            if descriptor.level != position {
                return Err(StoreError::Catalog(format!(
                    "index levels must be unique and dense from 0; \
                     found level {} at position {}",
                    descriptor.level, position
                )));
            }
        }

        Ok(Self {
            levels: descriptors,
        })
    }

    /// A catalog with no index levels. Trees built against it hold one
    /// leaf with every record id, and every query is a full scan.
    pub fn empty() -> Self {
        Self { levels: Vec::new() }
    }

    /// Number of index levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn descriptor(&self, level: usize) -> Option<&IndexDescriptor<R>> {
        self.levels.get(level)
    }

    pub fn descriptors(&self) -> &[IndexDescriptor<R>] {
        &self.levels
    }

    /// All descriptors whose source field carries the given name. A field
    /// may be indexed at several levels.
    pub(crate) fn descriptors_for_field<'a>(
        &'a self,
        field: &'a str,
    ) -> impl Iterator<Item = &'a IndexDescriptor<R>> {
        self.levels.iter().filter(move |d| d.field == field)
    }
}

impl<R> Clone for IndexCatalog<R> {
    fn clone(&self) -> Self {
        Self {
            levels: self.levels.clone(),
        }
    }
}

impl<R> fmt::Debug for IndexCatalog<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexCatalog")
            .field("levels", &self.levels)
            .finish()
    }
}
