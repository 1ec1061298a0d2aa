//! Tree construction: level-by-level partitioning of record ids.

use std::collections::BTreeMap;

use crate::catalog::{BucketKey, IndexCatalog};
use crate::error::{StoreError, StoreResult};
use crate::tree::node::PartitionNode;
use crate::tree::{RecordId, RecordStore};

/// Partition the whole store under the catalog, returning the root node.
///
/// Construction is all-or-nothing: the first record the level's bucketing
/// rule cannot place aborts the build with that record's id, and no
/// partial tree ever escapes.
pub(crate) fn build_root<R>(
    store: &RecordStore<R>,
    catalog: &IndexCatalog<R>,
) -> StoreResult<PartitionNode> {
    let ids: Vec<RecordId> = (0..store.len() as RecordId).collect();
    split(store, catalog, ids, 0)
}

fn split<R>(
    store: &RecordStore<R>,
    catalog: &IndexCatalog<R>,
    ids: Vec<RecordId>,
    level: usize,
) -> StoreResult<PartitionNode> {
    let Some(descriptor) = catalog.descriptor(level) else {
        // Past the last index level; the group becomes a leaf. With an
        // empty catalog this is the root itself, holding every id.
        return Ok(PartitionNode::Leaf { ids });
    };

    let mut groups: BTreeMap<BucketKey, Vec<RecordId>> = BTreeMap::new();
    for id in ids {
        let record = store.record(id);
        let key = descriptor.extract(record).ok_or_else(|| StoreError::Build {
            record: id,
            reason: format!(
                "level {} index on `{}` produced no bucket for value {}",
                level,
                descriptor.field(),
                descriptor.source_value(record)
            ),
        })?;
        groups.entry(key).or_default().push(id);
    }

    let mut children = BTreeMap::new();
    for (key, group) in groups {
        children.insert(key, split(store, catalog, group, level + 1)?);
    }

    Ok(PartitionNode::Internal { level, children })
}
