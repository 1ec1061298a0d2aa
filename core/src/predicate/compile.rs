//! Predicate compilation: static analysis of a filter against a catalog.
//!
//! Only the top-level conjunction is analyzed. Disjunctions and negations
//! are never pushed down — pruning for them would be unsound without full
//! DNF normalization, which this engine does not attempt — so they fold
//! into the residual untouched.

use tracing::debug;

use crate::catalog::{Direction, IndexCatalog, IndexDescriptor, IndexShape};
use crate::error::StoreResult;
use crate::predicate::constraint::{BucketConstraint, CompiledQuery};
use crate::predicate::{CompareOp, Predicate};
use crate::value::FieldValue;

/// Translate a predicate into per-level pruning constraints plus the
/// residual check.
///
/// The derived constraints are a sound over-approximation: a conjunct the
/// analysis cannot use simply contributes nothing. The residual is always
/// the full original predicate, so an over-permissive constraint costs
/// scan time, never correctness.
pub fn compile<R>(
    predicate: &Predicate<R>,
    catalog: &IndexCatalog<R>,
) -> StoreResult<CompiledQuery<R>> {
    predicate.validate()?;

    let mut constraints = vec![BucketConstraint::Unconstrained; catalog.depth()];

    for conjunct in predicate.conjuncts() {
        match conjunct {
            Predicate::Compare { field, op, value } => {
                for descriptor in catalog.descriptors_for_field(field.name()) {
                    if let Some(derived) = constraint_for_compare(descriptor, *op, value) {
                        intersect_level(&mut constraints, descriptor.level(), derived);
                    }
                }
            }
            Predicate::In { field, values } => {
                for descriptor in catalog.descriptors_for_field(field.name()) {
                    if let Some(derived) = constraint_for_in(descriptor, values) {
                        intersect_level(&mut constraints, descriptor.level(), derived);
                    }
                }
            }
            // An unsatisfiable conjunct makes the whole conjunction
            // unsatisfiable; admit no bucket anywhere.
            Predicate::Const(false) => {
                for constraint in &mut constraints {
                    *constraint = BucketConstraint::Empty;
                }
            }
            // Disjunctions, negations, Const(true): residual only.
            _ => {}
        }
    }

    let query = CompiledQuery::new(constraints, predicate.clone());
    debug!(compiled = %query, "compiled predicate");

    Ok(query)
}

fn intersect_level(constraints: &mut [BucketConstraint], level: usize, derived: BucketConstraint) {
    let current = std::mem::replace(&mut constraints[level], BucketConstraint::Unconstrained);
    constraints[level] = current.intersect(derived);
}

/// Constraint contributed by one comparison conjunct, if the descriptor's
/// shape admits the operator. `None` means no contribution.
fn constraint_for_compare<R>(
    descriptor: &IndexDescriptor<R>,
    op: CompareOp,
    value: &FieldValue,
) -> Option<BucketConstraint> {
    // A constant the bucketing rule cannot place contributes nothing;
    // the conjunct still holds in the residual.
    let key = descriptor.bucket_of(value)?;

    match descriptor.shape() {
        // Equality survives any bucketing rule: a record equal to the
        // constant must land in the constant's bucket.
        IndexShape::Opaque => match op {
            CompareOp::Eq => Some(BucketConstraint::keys([key])),
            _ => None,
        },
        IndexShape::Monotonic(direction) => match op {
            CompareOp::Eq => Some(BucketConstraint::singleton(key)),
            // The constant's own bucket may mix matching and non-matching
            // records, so the bound side always stays inclusive of it.
            CompareOp::Gt | CompareOp::Ge => Some(match direction {
                Direction::Ascending => BucketConstraint::range(Some(key), None),
                Direction::Descending => BucketConstraint::range(None, Some(key)),
            }),
            CompareOp::Lt | CompareOp::Le => Some(match direction {
                Direction::Ascending => BucketConstraint::range(None, Some(key)),
                Direction::Descending => BucketConstraint::range(Some(key), None),
            }),
            // Excluding the constant's bucket would drop records that
            // share the bucket without sharing the value.
            CompareOp::Ne => None,
        },
    }
}

/// Constraint contributed by an IN conjunct: the union of the listed
/// constants' buckets, for either shape. Every listed constant must be
/// bucketable, otherwise the admitted set would silently under-cover.
fn constraint_for_in<R>(
    descriptor: &IndexDescriptor<R>,
    values: &[FieldValue],
) -> Option<BucketConstraint> {
    let keys = values
        .iter()
        .map(|value| descriptor.bucket_of(value))
        .collect::<Option<Vec<_>>>()?;

    Some(BucketConstraint::keys(keys))
}
