//! Per-level pruning constraints and the compiled query that carries them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::BucketKey;
use crate::predicate::Predicate;

/// The set of bucket keys a tree level may descend into.
///
/// Constraints are a sound over-approximation of the predicate: every
/// record satisfying the predicate lies in an admitted bucket, but an
/// admitted bucket may still hold non-matching records — the residual
/// re-check is what guarantees exactness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketConstraint {
    /// No pruning at this level; every child is visited.
    Unconstrained,
    /// Inclusive bucket-key range; a `None` bound is open.
    Range {
        lo: Option<BucketKey>,
        hi: Option<BucketKey>,
    },
    /// Explicit admissible key set.
    In(BTreeSet<BucketKey>),
    /// No bucket can satisfy the predicate; the level prunes everything.
    Empty,
}

impl BucketConstraint {
    /// A normalized range: an inverted range collapses to `Empty`, a
    /// doubly-open one to `Unconstrained`.
    pub fn range(lo: Option<BucketKey>, hi: Option<BucketKey>) -> Self {
        match (lo, hi) {
            (None, None) => BucketConstraint::Unconstrained,
            (Some(lo), Some(hi)) if lo > hi => BucketConstraint::Empty,
            (lo, hi) => BucketConstraint::Range { lo, hi },
        }
    }

    /// The constraint admitting exactly one key.
    pub fn singleton(key: BucketKey) -> Self {
        BucketConstraint::range(Some(key), Some(key))
    }

    pub fn keys(keys: impl IntoIterator<Item = BucketKey>) -> Self {
        let set: BTreeSet<BucketKey> = keys.into_iter().collect();
        if set.is_empty() {
            BucketConstraint::Empty
        } else {
            BucketConstraint::In(set)
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self, BucketConstraint::Unconstrained)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, BucketConstraint::Empty)
    }

    pub fn contains(&self, key: BucketKey) -> bool {
        match self {
            BucketConstraint::Unconstrained => true,
            BucketConstraint::Range { lo, hi } => {
                lo.is_none_or(|lo| key >= lo) && hi.is_none_or(|hi| key <= hi)
            }
            BucketConstraint::In(keys) => keys.contains(&key),
            BucketConstraint::Empty => false,
        }
    }

    /// Conjunction of two constraints on the same level.
    pub fn intersect(self, other: BucketConstraint) -> BucketConstraint {
        use BucketConstraint::*;

        match (self, other) {
            (Unconstrained, c) | (c, Unconstrained) => c,
            (Empty, _) | (_, Empty) => Empty,
            (Range { lo: a_lo, hi: a_hi }, Range { lo: b_lo, hi: b_hi }) => {
                BucketConstraint::range(max_bound(a_lo, b_lo), min_bound(a_hi, b_hi))
            }
            (Range { lo, hi }, In(keys)) | (In(keys), Range { lo, hi }) => {
                let range = BucketConstraint::range(lo, hi);
                BucketConstraint::keys(keys.into_iter().filter(|k| range.contains(*k)))
            }
            (In(a), In(b)) => BucketConstraint::keys(a.intersection(&b).copied()),
        }
    }
}

fn max_bound(a: Option<BucketKey>, b: Option<BucketKey>) -> Option<BucketKey> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (bound, None) | (None, bound) => bound,
    }
}

fn min_bound(a: Option<BucketKey>, b: Option<BucketKey>) -> Option<BucketKey> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (bound, None) | (None, bound) => bound,
    }
}

impl fmt::Display for BucketConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketConstraint::Unconstrained => write!(f, "*"),
            BucketConstraint::Range { lo, hi } => {
                match lo {
                    Some(lo) => write!(f, "[{}", lo)?,
                    None => write!(f, "(-inf")?,
                }
                match hi {
                    Some(hi) => write!(f, ", {}]", hi),
                    None => write!(f, ", +inf)"),
                }
            }
            BucketConstraint::In(keys) => {
                write!(f, "{{")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", key)?;
                }
                write!(f, "}}")
            }
            BucketConstraint::Empty => write!(f, "∅"),
        }
    }
}

/// Output of predicate compilation: one constraint per tree level plus the
/// residual predicate re-evaluated per surviving record.
///
/// The residual is always the full original predicate. Constraints only
/// add pruning; they never replace the per-record check, so a weak (or
/// absent) constraint degrades performance, never correctness.
pub struct CompiledQuery<R> {
    constraints: Vec<BucketConstraint>,
    residual: Predicate<R>,
}

impl<R> CompiledQuery<R> {
    pub(crate) fn new(constraints: Vec<BucketConstraint>, residual: Predicate<R>) -> Self {
        Self {
            constraints,
            residual,
        }
    }

    /// Constraint for a tree level. Levels beyond the compiled depth are
    /// unconstrained.
    pub fn constraint(&self, level: usize) -> &BucketConstraint {
        static UNCONSTRAINED: BucketConstraint = BucketConstraint::Unconstrained;
        self.constraints.get(level).unwrap_or(&UNCONSTRAINED)
    }

    pub fn constraints(&self) -> &[BucketConstraint] {
        &self.constraints
    }

    pub fn residual(&self) -> &Predicate<R> {
        &self.residual
    }

    /// True when no level contributes pruning (the query degrades to a
    /// full scan).
    pub fn is_full_scan(&self) -> bool {
        self.constraints.iter().all(BucketConstraint::is_unconstrained)
    }

    /// True when some level admits no bucket at all; the result is the
    /// monoid identity without visiting a single record.
    pub fn prunes_everything(&self) -> bool {
        self.constraints.iter().any(BucketConstraint::is_empty)
    }
}

impl<R> fmt::Debug for CompiledQuery<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompiledQuery({})", self)
    }
}

impl<R> fmt::Display for CompiledQuery<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (level, constraint) in self.constraints.iter().enumerate() {
            write!(f, "L{}: {} | ", level, constraint)?;
        }
        write!(f, "residual: {}", self.residual)
    }
}
