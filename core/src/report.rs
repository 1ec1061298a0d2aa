//! Report monoids: the algebraic contract behind query reduction.
//!
//! The executor folds mapped values in whatever order pruning and the
//! thread schedule produce, combining partial results pairwise on any
//! thread. Nothing else makes that well-defined, so the contract is
//! strict:
//!
//! - `identity()` is a two-sided identity for `combine`;
//! - `combine` is associative and commutative;
//! - both are pure.
//!
//! The contract is a caller obligation, verified by the property tests in
//! this module and never enforced at runtime. A `combine` that is not
//! actually commutative produces wrong answers, not errors.

use std::collections::BTreeSet;

/// A result type with an identity value and a commutative, associative
/// combining operator.
pub trait ReportMonoid: Sized + Send {
    fn identity() -> Self;

    #[must_use]
    fn combine(self, other: Self) -> Self;
}

/// Matching-record count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Count(pub u64);

impl ReportMonoid for Count {
    fn identity() -> Self {
        Count(0)
    }

    fn combine(self, other: Self) -> Self {
        Count(self.0 + other.0)
    }
}

/// Integer sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sum(pub i64);

impl ReportMonoid for Sum {
    fn identity() -> Self {
        Sum(0)
    }

    fn combine(self, other: Self) -> Self {
        Sum(self.0 + other.0)
    }
}

/// Floating-point sum.
///
/// Float addition is only approximately associative; reports that cannot
/// tolerate rounding differences across fold orders should accumulate in
/// integers instead.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FloatSum(pub f64);

impl ReportMonoid for FloatSum {
    fn identity() -> Self {
        FloatSum(0.0)
    }

    fn combine(self, other: Self) -> Self {
        FloatSum(self.0 + other.0)
    }
}

/// Minimum over an integer measure; `None` when nothing matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Min(pub Option<i64>);

impl Min {
    pub fn of(value: i64) -> Self {
        Min(Some(value))
    }
}

impl ReportMonoid for Min {
    fn identity() -> Self {
        Min(None)
    }

    fn combine(self, other: Self) -> Self {
        Min(match (self.0, other.0) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (value, None) | (None, value) => value,
        })
    }
}

/// Maximum over an integer measure; `None` when nothing matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Max(pub Option<i64>);

impl Max {
    pub fn of(value: i64) -> Self {
        Max(Some(value))
    }
}

impl ReportMonoid for Max {
    fn identity() -> Self {
        Max(None)
    }

    fn combine(self, other: Self) -> Self {
        Max(match (self.0, other.0) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (value, None) | (None, value) => value,
        })
    }
}

/// Set union. The order-insensitive way to collect matching keys.
impl<T: Ord + Send> ReportMonoid for BTreeSet<T> {
    fn identity() -> Self {
        BTreeSet::new()
    }

    fn combine(mut self, other: Self) -> Self {
        self.extend(other);
        self
    }
}

/// Pairwise product monoid, for compound reports such as
/// `(Count, Sum)` — count and total in one pass.
impl<A: ReportMonoid, B: ReportMonoid> ReportMonoid for (A, B) {
    fn identity() -> Self {
        (A::identity(), B::identity())
    }

    fn combine(self, other: Self) -> Self {
        (self.0.combine(other.0), self.1.combine(other.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn laws<T: ReportMonoid + Clone + PartialEq + std::fmt::Debug>(a: T, b: T, c: T) {
        assert_eq!(a.clone().combine(T::identity()), a.clone());
        assert_eq!(T::identity().combine(a.clone()), a.clone());
        assert_eq!(a.clone().combine(b.clone()), b.clone().combine(a.clone()));
        assert_eq!(
            a.clone().combine(b.clone()).combine(c.clone()),
            a.combine(b.combine(c))
        );
    }

    proptest! {
        #[test]
        fn count_laws(a in 0u64..1 << 40, b in 0u64..1 << 40, c in 0u64..1 << 40) {
            laws(Count(a), Count(b), Count(c));
        }

        #[test]
        fn sum_laws(a in -1i64 << 40..1 << 40, b in -1i64 << 40..1 << 40, c in -1i64 << 40..1 << 40) {
            laws(Sum(a), Sum(b), Sum(c));
        }

        #[test]
        fn min_max_laws(a in any::<Option<i64>>(), b in any::<Option<i64>>(), c in any::<Option<i64>>()) {
            laws(Min(a), Min(b), Min(c));
            laws(Max(a), Max(b), Max(c));
        }

        #[test]
        fn set_laws(
            a in prop::collection::btree_set(any::<i32>(), 0..16),
            b in prop::collection::btree_set(any::<i32>(), 0..16),
            c in prop::collection::btree_set(any::<i32>(), 0..16),
        ) {
            laws(a, b, c);
        }

        #[test]
        fn pair_laws(a in any::<(u64, i64)>(), b in any::<(u64, i64)>(), c in any::<(u64, i64)>()) {
            laws(
                (Count(a.0 >> 20), Sum(a.1 >> 20)),
                (Count(b.0 >> 20), Sum(b.1 >> 20)),
                (Count(c.0 >> 20), Sum(c.1 >> 20)),
            );
        }
    }
}
