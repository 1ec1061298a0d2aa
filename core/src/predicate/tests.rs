//! Tests for predicate evaluation and compilation.

use std::collections::BTreeSet;

use pretty_assertions::assert_eq;

use crate::catalog::{BucketKey, Direction, IndexCatalog, IndexDescriptor};
use crate::error::StoreError;
use crate::predicate::{BucketConstraint, FieldRef, Predicate, compile};
use crate::value::FieldValue;

#[derive(Debug, Clone)]
struct Event {
    ts: i64,
    kind: &'static str,
}

fn event(ts: i64, kind: &'static str) -> Event {
    Event { ts, kind }
}

fn ts() -> FieldRef<Event> {
    FieldRef::new("ts", |e: &Event| FieldValue::Int(e.ts))
}

fn kind() -> FieldRef<Event> {
    FieldRef::new("kind", |e: &Event| FieldValue::Str(e.kind.to_string()))
}

/// ts in minute-wide buckets at level 0, kind behind an opaque code at
/// level 1.
fn catalog() -> IndexCatalog<Event> {
    IndexCatalog::new(vec![
        IndexDescriptor::fixed_width(0, "ts", 60, |e: &Event| FieldValue::Int(e.ts)).unwrap(),
        IndexDescriptor::opaque(
            1,
            "kind",
            |e: &Event| FieldValue::Str(e.kind.to_string()),
            kind_code,
        ),
    ])
    .unwrap()
}

fn kind_code(value: &FieldValue) -> Option<BucketKey> {
    match value {
        FieldValue::Str(s) => match s.as_str() {
            "click" => Some(11),
            "view" => Some(22),
            "purchase" => Some(33),
            _ => None,
        },
        _ => None,
    }
}

fn keys(keys: impl IntoIterator<Item = BucketKey>) -> BucketConstraint {
    BucketConstraint::In(keys.into_iter().collect::<BTreeSet<_>>())
}

// Evaluation

#[test]
fn comparison_operators() {
    let e = event(120, "click");

    assert!(ts().eq(120).matches(&e).unwrap());
    assert!(ts().ne(121).matches(&e).unwrap());
    assert!(ts().lt(121).matches(&e).unwrap());
    assert!(ts().le(120).matches(&e).unwrap());
    assert!(ts().gt(119).matches(&e).unwrap());
    assert!(ts().ge(120).matches(&e).unwrap());
    assert!(!ts().gt(120).matches(&e).unwrap());
    assert!(kind().eq("click").matches(&e).unwrap());
}

#[test]
fn connectives() {
    let e = event(120, "click");

    assert!(ts().gt(100).and(kind().eq("click")).matches(&e).unwrap());
    assert!(!ts().gt(200).and(kind().eq("click")).matches(&e).unwrap());
    assert!(ts().gt(200).or(kind().eq("click")).matches(&e).unwrap());
    assert!(ts().gt(200).not().matches(&e).unwrap());
    assert!(Predicate::<Event>::Const(true).matches(&e).unwrap());
}

#[test]
fn in_membership() {
    let e = event(120, "view");

    assert!(kind().one_of(["click", "view"]).matches(&e).unwrap());
    assert!(!kind().one_of(["click", "purchase"]).matches(&e).unwrap());
}

#[test]
fn null_fields_never_match() {
    let missing = FieldRef::new("missing", |_: &Event| FieldValue::Null);
    let e = event(120, "click");

    assert!(!missing.clone().eq(1).matches(&e).unwrap());
    assert!(!missing.clone().ne(1).matches(&e).unwrap());
    assert!(!missing.gt(1).matches(&e).unwrap());
}

#[test]
fn incompatible_comparison_is_an_evaluation_error() {
    let e = event(120, "click");

    let err = kind().gt(5).matches(&e).unwrap_err();
    assert!(matches!(err, StoreError::TypeMismatch { .. }));
}

// Compilation

#[test]
fn range_conjunct_bounds_the_monotonic_level() {
    let query = compile(&ts().ge(120), &catalog()).unwrap();

    assert_eq!(
        *query.constraint(0),
        BucketConstraint::Range {
            lo: Some(2),
            hi: None
        }
    );
    assert!(query.constraint(1).is_unconstrained());
}

#[test]
fn boundary_bucket_stays_admitted() {
    // 130 falls inside bucket 2; records below 130 share that bucket, so
    // the bound must include it.
    let query = compile(&ts().lt(130), &catalog()).unwrap();

    assert_eq!(
        *query.constraint(0),
        BucketConstraint::Range {
            lo: None,
            hi: Some(2)
        }
    );
}

#[test]
fn descending_monotonic_flips_the_bounds() {
    // Bucket keys shrink as ts grows.
    let catalog = IndexCatalog::new(vec![IndexDescriptor::monotonic(
        0,
        "ts",
        Direction::Descending,
        |e: &Event| FieldValue::Int(e.ts),
        |v| match v {
            FieldValue::Int(ts) => Some(-ts.div_euclid(60)),
            _ => None,
        },
    )])
    .unwrap();

    let query = compile(&ts().gt(120), &catalog).unwrap();
    assert_eq!(
        *query.constraint(0),
        BucketConstraint::Range {
            lo: None,
            hi: Some(-2)
        }
    );

    let query = compile(&ts().le(120), &catalog).unwrap();
    assert_eq!(
        *query.constraint(0),
        BucketConstraint::Range {
            lo: Some(-2),
            hi: None
        }
    );
}

#[test]
fn equality_compiles_to_a_single_bucket() {
    let query = compile(&ts().eq(185).and(kind().eq("view")), &catalog()).unwrap();

    assert_eq!(
        *query.constraint(0),
        BucketConstraint::Range {
            lo: Some(3),
            hi: Some(3)
        }
    );
    assert_eq!(*query.constraint(1), keys([22]));
}

#[test]
fn range_on_an_opaque_index_stays_unconstrained() {
    let query = compile(&kind().gt("click"), &catalog()).unwrap();

    assert!(query.constraint(1).is_unconstrained());
    // The conjunct still holds in the residual.
    assert_eq!(query.residual().to_string(), "kind > \"click\"");
}

#[test]
fn inequality_is_never_pushed_down() {
    let query = compile(&ts().ne(120), &catalog()).unwrap();

    assert!(query.is_full_scan());
}

#[test]
fn disjunction_and_negation_stay_residual_only() {
    let either = ts().ge(120).or(kind().eq("click"));
    let query = compile(&either, &catalog()).unwrap();
    assert!(query.is_full_scan());

    let negated = ts().ge(120).not();
    let query = compile(&negated, &catalog()).unwrap();
    assert!(query.is_full_scan());
}

#[test]
fn conjuncts_on_one_level_intersect() {
    let window = ts().ge(120).and(ts().lt(300));
    let query = compile(&window, &catalog()).unwrap();

    assert_eq!(
        *query.constraint(0),
        BucketConstraint::Range {
            lo: Some(2),
            hi: Some(5)
        }
    );
}

#[test]
fn disjoint_conjuncts_prune_everything() {
    let impossible = ts().ge(600).and(ts().le(0));
    let query = compile(&impossible, &catalog()).unwrap();

    assert_eq!(*query.constraint(0), BucketConstraint::Empty);
    assert!(query.prunes_everything());
}

#[test]
fn const_false_conjunct_prunes_everything() {
    let never = Predicate::Const(false).and(ts().ge(0));
    let query = compile(&never, &catalog()).unwrap();

    assert!(query.prunes_everything());
}

#[test]
fn in_list_compiles_to_a_bucket_set() {
    let query = compile(&kind().one_of(["click", "purchase"]), &catalog()).unwrap();
    assert_eq!(*query.constraint(1), keys([11, 33]));

    let query = compile(&ts().one_of([30i64, 400]), &catalog()).unwrap();
    assert_eq!(*query.constraint(0), keys([0, 6]));
}

#[test]
fn unbucketable_constant_skips_pushdown() {
    // "refund" has no kind code; the level stays unconstrained and the
    // residual rejects per record.
    let query = compile(&kind().eq("refund"), &catalog()).unwrap();
    assert!(query.constraint(1).is_unconstrained());

    let query = compile(&kind().one_of(["click", "refund"]), &catalog()).unwrap();
    assert!(query.constraint(1).is_unconstrained());
}

#[test]
fn unindexed_fields_stay_residual_only() {
    let other = FieldRef::new("session", |_: &Event| FieldValue::Int(7));
    let query = compile(&other.eq(7).and(ts().ge(120)), &catalog()).unwrap();

    assert!(!query.constraint(0).is_unconstrained());
    assert!(query.constraint(1).is_unconstrained());
}

#[test]
fn residual_is_always_the_full_predicate() {
    let predicate = ts().ge(120).and(kind().eq("view"));
    let query = compile(&predicate, &catalog()).unwrap();

    assert_eq!(query.residual().to_string(), predicate.to_string());
}

#[test]
fn malformed_asts_fail_compilation() {
    let empty_in = Predicate::In {
        field: kind(),
        values: Vec::new(),
    };
    assert!(matches!(
        compile(&empty_in, &catalog()),
        Err(StoreError::Compile(_))
    ));

    let null_compare = ts().eq(FieldValue::Null);
    assert!(matches!(
        compile(&null_compare, &catalog()),
        Err(StoreError::Compile(_))
    ));

    let empty_and = Predicate::<Event>::And(Vec::new());
    assert!(matches!(
        compile(&empty_and, &catalog()),
        Err(StoreError::Compile(_))
    ));
}

#[test]
fn explain_line_lists_levels_and_residual() {
    let query = compile(&ts().ge(120).and(kind().eq("view")), &catalog()).unwrap();

    assert_eq!(
        query.to_string(),
        "L0: [2, +inf) | L1: {22} | residual: ts >= 120 and kind == \"view\""
    );
}

// Constraint algebra

#[test]
fn constraint_intersection_algebra() {
    use BucketConstraint::*;

    let range = BucketConstraint::range(Some(2), Some(8));
    assert_eq!(range.clone().intersect(Unconstrained), range);
    assert_eq!(range.clone().intersect(Empty), Empty);
    assert_eq!(
        range.clone().intersect(BucketConstraint::range(Some(5), None)),
        BucketConstraint::range(Some(5), Some(8))
    );
    assert_eq!(
        range.clone().intersect(keys([1, 4, 9])),
        keys([4])
    );
    assert_eq!(keys([1, 4]).intersect(keys([4, 9])), keys([4]));
    assert_eq!(keys([1, 4]).intersect(keys([9])), Empty);
    assert_eq!(
        BucketConstraint::range(Some(9), None).intersect(range),
        Empty
    );
}

#[test]
fn constraint_containment() {
    assert!(BucketConstraint::Unconstrained.contains(7));
    assert!(BucketConstraint::range(Some(2), None).contains(2));
    assert!(!BucketConstraint::range(Some(2), None).contains(1));
    assert!(BucketConstraint::range(None, Some(2)).contains(-5));
    assert!(keys([1, 2]).contains(2));
    assert!(!BucketConstraint::Empty.contains(0));
}
