//! Scalar values read out of records by field accessors.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A scalar field value.
///
/// Records stay opaque to the engine; every field access goes through a
/// caller-supplied accessor that yields one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Str(_) => "str",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Equality with numeric promotion (`Int` compares against `Float`).
    /// Comparisons involving `Null` are vacuously false, `Null == Null`
    /// included.
    pub fn loose_eq(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Bool(l), FieldValue::Bool(r)) => l == r,
            (FieldValue::Int(l), FieldValue::Int(r)) => l == r,
            (FieldValue::Float(l), FieldValue::Float(r)) => l == r,
            (FieldValue::Int(l), FieldValue::Float(r)) | (FieldValue::Float(r), FieldValue::Int(l)) => {
                (*l as f64) == *r
            }
            (FieldValue::Str(l), FieldValue::Str(r)) => l == r,
            _ => false,
        }
    }

    /// Three-way comparison with numeric promotion.
    ///
    /// Returns `Ok(None)` when either side is `Null` (the comparison is
    /// vacuously false) and an error when the types are incomparable.
    pub fn try_cmp(&self, other: &FieldValue) -> StoreResult<Option<Ordering>> {
        let ordering = match (self, other) {
            (FieldValue::Null, _) | (_, FieldValue::Null) => return Ok(None),
            (FieldValue::Bool(l), FieldValue::Bool(r)) => l.cmp(r),
            (FieldValue::Int(l), FieldValue::Int(r)) => l.cmp(r),
            (FieldValue::Float(l), FieldValue::Float(r)) => {
                l.partial_cmp(r).unwrap_or(Ordering::Equal)
            }
            (FieldValue::Int(l), FieldValue::Float(r)) => {
                (*l as f64).partial_cmp(r).unwrap_or(Ordering::Equal)
            }
            (FieldValue::Float(l), FieldValue::Int(r)) => {
                l.partial_cmp(&(*r as f64)).unwrap_or(Ordering::Equal)
            }
            (FieldValue::Str(l), FieldValue::Str(r)) => l.cmp(r),
            (l, r) => {
                return Err(StoreError::TypeMismatch {
                    lhs: l.type_name(),
                    rhs: r.type_name(),
                });
            }
        };

        Ok(Some(ordering))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        FieldValue::Float(x)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}
