//! Predicate AST over record fields.
//!
//! A `Predicate` is a pure boolean function of a record, produced by an
//! external front-end (or built directly with the helpers here). The
//! engine consumes it twice: the compiler analyzes the top-level
//! conjunction for pruning constraints, and the executor re-evaluates the
//! residual per surviving record.

mod compile;
mod constraint;
#[cfg(test)]
mod tests;

pub use compile::compile;
pub use constraint::{BucketConstraint, CompiledQuery};

use std::fmt;
use std::sync::Arc;

use crate::error::{StoreError, StoreResult};
use crate::value::FieldValue;

// Field references

/// A named field accessor.
///
/// The closure reads the field out of a record; the name is what pushdown
/// matching keys on — a conjunct's left-hand side matches an index when
/// the names are equal.
pub struct FieldRef<R> {
    name: String,
    get: Arc<dyn Fn(&R) -> FieldValue + Send + Sync>,
}

impl<R> FieldRef<R> {
    pub fn new(
        name: impl Into<String>,
        get: impl Fn(&R) -> FieldValue + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            get: Arc::new(get),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_of(&self, record: &R) -> FieldValue {
        (self.get)(record)
    }

    // Comparison builders, in the manner of a front-end.

    pub fn eq(self, value: impl Into<FieldValue>) -> Predicate<R> {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<FieldValue>) -> Predicate<R> {
        self.compare(CompareOp::Ne, value)
    }

    pub fn lt(self, value: impl Into<FieldValue>) -> Predicate<R> {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl Into<FieldValue>) -> Predicate<R> {
        self.compare(CompareOp::Le, value)
    }

    pub fn gt(self, value: impl Into<FieldValue>) -> Predicate<R> {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<FieldValue>) -> Predicate<R> {
        self.compare(CompareOp::Ge, value)
    }

    /// Membership test against an explicit value list.
    pub fn one_of<V: Into<FieldValue>>(
        self,
        values: impl IntoIterator<Item = V>,
    ) -> Predicate<R> {
        Predicate::In {
            field: self,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn compare(self, op: CompareOp, value: impl Into<FieldValue>) -> Predicate<R> {
        Predicate::Compare {
            field: self,
            op,
            value: value.into(),
        }
    }
}

impl<R> Clone for FieldRef<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            get: Arc::clone(&self.get),
        }
    }
}

impl<R> fmt::Debug for FieldRef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRef")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// Comparison operators

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn accepts(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;

        match self {
            CompareOp::Eq => ordering == Equal,
            CompareOp::Ne => ordering != Equal,
            CompareOp::Lt => ordering == Less,
            CompareOp::Le => ordering != Greater,
            CompareOp::Gt => ordering == Greater,
            CompareOp::Ge => ordering != Less,
        }
    }
}

// Predicate tree

/// Boolean expression over record fields.
pub enum Predicate<R> {
    /// Constant truth value. `Const(true)` matches every record.
    Const(bool),
    /// Field / constant comparison.
    Compare {
        field: FieldRef<R>,
        op: CompareOp,
        value: FieldValue,
    },
    /// Field membership in a value list.
    In {
        field: FieldRef<R>,
        values: Vec<FieldValue>,
    },
    And(Vec<Predicate<R>>),
    Or(Vec<Predicate<R>>),
    Not(Box<Predicate<R>>),
}

impl<R> Predicate<R> {
    /// Conjoin, flattening nested `And` chains.
    pub fn and(self, other: Predicate<R>) -> Predicate<R> {
        match (self, other) {
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), other) => {
                left.push(other);
                Predicate::And(left)
            }
            (left, Predicate::And(mut right)) => {
                right.insert(0, left);
                Predicate::And(right)
            }
            (left, right) => Predicate::And(vec![left, right]),
        }
    }

    pub fn or(self, other: Predicate<R>) -> Predicate<R> {
        match (self, other) {
            (Predicate::Or(mut left), Predicate::Or(right)) => {
                left.extend(right);
                Predicate::Or(left)
            }
            (Predicate::Or(mut left), other) => {
                left.push(other);
                Predicate::Or(left)
            }
            (left, right) => Predicate::Or(vec![left, right]),
        }
    }

    pub fn not(self) -> Predicate<R> {
        Predicate::Not(Box::new(self))
    }

    /// Evaluate against one record.
    ///
    /// Comparing incompatible types (an int field against a string
    /// constant, say) is an evaluation error and aborts the query that
    /// triggered it.
    pub fn matches(&self, record: &R) -> StoreResult<bool> {
        match self {
            Predicate::Const(b) => Ok(*b),
            Predicate::Compare { field, op, value } => {
                eval_compare(&field.value_of(record), *op, value)
            }
            Predicate::In { field, values } => {
                let lhs = field.value_of(record);
                Ok(values.iter().any(|v| lhs.loose_eq(v)))
            }
            Predicate::And(parts) => {
                for part in parts {
                    if !part.matches(record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(parts) => {
                for part in parts {
                    if part.matches(record)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Not(inner) => Ok(!inner.matches(record)?),
        }
    }

    /// The top-level conjuncts: an `And`-chain flattened, anything else a
    /// single conjunct.
    pub(crate) fn conjuncts(&self) -> Vec<&Predicate<R>> {
        fn walk<'p, R>(predicate: &'p Predicate<R>, out: &mut Vec<&'p Predicate<R>>) {
            match predicate {
                Predicate::And(parts) => {
                    for part in parts {
                        walk(part, out);
                    }
                }
                other => out.push(other),
            }
        }

        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    /// Shape checks performed once at compile time, before any scanning.
    /// A malformed AST here means a front-end bug, not a data problem.
    pub(crate) fn validate(&self) -> StoreResult<()> {
        match self {
            Predicate::Const(_) => Ok(()),
            Predicate::Compare { field, op, value } => {
                if value.is_null() {
                    return Err(StoreError::Compile(format!(
                        "comparison `{} {} null` against a null constant is undefined",
                        field.name(),
                        op.symbol()
                    )));
                }
                Ok(())
            }
            Predicate::In { field, values } => {
                if values.is_empty() {
                    return Err(StoreError::Compile(format!(
                        "empty IN list for field `{}`",
                        field.name()
                    )));
                }
                if values.iter().any(FieldValue::is_null) {
                    return Err(StoreError::Compile(format!(
                        "null constant in IN list for field `{}`",
                        field.name()
                    )));
                }
                Ok(())
            }
            Predicate::And(parts) | Predicate::Or(parts) => {
                if parts.is_empty() {
                    return Err(StoreError::Compile(
                        "empty boolean connective".to_string(),
                    ));
                }
                parts.iter().try_for_each(Predicate::validate)
            }
            Predicate::Not(inner) => inner.validate(),
        }
    }
}

fn eval_compare(lhs: &FieldValue, op: CompareOp, rhs: &FieldValue) -> StoreResult<bool> {
    match op {
        CompareOp::Eq => Ok(lhs.loose_eq(rhs)),
        // Null never satisfies any comparison, != included.
        CompareOp::Ne => Ok(!lhs.is_null() && !rhs.is_null() && !lhs.loose_eq(rhs)),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            match lhs.try_cmp(rhs)? {
                Some(ordering) => Ok(op.accepts(ordering)),
                None => Ok(false),
            }
        }
    }
}

impl<R> Clone for Predicate<R> {
    fn clone(&self) -> Self {
        match self {
            Predicate::Const(b) => Predicate::Const(*b),
            Predicate::Compare { field, op, value } => Predicate::Compare {
                field: field.clone(),
                op: *op,
                value: value.clone(),
            },
            Predicate::In { field, values } => Predicate::In {
                field: field.clone(),
                values: values.clone(),
            },
            Predicate::And(parts) => Predicate::And(parts.clone()),
            Predicate::Or(parts) => Predicate::Or(parts.clone()),
            Predicate::Not(inner) => Predicate::Not(inner.clone()),
        }
    }
}

impl<R> fmt::Debug for Predicate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self)
    }
}

impl<R> fmt::Display for Predicate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Const(b) => write!(f, "{}", b),
            Predicate::Compare { field, op, value } => {
                write!(f, "{} {} {}", field.name(), op.symbol(), value)
            }
            Predicate::In { field, values } => {
                write!(f, "{} in [", field.name())?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Predicate::And(parts) => write_joined(f, parts, " and "),
            Predicate::Or(parts) => write_joined(f, parts, " or "),
            Predicate::Not(inner) => write!(f, "not ({})", inner),
        }
    }
}

fn write_joined<R>(
    f: &mut fmt::Formatter<'_>,
    parts: &[Predicate<R>],
    separator: &str,
) -> fmt::Result {
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", separator)?;
        }
        match part {
            Predicate::And(_) | Predicate::Or(_) => write!(f, "({})", part)?,
            _ => write!(f, "{}", part)?,
        }
    }
    Ok(())
}
