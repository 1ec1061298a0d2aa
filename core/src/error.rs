use thiserror::Error;

use crate::tree::RecordId;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("build failed at record {record}: {reason}")]
    Build { record: RecordId, reason: String },

    #[error("record store exceeds addressable capacity: {0} records")]
    CapacityExceeded(usize),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("type error: cannot compare {lhs} with {rhs}")]
    TypeMismatch {
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("query cancelled")]
    Cancelled,
}
