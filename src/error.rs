//! Error types for store operations

use crate::types::Record;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("database did not report an id for the inserted row")]
    MissingInsertId,

    #[error("unsupported record type: {0}")]
    UnsupportedType(String),

    #[error("invalid record value: {0}")]
    InvalidValue(String),

    #[error("invalid record id: {0:?}")]
    InvalidId(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("malformed record payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    #[error("invalid connection descriptor: {0}")]
    Config(String),
}

/// Failure of a batch operation.
///
/// Batches stop at the first error. `completed` holds the records handled
/// before that point; writes already applied are not rolled back.
#[derive(Debug, Error)]
#[error("{error} ({} record(s) completed before failure)", .completed.len())]
pub struct BatchError {
    pub completed: Vec<Record>,
    #[source]
    pub error: StoreError,
}

impl BatchError {
    pub fn new(completed: Vec<Record>, error: StoreError) -> Self {
        Self { completed, error }
    }

    /// Failure before any record was handled.
    pub fn empty(error: StoreError) -> Self {
        Self::new(Vec::new(), error)
    }

    pub fn into_parts(self) -> (Vec<Record>, StoreError) {
        (self.completed, self.error)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub type BatchResult = std::result::Result<Vec<Record>, BatchError>;
