//! Error taxonomy for the configuration engine.
//!
//! `NotFound` and `Validation` are recoverable caller errors, translated at
//! the service boundary into structured responses. `Conflict` is retryable
//! by the caller (retry the whole operation). `Integrity` means a broken
//! storage invariant - it is never recovered, so monitoring observes the
//! corruption immediately.

use levelset_db::DbError;
use levelset_protocol::Violation;
use thiserror::Error;

/// Engine operation result type.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Environment, version or snapshot referenced by id does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Draft patch or config entry violates type/shape/temporal rules.
    /// Carries the complete list of violations, not just the first.
    #[error("Validation failed with {} violation(s)", .0.len())]
    Validation(Vec<Violation>),

    /// A uniqueness race was lost after retries. The caller should retry
    /// the whole operation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A storage invariant is broken (active pointer without snapshot,
    /// version without snapshot, undecodable snapshot). Fatal, not retried.
    #[error("Data integrity violation: {0}")]
    Integrity(String),

    /// Underlying storage failure.
    #[error(transparent)]
    Db(DbError),

    /// Serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    /// The violations behind a validation failure, if any.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Db(other),
        }
    }
}
