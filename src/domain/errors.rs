//! Domain errors for the Mender remediation engine.

use thiserror::Error;

/// Domain-level errors that can occur in the Mender system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Analyzer {name} failed: {reason}")]
    AnalyzerFailed { name: String, reason: String },

    #[error("No eligible executor for directive {directive_type}: none of {targets:?} are registered")]
    NoEligibleExecutor {
        directive_type: String,
        targets: Vec<String>,
    },

    #[error("Dispatch to {target} failed after retries: {reason}")]
    DispatchFailed { target: String, reason: String },

    #[error("Executor rejected directive: {0}")]
    ExecutorRejected(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
