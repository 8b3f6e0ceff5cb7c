//! Error types for the repository layer.
//!
//! Absence is not an error: `get` returns `Option`, `get_bulk` omits
//! missing ids, `delete` reports `false`. The variants below cover
//! malformed input, connectivity loss, and everything else a backend can
//! throw — translated at the adapter boundary so no driver type leaks out.

use thiserror::Error;

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepositoryError>;

/// Errors that can occur in repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Malformed input rejected before any query was issued (bad
    /// identifier, empty id, non-object update payload).
    #[error("validation error: {0}")]
    Validation(String),

    /// Connection-level failure. Distinguished from [`Self::Backend`] so
    /// callers can decide retry-vs-give-up.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Any other backend-reported failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// Entity payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transaction-handle misuse (unknown or duplicate handle id).
    #[error("transaction error: {0}")]
    Transaction(String),
}

impl From<fastapp_model::Error> for RepositoryError {
    fn from(err: fastapp_model::Error) -> Self {
        Self::Validation(err.to_string())
    }
}
