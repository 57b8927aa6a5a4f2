//! Error types raised by repository implementations.

use thiserror::Error;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("session store lock was poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("record {key} holds a {found} record")]
    MismatchedRecord { key: String, found: &'static str },

    #[error("stored session is missing its {0} record")]
    MissingRecord(&'static str),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
