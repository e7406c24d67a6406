//! Error types for sink and watermark operations.

use hydro_common::CalendarError;
use thiserror::Error;

/// Result type alias using StorageError.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// No connection could be established or acquired.
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Timestamp conversion failed: {0}")]
    Calendar(#[from] CalendarError),

    /// Failure injected or reported by a non-database sink.
    #[error("Publish rejected: {0}")]
    Rejected(String),
}

impl StorageError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}
