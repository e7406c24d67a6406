//! Error types for the pipeline crate.

use hydro_common::{CalendarError, DescriptorError, SourceError};
use storage::StorageError;
use thiserror::Error;

/// Errors that can occur while publishing.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid dataset configuration: {0}")]
    InvalidConfig(#[from] DescriptorError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Timestamp conversion failed: {0}")]
    Calendar(#[from] CalendarError),

    #[error("Store has {0} cells, more than a smallint cell_id can address")]
    TooManyCells(usize),

    #[error("Variable {variable} has {actual} values, expected {expected}")]
    LengthMismatch {
        variable: String,
        expected: usize,
        actual: usize,
    },
}

impl PipelineError {
    /// Errors after which no further step of the dataset can succeed.
    pub fn is_fatal(&self) -> bool {
        match self {
            PipelineError::Source(e) => e.is_fatal(),
            PipelineError::TooManyCells(_) => true,
            _ => false,
        }
    }

    pub fn is_sink_unavailable(&self) -> bool {
        matches!(self, PipelineError::Storage(e) if e.is_unavailable())
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
