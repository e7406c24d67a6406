//! Error types for array sources and dataset descriptors.

use thiserror::Error;

/// Result type alias using SourceError.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors raised while reading an array store.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source unavailable at {locator}: {message}")]
    Unavailable { locator: String, message: String },

    #[error("Variable missing from source: {0}")]
    VariableMissing(String),

    #[error("Dimension missing from source: {0}")]
    DimensionMissing(String),

    #[error("Time index {index} out of range (time dimension has {len} steps)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Failed to read '{variable}': {message}")]
    Read { variable: String, message: String },
}

impl SourceError {
    /// Whether this error must abort the dataset's run rather than fail a
    /// single time-step.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SourceError::Unavailable { .. }
                | SourceError::VariableMissing(_)
                | SourceError::DimensionMissing(_)
        )
    }
}

/// Errors raised while validating a dataset descriptor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Dataset name must not be empty")]
    EmptyName,

    #[error("Dataset '{0}' has no variables configured")]
    NoVariables(String),

    #[error("Invalid SQL identifier '{identifier}' in dataset '{dataset}'")]
    InvalidIdentifier { dataset: String, identifier: String },

    #[error("Column '{column}' appears more than once in dataset '{dataset}'")]
    DuplicateColumn { dataset: String, column: String },

    #[error("Column '{column}' in dataset '{dataset}' collides with a fixed column")]
    ReservedColumn { dataset: String, column: String },

    #[error("Dataset name '{0}' is configured more than once")]
    DuplicateDataset(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SourceError::VariableMissing("flow".into()).is_fatal());
        assert!(SourceError::Unavailable {
            locator: "/data/x.nc".into(),
            message: "no such file".into()
        }
        .is_fatal());
        assert!(!SourceError::IndexOutOfRange { index: 4, len: 3 }.is_fatal());
        assert!(!SourceError::Read {
            variable: "flow".into(),
            message: "HDF error".into()
        }
        .is_fatal());
    }
}
