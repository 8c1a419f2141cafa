//! Storage collaborator error types

use thiserror::Error;

/// Errors reported by a series store
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Requested database does not exist
    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// Requested measurement does not exist in the database
    #[error("Measurement not found: {db}.{measurement}")]
    MeasurementNotFound { db: String, measurement: String },

    /// Requested field does not exist in the measurement
    #[error("Field not found: {measurement}.{field}")]
    FieldNotFound { measurement: String, field: String },

    /// Invalid time range (start >= end)
    #[error("Invalid time range: start must be less than end")]
    InvalidTimeRange,
}

impl StorageError {
    /// Whether this error means the requested series does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::DatabaseNotFound(_)
                | StorageError::MeasurementNotFound { .. }
                | StorageError::FieldNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::MeasurementNotFound {
            db: "metrics".to_string(),
            measurement: "cpu".to_string(),
        };
        assert_eq!(err.to_string(), "Measurement not found: metrics.cpu");
        assert!(err.is_not_found());

        assert!(!StorageError::InvalidTimeRange.is_not_found());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));
    }
}
