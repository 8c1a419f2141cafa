//! Archive error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding archival records
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Input ended before a field was complete
    #[error("Truncated archival record: {field} needs {expected} bytes, got {actual}")]
    TruncatedRecord {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A length prefix is negative
    #[error("Invalid length {length} for {field}")]
    InvalidLength { field: &'static str, length: i64 },

    /// A string does not fit its 16-bit length prefix
    #[error("{field} is {length} bytes, longer than 65535")]
    StringTooLong { field: &'static str, length: usize },

    /// A string field is not valid UTF-8
    #[error("{field} is not valid UTF-8: {source}")]
    InvalidUtf8 {
        field: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;
