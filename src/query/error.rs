//! Query error types
//!
//! Defines all error conditions that can occur during query compilation and execution.

use thiserror::Error;

/// Errors that can occur during query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// A filter token does not match the `key op value` grammar
    #[error("Malformed filter token '{token}': {reason}")]
    MalformedFilterExpression { token: String, reason: String },

    /// The query text could not be compiled
    #[error("Invalid query syntax: {message}")]
    InvalidQuerySyntax {
        message: String,
        #[source]
        source: Option<Box<QueryError>>,
    },

    /// No stage is registered under this name
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// Stage called with fewer arguments than it requires
    #[error("Stage '{stage}' needs {needed} argument(s), found {found}")]
    InsufficientArguments {
        stage: String,
        needed: usize,
        found: usize,
    },

    /// Stage argument present but unusable
    #[error("Invalid argument for stage '{stage}': {reason}")]
    InvalidStageArgument { stage: String, reason: String },

    /// Structured filter list breaks the combinator discipline
    #[error("Malformed structured filter at element {position}: {reason}")]
    MalformedStructuredFilter { position: usize, reason: String },

    /// Database, measurement or field does not exist
    #[error("Series not found: {0}")]
    SeriesNotFound(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// Request body could not be decoded
    #[error("Invalid request JSON: {0}")]
    Json(String),
}

impl QueryError {
    /// Syntax error without an underlying cause
    pub fn syntax(message: impl Into<String>) -> Self {
        QueryError::InvalidQuerySyntax {
            message: message.into(),
            source: None,
        }
    }

    /// Syntax error caused by another query error
    pub fn syntax_caused_by(message: impl Into<String>, cause: QueryError) -> Self {
        QueryError::InvalidQuerySyntax {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_syntax_error_keeps_cause() {
        let cause = QueryError::MalformedFilterExpression {
            token: "bad".into(),
            reason: "no operator".into(),
        };
        let err = QueryError::syntax_caused_by("invalid filter", cause);
        let source = err.source().unwrap();
        assert!(source.to_string().contains("bad"));
        assert!(QueryError::syntax("empty").source().is_none());
    }

    #[test]
    fn test_messages() {
        let err = QueryError::InsufficientArguments {
            stage: "add".into(),
            needed: 1,
            found: 0,
        };
        assert_eq!(err.to_string(), "Stage 'add' needs 1 argument(s), found 0");
    }
}
