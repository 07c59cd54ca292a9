//! Error types for SparseDB Core

use thiserror::Error;

/// Result type alias using SparseDB Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the sparse column store
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from storage operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog metadata (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Access mode string was not `r` or `rw`
    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    /// Store, column file or catalog metadata is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Catalog metadata already persisted
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Column names passed to `create` are not unique
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Persisted metadata violates the catalog invariants
    #[error("Corrupt metadata: {0}")]
    CorruptMetadata(String),

    /// Value array and presence index of a column disagree
    #[error("Corrupt column '{column}': {reason}")]
    CorruptColumn {
        /// Column name
        column: String,
        /// What disagreed
        reason: String,
    },

    /// Column name unusable as a directory name or query operand
    #[error("Invalid column name: {0:?}")]
    InvalidColumnName(String),

    /// Column name not present in the catalog
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Block or slice geometry does not match what the store expects
    #[error("Shape error: {0}")]
    Shape(String),

    /// Append would place an index at or below one already written
    #[error("Out of order append to column '{column}': index {index} not above {previous}")]
    OutOfOrder {
        /// Column name
        column: String,
        /// First offending global index
        index: u32,
        /// Largest index already stored or earlier in the batch
        previous: u32,
    },

    /// Operator popped more operands than the stack holds
    #[error("Stack underflow: operator '{operator}' needs {needed} operands, {available} available")]
    StackUnderflow {
        /// Operator token
        operator: String,
        /// Operator arity
        needed: usize,
        /// Stack depth at the time
        available: usize,
    },

    /// Expression did not reduce to exactly one value
    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    /// Operator token with no entry in the dispatch table
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),
}

impl Error {
    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a corrupt-metadata error
    pub fn corrupt_metadata(msg: impl Into<String>) -> Self {
        Self::CorruptMetadata(msg.into())
    }

    /// Create a corrupt-column error
    pub fn corrupt_column(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptColumn {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Create a shape error
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }

    /// Create a malformed-expression error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedExpression(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::StackUnderflow {
            operator: "&".to_string(),
            needed: 2,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "Stack underflow: operator '&' needs 2 operands, 1 available"
        );

        let err = Error::shape("block 3 has width 8, expected 4");
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
