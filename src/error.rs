//! Error types for the Tessera library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`TesseraError`] enum. The variants map onto the failure classes of the
//! engine:
//!
//! - [`TesseraError::Validation`] - a document was rejected at add time
//! - [`TesseraError::QueryParse`] - a query tree is malformed; raised before any I/O
//! - [`TesseraError::Io`] / [`TesseraError::Storage`] - durable writes or reads failed
//! - [`TesseraError::Corruption`] - a checksum or format check failed while opening
//!
//! # Examples
//!
//! ```
//! use tessera::error::{Result, TesseraError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(TesseraError::validation("field 'price' was declared as Int32"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Tessera operations.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// I/O errors (file operations, fsync, rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A document or field failed validation and was not admitted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A query tree is malformed.
    #[error("Query parse error: {0}")]
    QueryParse(String),

    /// Persisted data failed a checksum or format check.
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Storage-related errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Index-related errors.
    #[error("Index error: {0}")]
    Index(String),

    /// Binary serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases.
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with TesseraError.
pub type Result<T> = std::result::Result<T, TesseraError>;

impl TesseraError {
    /// Create a new validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        TesseraError::Validation(msg.into())
    }

    /// Create a new query parse error.
    pub fn query_parse<S: Into<String>>(msg: S) -> Self {
        TesseraError::QueryParse(msg.into())
    }

    /// Create a new corruption error.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        TesseraError::Corruption(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        TesseraError::Storage(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        TesseraError::Index(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        TesseraError::Other(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        TesseraError::Other(format!("Invalid configuration: {}", msg.into()))
    }

    /// Whether this error reports damaged persisted data.
    pub fn is_corruption(&self) -> bool {
        matches!(self, TesseraError::Corruption(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = TesseraError::validation("bad field");
        assert_eq!(error.to_string(), "Validation error: bad field");

        let error = TesseraError::query_parse("low > high");
        assert_eq!(error.to_string(), "Query parse error: low > high");

        let error = TesseraError::corruption("checksum mismatch");
        assert_eq!(error.to_string(), "Corruption detected: checksum mismatch");
        assert!(error.is_corruption());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let tessera_error = TesseraError::from(io_error);

        match tessera_error {
            TesseraError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_only_corruption_is_corruption() {
        let errors = [
            TesseraError::validation("v"),
            TesseraError::query_parse("q"),
            TesseraError::corruption("c"),
            TesseraError::storage("s"),
            TesseraError::index("i"),
            TesseraError::other("o"),
        ];
        for error in &errors {
            let expected = match error {
                TesseraError::Corruption(_) => true,
                TesseraError::Io(_)
                | TesseraError::Validation(_)
                | TesseraError::QueryParse(_)
                | TesseraError::Storage(_)
                | TesseraError::Index(_)
                | TesseraError::Serialization(_)
                | TesseraError::Json(_)
                | TesseraError::Other(_) => false,
            };
            assert_eq!(error.is_corruption(), expected, "{error}");
        }
    }
}
