//! Error types for keepvar
//!
//! This module defines all error kinds used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! Codec decode failure is deliberately NOT represented here: input that is
//! not valid JSON decodes to a plain string value, because untagged scalars
//! are valid stored values.

use crate::path::PathError;
use std::io;
use thiserror::Error;

/// Result type alias for keepvar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the keepvar store
#[derive(Debug, Error)]
pub enum Error {
    /// A path expression is malformed or walked off the stored document.
    /// Always surfaced to the caller; indicates a caller/schema mismatch.
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// Key not found where the operation requires it to exist
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A code value was encoded without source text
    #[error("cannot encode a {kind} value without source text")]
    MissingCode {
        /// Kind name of the value being encoded
        kind: &'static str,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An operation has no meaning for the chosen backend
    #[error("operation '{operation}' is not supported by the {backend} backend")]
    Unsupported {
        /// Backend name
        backend: &'static str,
        /// Operation name
        operation: &'static str,
    },

    /// Opaque failure from the remote store client, propagated unchanged
    #[error("remote client error: {0}")]
    Remote(String),

    /// I/O error (snapshot file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_path() {
        let err = Error::Path(PathError::MissingField("status".to_string()));
        assert!(err.to_string().contains("status"));
    }

    #[test]
    fn test_error_display_key_not_found() {
        let err = Error::KeyNotFound("jobs:1".to_string());
        assert!(err.to_string().contains("jobs:1"));
    }

    #[test]
    fn test_error_display_unsupported() {
        let err = Error::Unsupported {
            backend: "memory",
            operation: "pipeline",
        };
        let msg = err.to_string();
        assert!(msg.contains("pipeline"));
        assert!(msg.contains("memory"));
    }

    #[test]
    fn test_error_display_remote() {
        let err = Error::Remote("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_from_path() {
        let err: Error = PathError::Malformed("a[".to_string()).into();
        assert!(matches!(err, Error::Path(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn ok() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok().unwrap(), 42);
    }
}
