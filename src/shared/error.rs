//! Shared Error Types
//!
//! This module defines error types that are shared across the concurrency
//! core: the transform engine, the lock manager, and the change tracker.
//!
//! # Error Categories
//!
//! - `ValidationError` - Malformed requests (unknown kind, empty object list)
//! - `SerializationError` - JSON serialization/deserialization failures
//! - `DocumentError` - Failures reported by the document-mutation collaborator
//! - `Internal` - Invariant violations inside a manager
//!
//! # Propagation
//!
//! Validation errors are synchronous rejections and never mutate state.
//! Lock conflicts and timeouts are *not* errors: they are ordinary retryable
//! outcomes carried inside [`LockResult`](crate::locks::LockResult).
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be safely shared across task
//! boundaries.
use thiserror::Error;

/// Error type used throughout the concurrency core
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollabError {
    /// Malformed request, rejected before any state was touched
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Failure reported by the document-mutation collaborator
    #[error("Document error for object '{object_id}': {message}")]
    DocumentError {
        /// The object the mutation targeted
        object_id: String,
        /// Human-readable error message
        message: String,
    },

    /// Internal invariant violation
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message
        message: String,
    },
}

impl CollabError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new document error
    pub fn document(object_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DocumentError {
            object_id: object_id.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CollabError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = CollabError::validation("object_ids", "object list cannot be empty");
        match error {
            CollabError::ValidationError { field, message } => {
                assert_eq!(field, "object_ids");
                assert_eq!(message, "object list cannot be empty");
            }
            _ => panic!("Expected ValidationError"),
        }
    }

    #[test]
    fn test_error_display() {
        let error = CollabError::document("boxA", "object not found");
        let display = format!("{}", error);
        assert!(display.contains("boxA"));
        assert!(display.contains("object not found"));
    }

    #[test]
    fn test_from_serde_error() {
        let invalid_json = "{ invalid json }";
        let result: Result<serde_json::Value, _> = serde_json::from_str(invalid_json);
        let shared_error: CollabError = result.unwrap_err().into();

        match shared_error {
            CollabError::SerializationError { .. } => {}
            _ => panic!("Expected SerializationError from serde error"),
        }
    }
}
