//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding or encoding store documents.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The document was not a JSON object.
    #[error("expected a JSON object for {0}")]
    NotAnObject(&'static str),

    /// The document declared a different `type`.
    #[error("unexpected document type: expected {expected}, found {found}")]
    UnexpectedType {
        /// Expected type discriminator.
        expected: &'static str,
        /// Type found in the document.
        found: String,
    },

    /// A required field was absent.
    #[error("missing field: {0}")]
    MissingField(String),

    /// A field was present but had the wrong shape.
    #[error("invalid field {field}: {message}")]
    InvalidField {
        /// Field name.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}
