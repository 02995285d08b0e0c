//! Error types for the annotation adapter.

use annopage_protocol::{DocumentId, ProtocolError};
use std::time::Duration;
use thiserror::Error;

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors that can occur while talking to the store or editing the page.
#[derive(Error, Debug, Clone)]
pub enum AdapterError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A remote call did not complete in time.
    #[error("store {operation} timed out after {after:?}")]
    TransportTimeout {
        /// The primitive that timed out.
        operation: &'static str,
        /// The configured bound.
        after: Duration,
    },

    /// The store answered with a non-2xx status.
    #[error("store returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The store's response could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A document lacks a store-assigned id where one is required.
    #[error("{0} has no store-assigned id")]
    NotPersisted(&'static str),

    /// Update or delete was requested without an id.
    #[error("annotation identifier missing")]
    MissingIdentifier,

    /// No item of the cached page carries the id.
    #[error("no annotation {0} on the page")]
    ItemNotFound(DocumentId),

    /// The caller passed something that is not an annotation.
    #[error("invalid annotation: {0}")]
    InvalidDocument(String),

    /// The page cache was asked for a transition it cannot make.
    #[error("invalid cache transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl AdapterError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdapterError::Transport { retryable, .. } => *retryable,
            AdapterError::TransportTimeout { .. } => true,
            AdapterError::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if the store failed, as opposed to there being nothing to do.
    ///
    /// Hosts use this to decide between a retry affordance and silence.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            AdapterError::Transport { .. }
                | AdapterError::TransportTimeout { .. }
                | AdapterError::Status { .. }
                | AdapterError::Protocol(_)
                | AdapterError::NotPersisted(_)
        )
    }
}

impl From<ProtocolError> for AdapterError {
    fn from(err: ProtocolError) -> Self {
        AdapterError::Protocol(err.to_string())
    }
}
