//! Error types for the reference store.

use annopage_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the reference store.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No route for the path.
    #[error("no route for {0}")]
    UnknownRoute(String),

    /// The route exists but not for this verb.
    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed {
        /// Request verb.
        method: String,
        /// Request path.
        path: String,
    },

    /// No live document has the id.
    #[error("document not found: {0}")]
    NotFound(String),

    /// The id names a version that has been superseded.
    #[error("{0} is not the current version")]
    Superseded(String),

    /// Request body over the configured limit.
    #[error("request body of {size} bytes exceeds {limit}")]
    PayloadTooLarge {
        /// Body size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// The HTTP status reported for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::UnknownRoute(_) | ServerError::NotFound(_) => 404,
            ServerError::MethodNotAllowed { .. } => 405,
            ServerError::Superseded(_) => 409,
            ServerError::PayloadTooLarge { .. } => 413,
            ServerError::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::InvalidRequest(err.to_string())
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        ServerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
        assert_eq!(ServerError::Superseded("a".into()).status_code(), 409);
        assert_eq!(
            ServerError::MethodNotAllowed {
                method: "GET".into(),
                path: "/create".into()
            }
            .status_code(),
            405
        );
    }

    #[test]
    fn error_display() {
        let err = ServerError::PayloadTooLarge {
            size: 10,
            limit: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("5"));
    }
}
