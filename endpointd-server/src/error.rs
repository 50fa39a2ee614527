//! Server error types.

use thiserror::Error;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] endpointd_protocol::ProtocolError),

    #[error("storage error: {0}")]
    Store(#[from] endpointd_store::StoreError),

    #[error("connection closed before a request was received")]
    ConnectionClosed,

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),
}

impl ServerError {
    /// Returns whether the error came from the storage backend rather than
    /// the client connection.
    pub fn is_backend(&self) -> bool {
        matches!(self, ServerError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use endpointd_protocol::ProtocolError;
    use endpointd_store::StoreError;

    #[test]
    fn test_error_classification() {
        assert!(ServerError::from(StoreError::Closed).is_backend());
        assert!(!ServerError::ConnectionClosed.is_backend());
        assert!(!ServerError::from(ProtocolError::IncompleteFrame { needed: 2 }).is_backend());
    }

    #[test]
    fn test_error_display() {
        let err = ServerError::from(ProtocolError::FrameTooLarge { size: 9, max: 4 });
        assert!(err.to_string().starts_with("protocol error"));

        let err = ServerError::TlsHandshake("bad certificate".into());
        assert!(err.to_string().contains("bad certificate"));
    }
}
