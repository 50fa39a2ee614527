//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] endpointd_protocol::ProtocolError),

    #[error("request timeout")]
    Timeout,

    #[error("server closed the connection without a response")]
    NoResponse,

    #[error("endpoint not found: {0}")]
    NotFound(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),
}

impl ClientError {
    /// Returns whether this error is retryable.
    ///
    /// `NoResponse` is not retryable: the server closes silently on storage
    /// failures, and a New request may already have been applied.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_) | ClientError::Timeout | ClientError::TlsHandshake(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::Io(std::io::ErrorKind::ConnectionRefused.into()).is_retryable());
        assert!(!ClientError::NoResponse.is_retryable());
        assert!(!ClientError::NotFound("x".into()).is_retryable());
        assert!(!ClientError::TlsConfig("bad".into()).is_retryable());
    }
}
