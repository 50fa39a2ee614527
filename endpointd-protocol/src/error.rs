//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while reading or writing frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("incomplete frame: stream closed with {needed} bytes missing")]
    IncompleteFrame { needed: usize },

    #[error("invalid message: {0}")]
    InvalidMessage(#[from] flatbuffers::InvalidFlatbuffer),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether the peer closed the stream in the middle of a frame.
    pub fn is_truncated(&self) -> bool {
        matches!(self, ProtocolError::IncompleteFrame { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::FrameTooLarge { size: 100, max: 50 };
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));

        let err = ProtocolError::IncompleteFrame { needed: 10 };
        assert!(err.to_string().contains("10"));
        assert!(err.is_truncated());

        let err = ProtocolError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe",
        ));
        assert!(err.to_string().contains("I/O"));
        assert!(!err.is_truncated());
    }
}
