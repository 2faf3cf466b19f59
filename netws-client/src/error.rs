//! Error types for WebSocket operations.

use thiserror::Error;

/// WebSocket error type.
#[derive(Error, Debug)]
pub enum WebSocketError {
    /// The server rejected or botched the opening handshake
    #[error("Handshake error: {message}")]
    Handshake {
        /// What went wrong
        message: String,
        /// Raw HTTP response head, for diagnostics
        response: String,
    },

    /// `send` or `receive` was called before the handshake completed
    #[error("call WebSocket handshake first")]
    HandshakeRequired,

    /// Protocol violation by the peer
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A frame type this client does not handle
    #[error("received {0}, which is not supported")]
    Unsupported(String),

    /// Opcode outside the set this client dispatches on
    #[error("received unknown opcode: {0}")]
    UnknownOpcode(u8),

    /// Text frame payload was not UTF-8
    #[error("received text frame with invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// The read half has been handed to a background delivery task
    #[error("Receiver is owned by the delivery task")]
    ReaderDetached,

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,
}

impl WebSocketError {
    /// Raw HTTP response carried by a handshake error.
    pub fn response(&self) -> Option<&str> {
        match self {
            WebSocketError::Handshake { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Whether the error leaves the byte stream unusable.
    ///
    /// Unsupported and unknown opcodes consume their whole frame, so the
    /// stream stays in sync and a caller may keep receiving.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, WebSocketError::Protocol(_) | WebSocketError::Io(_))
    }
}

/// Result type for WebSocket operations.
pub type WebSocketResult<T> = Result<T, WebSocketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_error_carries_response() {
        let err = WebSocketError::Handshake {
            message: "Sec-WebSocket-Accept mismatch".to_string(),
            response: "HTTP/1.1 400 Bad Request\r\n\r\n".to_string(),
        };
        assert_eq!(err.response(), Some("HTTP/1.1 400 Bad Request\r\n\r\n"));
        assert!(WebSocketError::Timeout.response().is_none());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            WebSocketError::UnknownOpcode(5).to_string(),
            "received unknown opcode: 5"
        );
        assert_eq!(
            WebSocketError::HandshakeRequired.to_string(),
            "call WebSocket handshake first"
        );
        assert_eq!(
            WebSocketError::Unsupported("ping".into()).to_string(),
            "received ping, which is not supported"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(WebSocketError::Protocol("received unmasked data".into()).is_connection_fatal());
        assert!(!WebSocketError::UnknownOpcode(3).is_connection_fatal());
        assert!(!WebSocketError::Unsupported("binary data".into()).is_connection_fatal());
    }
}
