//! Error types for the netws CLI.

use netws_client::WebSocketError;
use std::fmt;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types.
#[derive(Debug)]
pub enum CliError {
    /// IO error (stdin)
    Io(std::io::Error),

    /// WebSocket connect, handshake or send failure
    WebSocket(WebSocketError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::WebSocket(WebSocketError::Handshake { message, response }) => {
                write!(f, "Handshake failed: {}\n{}", message, response.trim_end())
            }
            CliError::WebSocket(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<WebSocketError> for CliError {
    fn from(e: WebSocketError) -> Self {
        CliError::WebSocket(e)
    }
}
