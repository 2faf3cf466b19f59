//! Handler trait for messages delivered by the background receive task.

use crate::error::WebSocketError;
use crate::message::CloseInfo;
use async_trait::async_trait;

/// Trait for handling delivered WebSocket events.
///
/// Only `on_message` is required. The other callbacks fire at most once,
/// right before the delivery task stops.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Called for every decoded text message.
    ///
    /// # Arguments
    /// * `message` - The message text
    async fn on_message(&self, message: String);

    /// Called when the peer sends a close frame.
    ///
    /// # Arguments
    /// * `info` - The recorded close status
    async fn on_close(&self, info: &CloseInfo) {
        let _ = info;
    }

    /// Called when the stream ends without a close frame.
    async fn on_end_of_stream(&self) {}

    /// Called when decoding fails.
    ///
    /// # Arguments
    /// * `error` - The error that stopped the delivery task
    async fn on_error(&self, error: &WebSocketError) {
        tracing::error!(error = %error, "WebSocket receive failed");
    }
}

/// Adapts a plain closure into a [`MessageHandler`].
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(String) + Send + Sync + 'static,
{
    async fn on_message(&self, message: String) {
        (self.0)(message);
    }
}

/// Wrap a closure as a message handler.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(String) + Send + Sync + 'static,
{
    FnHandler(f)
}

/// A handler that only logs what it receives.
#[derive(Debug, Default, Clone)]
pub struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn on_message(&self, message: String) {
        tracing::debug!(payload_len = message.len(), "Received message");
    }

    async fn on_close(&self, info: &CloseInfo) {
        tracing::info!(code = info.code, origin = ?info.origin, "Connection closed");
    }

    async fn on_end_of_stream(&self) {
        tracing::info!("Connection ended without a close frame");
    }
}
