// netws - A minimal WebSocket client for Rust
//
// This library performs the opening handshake over a plain socket and then
// exchanges RFC 6455 frames with the peer.

// Re-export the client
pub use netws_client::*;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        CLOSE_NORMAL,
        CloseInfo,
        CloseOrigin,
        ClientConfig,
        Connection,
        DeliveryEvent,
        Incoming,
        KeyScheme,
        MessageHandler,
        WebSocket,
        WebSocketClientBuilder,
        WebSocketError,
        WebSocketResult,
        connect,
        connect_with_handler,
        handler_fn,
    };
}
