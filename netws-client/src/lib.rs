//! # netws client
//!
//! A minimal WebSocket client: the opening handshake over a plain stream,
//! the RFC 6455 frame codec, and a receive loop that turns the byte stream
//! into text messages.
//!
//! ## Features
//!
//! - HTTP/1.1 upgrade handshake with `Sec-WebSocket-Accept` verification
//! - RFC 6455 and legacy handshake key schemes
//! - Frame encoding/decoding with masking and 7/16/64-bit length fields
//! - Pull-based `receive()` or a background delivery task feeding a channel
//!   or a [`MessageHandler`]
//! - Raw wire dumps on the `netws::wire` tracing target
//!
//! Not supported: fragmented messages, binary payloads, ping replies,
//! extensions, reconnects.
//!
//! ## Example
//!
//! ```rust,no_run
//! use netws_client::{CLOSE_NORMAL, CloseOrigin, handler_fn};
//!
//! # async fn run() -> netws_client::WebSocketResult<()> {
//! let mut ws = netws_client::connect_with_handler(
//!     "ws://localhost:9001/",
//!     handler_fn(|message| println!("{message}")),
//! )
//! .await?;
//!
//! ws.send("hello").await?;
//! ws.close(CLOSE_NORMAL, "", CloseOrigin::Local).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod client;
mod config;
mod connection;
mod error;
mod frame;
mod handler;
mod handshake;
mod key;
mod message;

pub use client::{WebSocket, WebSocketClientBuilder, connect, connect_with_handler};
pub use config::{ClientConfig, KeyScheme};
pub use connection::{Connection, ConnectionState, Role, Termination};
pub use error::{WebSocketError, WebSocketResult};
pub use frame::{
    Frame, FrameReader, FrameWriter, MAX_PAYLOAD_LEN, OpCode, WIRE_TARGET, apply_mask,
    encode_frame, encode_frame_with_key, generate_mask_key,
};
pub use handler::{FnHandler, LoggingHandler, MessageHandler, handler_fn};
pub use handshake::{
    HandshakeRequest, HandshakeResponse, Target, WS_MAGIC_STRING, WS_VERSION, security_digest,
};
pub use key::{generate_key, generate_legacy_key, generate_rfc6455_key};
pub use message::{CLOSE_NO_STATUS, CLOSE_NORMAL, CloseInfo, CloseOrigin, DeliveryEvent, Incoming};
