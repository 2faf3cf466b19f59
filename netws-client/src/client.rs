//! WebSocket client entry points.

use crate::config::{ClientConfig, KeyScheme};
use crate::connection::{Connection, Role};
use crate::error::{WebSocketError, WebSocketResult};
use crate::handler::MessageHandler;
use crate::handshake::Target;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// A client session over plain TCP.
pub type WebSocket = Connection<TcpStream>;

/// Builder for WebSocket client connections.
#[derive(Debug, Clone, Default)]
pub struct WebSocketClientBuilder {
    url: Option<String>,
    config: ClientConfig,
}

impl WebSocketClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the WebSocket URL.
    pub fn url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Dump raw wire bytes to the log.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.config.debug = enabled;
        self
    }

    /// Mask outbound frames.
    pub fn mask_outbound(mut self, enabled: bool) -> Self {
        self.config.mask_outbound = enabled;
        self
    }

    /// Set the handshake key scheme.
    pub fn key_scheme(mut self, scheme: KeyScheme) -> Self {
        self.config.key_scheme = scheme;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Override the `Origin` header.
    pub fn origin<S: Into<String>>(mut self, origin: S) -> Self {
        self.config.origin = Some(origin.into());
        self
    }

    /// Set the capacity of the delivery channel.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Connect over TCP and perform the handshake.
    pub async fn connect(self) -> WebSocketResult<WebSocket> {
        let target = self.target()?;
        if target.secure {
            return Err(WebSocketError::InvalidUrl(
                "wss:// needs a TLS stream; use connect_stream".to_string(),
            ));
        }

        let config = self.config;
        let timeout = config.connect_timeout;
        let connect = async move {
            let stream = TcpStream::connect((target.connect_host(), target.port))
                .await
                .map_err(|e| {
                    WebSocketError::Connection(format!("{}:{}: {}", target.host, target.port, e))
                })?;
            stream.set_nodelay(true)?;

            let mut connection = Connection::new(stream, Role::Client, config);
            connection.handshake(&target).await?;
            Ok::<_, WebSocketError>(connection)
        };

        tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| WebSocketError::Timeout)?
    }

    /// Connect and hand every delivered message to `handler`.
    pub async fn connect_with_handler<H: MessageHandler>(self, handler: H) -> WebSocketResult<WebSocket> {
        let mut connection = self.connect().await?;
        connection.spawn_handler(handler)?;
        Ok(connection)
    }

    /// Perform the handshake over a stream the caller already connected,
    /// e.g. a TLS stream for `wss://`.
    pub async fn connect_stream<S>(self, stream: S) -> WebSocketResult<Connection<S>>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let target = self.target()?;
        let mut connection = Connection::new(stream, Role::Client, self.config);
        connection.handshake(&target).await?;
        Ok(connection)
    }

    fn target(&self) -> WebSocketResult<Target> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| WebSocketError::InvalidUrl("URL not provided".to_string()))?;
        Target::parse(url)
    }
}

/// Connect to a WebSocket server with the default configuration.
pub async fn connect(url: &str) -> WebSocketResult<WebSocket> {
    WebSocketClientBuilder::new().url(url).connect().await
}

/// Connect and deliver every message to `handler` from a background task.
pub async fn connect_with_handler<H: MessageHandler>(url: &str, handler: H) -> WebSocketResult<WebSocket> {
    WebSocketClientBuilder::new()
        .url(url)
        .connect_with_handler(handler)
        .await
}
