//! Client configuration.

use std::env;
use std::time::Duration;

/// How the `Sec-WebSocket-Key` handshake value is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyScheme {
    /// 16 random bytes, base64 encoded (RFC 6455 section 4.1)
    #[default]
    Rfc6455,
    /// Numeric token obfuscated with spaces and noise characters, base64 encoded
    Legacy,
}

/// Settings shared by the handshake, the frame codec and the session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Emit every raw read and write on the `netws::wire` tracing target
    pub debug: bool,
    /// Mask frames sent from the client role
    pub mask_outbound: bool,
    /// Handshake key scheme
    pub key_scheme: KeyScheme,
    /// Upper bound for TCP connect plus handshake
    pub connect_timeout: Duration,
    /// Origin header override (defaults to `http://<host>`)
    pub origin: Option<String>,
    /// Capacity of the delivery channel fed by the background receive task
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            debug: false,
            mask_outbound: true,
            key_scheme: KeyScheme::default(),
            connect_timeout: Duration::from_secs(30),
            origin: None,
            channel_capacity: 64,
        }
    }
}

impl ClientConfig {
    /// Create config from environment variables.
    ///
    /// `NETWS_DEBUG=1|true` enables wire dumps. Everything else keeps its default.
    pub fn from_env() -> Self {
        let debug = env::var("NETWS_DEBUG")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        Self {
            debug,
            ..Self::default()
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
