//! Opening handshake: HTTP/1.1 upgrade request and accept verification.

use crate::error::{WebSocketError, WebSocketResult};
use crate::frame::WIRE_TARGET;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::header::SEC_WEBSOCKET_ACCEPT;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use url::Url;

/// GUID appended to the client key before hashing.
pub const WS_MAGIC_STRING: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Protocol version sent in `Sec-WebSocket-Version`.
pub const WS_VERSION: &str = "13";

const MAX_RESPONSE_HEAD: usize = 16 * 1024;
const MAX_RESPONSE_HEADERS: usize = 64;

/// Compute the `Sec-WebSocket-Accept` value the server must answer with.
///
/// ```
/// use netws_client::security_digest;
///
/// assert_eq!(
///     security_digest("dGhlIHNhbXBsZSBub25jZQ=="),
///     "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
/// );
/// ```
pub fn security_digest(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_MAGIC_STRING.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Where the handshake is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Host name or IP literal (IPv6 literals keep their brackets)
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Request path including any query string, never empty
    pub path: String,
    /// `wss://` scheme
    pub secure: bool,
}

impl Target {
    /// Parse a `ws://` or `wss://` URL.
    pub fn parse(input: &str) -> WebSocketResult<Self> {
        let url = Url::parse(input).map_err(|e| WebSocketError::InvalidUrl(e.to_string()))?;
        Self::from_url(&url)
    }

    /// Build a target from an already parsed URL.
    pub fn from_url(url: &Url) -> WebSocketResult<Self> {
        let secure = match url.scheme() {
            "ws" => false,
            "wss" => true,
            other => {
                return Err(WebSocketError::InvalidUrl(format!(
                    "unsupported scheme: {other}"
                )));
            }
        };

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| WebSocketError::InvalidUrl("missing host".to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 });

        let mut path = match url.path() {
            "" => "/".to_string(),
            path => path.to_string(),
        };
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            host,
            port,
            path,
            secure,
        })
    }

    /// Host name suitable for a socket connect (IPv6 brackets stripped).
    pub fn connect_host(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    /// Value of the `Host` header.
    pub fn host_header(&self) -> String {
        let default_port = if self.secure { 443 } else { 80 };
        if self.port == default_port {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Default `Origin` header value.
    pub fn origin(&self) -> String {
        format!("http://{}", self.host)
    }
}

/// The HTTP upgrade request.
#[derive(Debug, Clone)]
pub struct HandshakeRequest {
    path: String,
    host: String,
    key: String,
    origin: String,
}

impl HandshakeRequest {
    /// Create a request for `target` carrying `key`.
    pub fn new(target: &Target, key: &str, origin: &str) -> Self {
        Self {
            path: target.path.clone(),
            host: target.host_header(),
            key: key.to_string(),
            origin: origin.to_string(),
        }
    }

    /// The `Sec-WebSocket-Key` value.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serialize the request head.
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "GET {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {}\r\n\
             Sec-WebSocket-Version: {}\r\n\
             Origin: {}\r\n\
             \r\n",
            self.path, self.host, self.key, WS_VERSION, self.origin
        )
        .into_bytes()
    }
}

/// Parsed server reply to the upgrade request.
#[derive(Debug, Clone)]
pub struct HandshakeResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw response head as received
    pub raw: String,
}

impl HandshakeResponse {
    /// Parse a complete response head.
    pub fn parse(head: &[u8]) -> WebSocketResult<Self> {
        let raw = String::from_utf8_lossy(head).into_owned();
        let mut headers = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
        let mut response = httparse::Response::new(&mut headers);

        match response.parse(head) {
            Ok(httparse::Status::Complete(_)) => {}
            Ok(httparse::Status::Partial) => {
                return Err(handshake_error("incomplete HTTP response", raw));
            }
            Err(e) => {
                return Err(handshake_error(format!("malformed HTTP response: {e}"), raw));
            }
        }

        let Some(status) = response.code.and_then(|code| StatusCode::from_u16(code).ok()) else {
            return Err(handshake_error("invalid status code", raw));
        };

        let mut map = HeaderMap::with_capacity(response.headers.len());
        for header in response.headers.iter() {
            let name = HeaderName::from_bytes(header.name.as_bytes());
            let value = HeaderValue::from_bytes(header.value);
            match (name, value) {
                (Ok(name), Ok(value)) => {
                    map.append(name, value);
                }
                _ => return Err(handshake_error(format!("invalid header: {}", header.name), raw)),
            }
        }

        Ok(Self {
            status,
            headers: map,
            raw,
        })
    }

    /// Check `Sec-WebSocket-Accept` against the digest of `key`.
    ///
    /// Only the accept value is checked; a missing header is a mismatch.
    pub fn verify(&self, key: &str) -> WebSocketResult<()> {
        let expected = security_digest(key);
        match self.headers.get(SEC_WEBSOCKET_ACCEPT) {
            Some(accept) if accept.as_bytes() == expected.as_bytes() => Ok(()),
            _ => Err(handshake_error(
                "Sec-WebSocket-Accept mismatch",
                self.raw.clone(),
            )),
        }
    }
}

/// Read a response head up to and including the blank line.
///
/// Anything the peer sent after the head stays buffered in `reader`.
pub(crate) async fn read_response_head<R>(reader: &mut R, debug: bool) -> WebSocketResult<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = Vec::with_capacity(512);
    loop {
        let start = head.len();
        // A line may not grow the head past the cap, newline or not.
        let remaining = (MAX_RESPONSE_HEAD + 1).saturating_sub(start) as u64;
        let n = (&mut *reader)
            .take(remaining)
            .read_until(b'\n', &mut head)
            .await?;
        if n == 0 {
            return Err(handshake_error(
                "connection closed during handshake",
                String::from_utf8_lossy(&head).into_owned(),
            ));
        }
        if debug {
            tracing::debug!(target: WIRE_TARGET, "recv> {}", head[start..].escape_ascii());
        }
        if head.ends_with(b"\r\n\r\n") || head.ends_with(b"\n\n") {
            return Ok(head);
        }
        if head.len() > MAX_RESPONSE_HEAD {
            return Err(handshake_error(
                "handshake response too large",
                String::from_utf8_lossy(&head).into_owned(),
            ));
        }
    }
}

fn handshake_error<S: Into<String>>(message: S, response: String) -> WebSocketError {
    WebSocketError::Handshake {
        message: message.into(),
        response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, BufReader};

    const SAMPLE_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
    const SAMPLE_ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";

    fn response_with_accept(accept: &str) -> String {
        format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {accept}\r\n\r\n"
        )
    }

    #[test]
    fn test_security_digest() {
        assert_eq!(security_digest(SAMPLE_KEY), SAMPLE_ACCEPT);
        assert!(!security_digest(SAMPLE_KEY).contains('\n'));
    }

    #[test]
    fn test_target_parse() {
        let target = Target::parse("ws://example.com:9001/chat").unwrap();
        assert_eq!(target.host, "example.com");
        assert_eq!(target.port, 9001);
        assert_eq!(target.path, "/chat");
        assert!(!target.secure);
        assert_eq!(target.host_header(), "example.com:9001");
        assert_eq!(target.origin(), "http://example.com");
    }

    #[test]
    fn test_target_defaults() {
        let target = Target::parse("ws://example.com").unwrap();
        assert_eq!(target.port, 80);
        assert_eq!(target.path, "/");
        assert_eq!(target.host_header(), "example.com");

        let target = Target::parse("wss://example.com/feed?since=10").unwrap();
        assert_eq!(target.port, 443);
        assert_eq!(target.path, "/feed?since=10");
        assert!(target.secure);
    }

    #[test]
    fn test_target_ipv6() {
        let target = Target::parse("ws://[::1]:8080/").unwrap();
        assert_eq!(target.host, "[::1]");
        assert_eq!(target.connect_host(), "::1");
        assert_eq!(target.host_header(), "[::1]:8080");
    }

    #[test]
    fn test_target_rejects_other_schemes() {
        assert!(matches!(
            Target::parse("http://example.com/"),
            Err(WebSocketError::InvalidUrl(_))
        ));
        assert!(matches!(
            Target::parse("not a url"),
            Err(WebSocketError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_request_headers() {
        let target = Target::parse("ws://example.com:9001/chat").unwrap();
        let request = HandshakeRequest::new(&target, SAMPLE_KEY, &target.origin());
        let text = String::from_utf8(request.to_bytes()).unwrap();

        assert!(text.starts_with("GET /chat HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.com:9001\r\n"));
        assert!(text.contains("Upgrade: websocket\r\n"));
        assert!(text.contains("Connection: Upgrade\r\n"));
        assert!(text.contains(&format!("Sec-WebSocket-Key: {SAMPLE_KEY}\r\n")));
        assert!(text.contains("Sec-WebSocket-Version: 13\r\n"));
        assert!(text.contains("Origin: http://example.com\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
        assert_eq!(request.key(), SAMPLE_KEY);
    }

    #[test]
    fn test_verify_accepts_matching_digest() {
        let response = HandshakeResponse::parse(response_with_accept(SAMPLE_ACCEPT).as_bytes()).unwrap();
        assert_eq!(response.status, StatusCode::SWITCHING_PROTOCOLS);
        assert!(response.verify(SAMPLE_KEY).is_ok());
    }

    #[test]
    fn test_verify_header_name_is_case_insensitive() {
        let raw = format!("HTTP/1.1 101 Switching Protocols\r\nsec-websocket-accept: {SAMPLE_ACCEPT}\r\n\r\n");
        let response = HandshakeResponse::parse(raw.as_bytes()).unwrap();
        assert!(response.verify(SAMPLE_KEY).is_ok());
    }

    #[test]
    fn test_verify_rejects_mismatch() {
        let raw = response_with_accept("bm90IHRoZSByaWdodCBkaWdlc3Q=");
        let response = HandshakeResponse::parse(raw.as_bytes()).unwrap();
        let err = response.verify(SAMPLE_KEY).unwrap_err();
        assert!(matches!(err, WebSocketError::Handshake { .. }));
        assert_eq!(err.response(), Some(raw.as_str()));
    }

    #[test]
    fn test_verify_rejects_missing_header() {
        let raw = "HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n";
        let response = HandshakeResponse::parse(raw.as_bytes()).unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        let err = response.verify(SAMPLE_KEY).unwrap_err();
        assert_eq!(err.response(), Some(raw));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = HandshakeResponse::parse(b"SSH-2.0-OpenSSH\r\n\r\n").unwrap_err();
        assert!(matches!(err, WebSocketError::Handshake { .. }));
    }

    #[tokio::test]
    async fn test_read_head_leaves_trailing_bytes_buffered() {
        let mut wire = response_with_accept(SAMPLE_ACCEPT).into_bytes();
        wire.extend_from_slice(&[0x81, 0x02, b'h', b'i']);

        let mut reader = BufReader::new(&wire[..]);
        let head = read_response_head(&mut reader, true).await.unwrap();
        assert!(head.ends_with(b"\r\n\r\n"));

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, [0x81, 0x02, b'h', b'i']);
    }

    #[tokio::test]
    async fn test_read_head_caps_line_without_newline() {
        let mut wire = b"HTTP/1.1 101 ".to_vec();
        wire.extend(std::iter::repeat_n(b'a', 1_000_000));

        let mut reader = BufReader::new(&wire[..]);
        let err = read_response_head(&mut reader, false).await.unwrap_err();
        assert!(err.to_string().contains("handshake response too large"));
        assert_eq!(err.response().unwrap().len(), MAX_RESPONSE_HEAD + 1);

        // Nothing past the cap was consumed.
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest.len(), wire.len() - MAX_RESPONSE_HEAD - 1);
    }

    #[tokio::test]
    async fn test_read_head_across_partial_reads() {
        let mut mock = tokio_test::io::Builder::new()
            .read(b"HTTP/1.1 101 Switching Protocols\r\nSec-WebSocket-")
            .read(b"Accept: ")
            .read(format!("{SAMPLE_ACCEPT}\r\n").as_bytes())
            .read(b"\r\n")
            .build();

        let mut reader = BufReader::new(&mut mock);
        let head = read_response_head(&mut reader, true).await.unwrap();
        let response = HandshakeResponse::parse(&head).unwrap();
        assert_eq!(response.status, StatusCode::SWITCHING_PROTOCOLS);
        response.verify(SAMPLE_KEY).unwrap();
    }

    #[tokio::test]
    async fn test_read_head_eof() {
        let mut reader = BufReader::new(&b"HTTP/1.1 101 Switching"[..]);
        let err = read_response_head(&mut reader, false).await.unwrap_err();
        assert_eq!(err.response(), Some("HTTP/1.1 101 Switching"));
    }
}
