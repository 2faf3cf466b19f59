//! WebSocket frame codec.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```

use crate::connection::Role;
use crate::error::{WebSocketError, WebSocketResult};
use crate::message::{CLOSE_NO_STATUS, CloseInfo, CloseOrigin, Incoming};
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Tracing target for raw wire dumps.
pub const WIRE_TARGET: &str = "netws::wire";

const FIN_BIT: u8 = 0x80;
const MASK_BIT: u8 = 0x80;
const OPCODE_BITS: u8 = 0x0f;
const LENGTH_BITS: u8 = 0x7f;
const LENGTH_16: u8 = 126;
const LENGTH_64: u8 = 127;
const MAX_SHORT_LENGTH: u64 = 125;

/// Largest payload length a frame header may declare (2^63 - 1).
pub const MAX_PAYLOAD_LEN: u64 = i64::MAX as u64;

/// Frame opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// Continuation of a fragmented message
    Continuation,
    /// Text data
    Text,
    /// Binary data
    Binary,
    /// Connection close
    Close,
    /// Ping
    Ping,
    /// Pong
    Pong,
    /// Any value without a defined meaning
    Reserved(u8),
}

impl From<u8> for OpCode {
    fn from(value: u8) -> Self {
        match value & OPCODE_BITS {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xa => OpCode::Pong,
            other => OpCode::Reserved(other),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(opcode: OpCode) -> Self {
        match opcode {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xa,
            OpCode::Reserved(value) => value & OPCODE_BITS,
        }
    }
}

/// A decoded frame. Constructed, consumed and dropped per read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag (parsed, never enforced)
    pub fin: bool,
    /// Frame opcode
    pub opcode: OpCode,
    /// Whether the payload arrived masked
    pub masked: bool,
    /// Masking key, present iff `masked`
    pub mask_key: Option<[u8; 4]>,
    /// Unmasked payload
    pub payload: Bytes,
}

impl Frame {
    /// Payload length in bytes.
    pub fn payload_len(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Dispatch on the opcode.
    ///
    /// Continuation frames are not reassembled and fall through to
    /// [`WebSocketError::UnknownOpcode`] like any other undispatched value.
    pub fn into_incoming(self) -> WebSocketResult<Incoming> {
        match self.opcode {
            OpCode::Text => Ok(Incoming::Text(String::from_utf8(self.payload.to_vec())?)),
            OpCode::Binary => Err(WebSocketError::Unsupported("binary data".to_string())),
            OpCode::Close => Ok(Incoming::Closed(CloseInfo::new(
                CLOSE_NO_STATUS,
                "",
                CloseOrigin::Peer,
            ))),
            OpCode::Ping => Err(WebSocketError::Unsupported("ping".to_string())),
            OpCode::Pong => Ok(Incoming::Ignored),
            other => Err(WebSocketError::UnknownOpcode(u8::from(other))),
        }
    }
}

/// XOR `payload` in place against `key`. Applying it twice restores the input.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Random 4-byte masking key.
pub fn generate_mask_key() -> [u8; 4] {
    rand::rng().random()
}

/// Encode a final frame, masking with a fresh random key when `mask` is set.
pub fn encode_frame(opcode: OpCode, payload: &[u8], mask: bool) -> BytesMut {
    encode_frame_with_key(opcode, payload, mask.then(generate_mask_key))
}

/// Encode a final frame with an explicit masking key.
pub fn encode_frame_with_key(opcode: OpCode, payload: &[u8], mask_key: Option<[u8; 4]>) -> BytesMut {
    let mask_bit = if mask_key.is_some() { MASK_BIT } else { 0 };
    let len = payload.len() as u64;
    let mut buf = BytesMut::with_capacity(payload.len() + 14);

    buf.put_u8(FIN_BIT | u8::from(opcode));
    if len <= MAX_SHORT_LENGTH {
        buf.put_u8(mask_bit | len as u8);
    } else if len < 1 << 16 {
        buf.put_u8(mask_bit | LENGTH_16);
        buf.put_u16(len as u16);
    } else {
        buf.put_u8(mask_bit | LENGTH_64);
        buf.put_u32((len >> 32) as u32);
        buf.put_u32(len as u32);
    }

    match mask_key {
        Some(key) => {
            buf.put_slice(&key);
            let start = buf.len();
            buf.put_slice(payload);
            apply_mask(&mut buf[start..], key);
        }
        None => buf.put_slice(payload),
    }

    buf
}

/// Reads frames off a byte stream.
///
/// A stream that ends anywhere inside a frame yields `None`; a truncated
/// frame is never returned.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    role: Role,
    debug: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a new frame reader.
    pub fn new(inner: R, role: Role, debug: bool) -> Self {
        Self { inner, role, debug }
    }

    /// Get a mutable reference to the underlying reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the frame reader, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read one frame. `Ok(None)` means the stream ended.
    pub async fn read_frame(&mut self) -> WebSocketResult<Option<Frame>> {
        let mut head = [0u8; 2];
        if !self.read_exact_or_eof(&mut head).await? {
            return Ok(None);
        }

        let fin = head[0] & FIN_BIT != 0;
        let opcode = OpCode::from(head[0]);
        let masked = head[1] & MASK_BIT != 0;

        let payload_len = match head[1] & LENGTH_BITS {
            LENGTH_16 => {
                let mut ext = [0u8; 2];
                if !self.read_exact_or_eof(&mut ext).await? {
                    return Ok(None);
                }
                u64::from(u16::from_be_bytes(ext))
            }
            LENGTH_64 => {
                // high * 2^32 + low
                let mut ext = [0u8; 8];
                if !self.read_exact_or_eof(&mut ext).await? {
                    return Ok(None);
                }
                u64::from_be_bytes(ext)
            }
            len => u64::from(len),
        };

        if payload_len > MAX_PAYLOAD_LEN {
            return Err(WebSocketError::Protocol(format!(
                "payload length {payload_len} exceeds 2^63-1"
            )));
        }

        if self.role == Role::Server && !masked {
            tracing::warn!(opcode = ?opcode, "Client sent an unmasked frame");
            return Err(WebSocketError::Protocol("received unmasked data".to_string()));
        }

        let mask_key = if masked {
            let mut key = [0u8; 4];
            if !self.read_exact_or_eof(&mut key).await? {
                return Ok(None);
            }
            Some(key)
        } else {
            None
        };

        let Some(mut payload) = self.read_payload(payload_len).await? else {
            return Ok(None);
        };
        if let Some(key) = mask_key {
            apply_mask(&mut payload, key);
        }

        tracing::trace!(opcode = ?opcode, fin, masked, payload_len, "Decoded frame");

        Ok(Some(Frame {
            fin,
            opcode,
            masked,
            mask_key,
            payload: Bytes::from(payload),
        }))
    }

    /// Run one decode cycle: read a frame and dispatch on its opcode.
    pub async fn next_incoming(&mut self) -> WebSocketResult<Incoming> {
        match self.read_frame().await? {
            Some(frame) => frame.into_incoming(),
            None => Ok(Incoming::EndOfStream),
        }
    }

    async fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> WebSocketResult<bool> {
        match self.inner.read_exact(buf).await {
            Ok(_) => {
                self.dump(buf);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_payload(&mut self, len: u64) -> WebSocketResult<Option<Vec<u8>>> {
        // Grow as bytes arrive instead of trusting the declared length up front.
        let mut payload = Vec::with_capacity(len.min(64 * 1024) as usize);
        (&mut self.inner).take(len).read_to_end(&mut payload).await?;
        if (payload.len() as u64) < len {
            return Ok(None);
        }
        self.dump(&payload);
        Ok(Some(payload))
    }

    fn dump(&self, data: &[u8]) {
        if self.debug {
            tracing::debug!(target: WIRE_TARGET, "recv> {}", data.escape_ascii());
        }
    }
}

/// Writes frames to a byte stream.
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
    debug: bool,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a new frame writer.
    pub fn new(inner: W, debug: bool) -> Self {
        Self { inner, debug }
    }

    /// Get a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Encode and write a single final frame.
    pub async fn write_frame(&mut self, opcode: OpCode, payload: &[u8], mask: bool) -> WebSocketResult<()> {
        let frame = encode_frame(opcode, payload, mask);
        self.write_raw(&frame).await
    }

    /// Write bytes as one unit and flush.
    pub async fn write_raw(&mut self, data: &[u8]) -> WebSocketResult<()> {
        if self.debug {
            for line in data.split_inclusive(|b| *b == b'\n') {
                tracing::debug!(target: WIRE_TARGET, "send> {}", line.escape_ascii());
            }
        }
        self.inner.write_all(data).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the write side of the stream.
    pub async fn shutdown(&mut self) -> WebSocketResult<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
