//! Receive outcomes and close bookkeeping.

use crate::error::WebSocketError;

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// No status code was present in the close frame.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Which side asked for the connection to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOrigin {
    /// Closed by this client
    Local,
    /// The peer sent a close frame
    Peer,
}

/// Close status recorded on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close status code
    pub code: u16,
    /// Close reason
    pub reason: String,
    /// Initiator
    pub origin: CloseOrigin,
}

impl CloseInfo {
    /// Create a new close record.
    pub fn new<S: Into<String>>(code: u16, reason: S, origin: CloseOrigin) -> Self {
        Self {
            code,
            reason: reason.into(),
            origin,
        }
    }

    /// Check if the peer initiated the close.
    pub fn is_peer_initiated(&self) -> bool {
        self.origin == CloseOrigin::Peer
    }
}

/// Outcome of one decode cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A complete text message
    Text(String),
    /// A control frame that is silently skipped (pong)
    Ignored,
    /// The peer sent a close frame
    Closed(CloseInfo),
    /// The stream ended, possibly mid-frame
    EndOfStream,
}

impl Incoming {
    /// Get the text payload, if any.
    pub fn into_text(self) -> Option<String> {
        match self {
            Incoming::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Check if no further frames can follow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Incoming::Closed(_) | Incoming::EndOfStream)
    }
}

/// Event pushed by the background delivery task.
#[derive(Debug)]
pub enum DeliveryEvent {
    /// A decoded text message
    Message(String),
    /// The peer closed the connection
    Closed(CloseInfo),
    /// The stream ended without a close frame
    EndOfStream,
    /// Decoding failed; the task stops after this event
    Error(WebSocketError),
}

impl DeliveryEvent {
    /// Get the message text, if this is a message event.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            DeliveryEvent::Message(text) => Some(text),
            _ => None,
        }
    }

    /// Check if this is the last event the task will send.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryEvent::Message(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_info() {
        let info = CloseInfo::new(CLOSE_NO_STATUS, "", CloseOrigin::Peer);
        assert!(info.is_peer_initiated());
        assert_eq!(info.code, 1005);

        let info = CloseInfo::new(CLOSE_NORMAL, "bye", CloseOrigin::Local);
        assert!(!info.is_peer_initiated());
        assert_eq!(info.reason, "bye");
    }

    #[test]
    fn test_incoming() {
        assert_eq!(
            Incoming::Text("hi".into()).into_text(),
            Some("hi".to_string())
        );
        assert_eq!(Incoming::Ignored.into_text(), None);
        assert!(Incoming::EndOfStream.is_terminal());
        assert!(!Incoming::Ignored.is_terminal());
    }

    #[test]
    fn test_delivery_event() {
        let event = DeliveryEvent::Message("hello".into());
        assert_eq!(event.as_text(), Some("hello"));
        assert!(!event.is_terminal());
        assert!(DeliveryEvent::EndOfStream.is_terminal());
        assert!(DeliveryEvent::Error(WebSocketError::UnknownOpcode(5)).is_terminal());
    }
}
