//! Transport seam between the state machine and the network
//!
//! A transport owns at most one live connection. It reports lifecycle
//! events tagged with the attempt that produced them, so the state
//! machine can discard anything from a connection it already abandoned.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

use crate::identity::{UserId, Username};
use crate::protocol::ClientFrame;

/// Sequence number of a connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a transport stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CloseReason {
    /// The server closed the connection
    Remote,
    /// Connecting failed or the connection broke
    Error(String),
    /// We closed it
    Local,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Remote => write!(f, "closed by server"),
            CloseReason::Error(e) => write!(f, "error: {e}"),
            CloseReason::Local => write!(f, "closed locally"),
        }
    }
}

/// Lifecycle event kinds reported by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// The connection is usable; protocol frames may be sent
    Ready,
    /// An inbound text frame, not yet decoded
    Message(String),
    /// The connection ended
    Closed(CloseReason),
}

/// A lifecycle event from a specific connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub attempt: AttemptId,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn ready(attempt: AttemptId) -> Self {
        Self {
            attempt,
            kind: TransportEventKind::Ready,
        }
    }

    pub fn message(attempt: AttemptId, raw: impl Into<String>) -> Self {
        Self {
            attempt,
            kind: TransportEventKind::Message(raw.into()),
        }
    }

    pub fn closed(attempt: AttemptId, reason: CloseReason) -> Self {
        Self {
            attempt,
            kind: TransportEventKind::Closed(reason),
        }
    }
}

/// Parameters of one connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub attempt: AttemptId,
    pub user_id: UserId,
    pub username: Username,
}

/// A bidirectional frame transport
///
/// None of these calls block: `open` completes later through a `Ready`
/// or `Closed` event on the supplied channel.
pub trait Transport: Send {
    /// Start a connection attempt; events are delivered on `events`
    fn open(
        &mut self,
        request: ConnectRequest,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError>;

    /// Queue an outbound frame on the live connection
    fn send(&mut self, frame: &ClientFrame) -> Result<(), TransportError>;

    /// Close the live connection, flushing frames already queued
    fn close(&mut self);
}

/// Errors that can occur with transports
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection already open")]
    AlreadyConnected,

    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed")]
    Closed,

    #[error("Failed to connect: {0}")]
    ConnectFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<TransportError> for String {
    fn from(err: TransportError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::Remote.to_string(), "closed by server");
        assert_eq!(
            CloseReason::Error("refused".to_string()).to_string(),
            "error: refused"
        );
        assert_eq!(CloseReason::Local.to_string(), "closed locally");
    }

    #[test]
    fn test_close_reason_serialization() {
        let json = serde_json::to_string(&CloseReason::Error("boom".to_string())).unwrap();
        assert_eq!(json, r#"{"kind":"error","detail":"boom"}"#);

        let remote = serde_json::to_string(&CloseReason::Remote).unwrap();
        let parsed: CloseReason = serde_json::from_str(&remote).unwrap();
        assert_eq!(parsed, CloseReason::Remote);
    }

    #[test]
    fn test_event_constructors() {
        let attempt = AttemptId(3);
        assert_eq!(TransportEvent::ready(attempt).kind, TransportEventKind::Ready);
        assert_eq!(
            TransportEvent::message(attempt, "{}").kind,
            TransportEventKind::Message("{}".to_string())
        );
        assert_eq!(attempt.to_string(), "#3");
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::NotConnected.to_string(), "Not connected");
        assert_eq!(
            TransportError::ConnectFailed("refused".to_string()).to_string(),
            "Failed to connect: refused"
        );
    }
}
