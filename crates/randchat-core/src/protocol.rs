//! Wire Protocol Types
//!
//! JSON frames exchanged with the matching server. Every frame is an
//! object with a `type` discriminator; outbound and inbound frames are
//! separate enums so neither side can be constructed in the wrong place.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ChatError;

/// Frame types the client understands on the inbound side
const KNOWN_SERVER_TYPES: &[&str] = &["matched", "message", "typing", "partner_disconnected"];

/// Client → matching server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Request pairing
    FindMatch,
    /// Chat content for the current match
    Message { message: String },
    /// Typing-state change
    Typing { is_typing: bool },
    /// Abandon the current match, stay eligible for rematch
    Skip,
    /// Leave the system entirely
    Disconnect,
}

impl ClientFrame {
    /// The `type` tag as sent on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            ClientFrame::FindMatch => "find_match",
            ClientFrame::Message { .. } => "message",
            ClientFrame::Typing { .. } => "typing",
            ClientFrame::Skip => "skip",
            ClientFrame::Disconnect => "disconnect",
        }
    }
}

/// Matching server → client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Pairing established
    Matched {
        partner_username: String,
        session_id: String,
    },
    /// Relayed chat content
    Message {
        username: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    /// Relayed typing state
    Typing { is_typing: bool },
    /// The paired user left
    PartnerDisconnected,
}

/// Reasons an inbound frame could not be turned into a [`ServerFrame`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Not JSON, not an object, no usable tag, or a known tag with a bad payload
    #[error("{0}")]
    ProtocolViolation(String),

    /// Well-formed frame with a tag this client does not know
    #[error("{0}")]
    UnknownFrame(String),
}

impl From<FrameError> for ChatError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::ProtocolViolation(msg) => ChatError::ProtocolViolation(msg),
            FrameError::UnknownFrame(tag) => ChatError::UnknownFrame(tag),
        }
    }
}

/// Serialize an outbound frame to its text form
pub fn encode_client_frame(frame: &ClientFrame) -> Result<String, ChatError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode an inbound text frame
///
/// Unrecognized tags are reported separately from malformed payloads so
/// the caller can ignore the former silently and log the latter.
pub fn decode_server_frame(raw: &str) -> Result<ServerFrame, FrameError> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| FrameError::ProtocolViolation(format!("invalid JSON: {e}")))?;

    let tag = match value.get("type") {
        Some(serde_json::Value::String(tag)) => tag.clone(),
        Some(_) => {
            return Err(FrameError::ProtocolViolation(
                "frame type is not a string".to_string(),
            ))
        }
        None if value.is_object() => {
            return Err(FrameError::ProtocolViolation(
                "frame has no type".to_string(),
            ))
        }
        None => {
            return Err(FrameError::ProtocolViolation(
                "frame is not an object".to_string(),
            ))
        }
    };

    if !KNOWN_SERVER_TYPES.contains(&tag.as_str()) {
        return Err(FrameError::UnknownFrame(tag));
    }

    serde_json::from_value(value)
        .map_err(|e| FrameError::ProtocolViolation(format!("malformed '{tag}' frame: {e}")))
}

/// Parse a server timestamp
///
/// Accepts RFC 3339, or a naive ISO-8601 date-time taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
