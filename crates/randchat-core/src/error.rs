//! Crate-wide error types
//!
//! This module defines the error taxonomy of the chat client using
//! `thiserror`. Nothing here is fatal to the process: every failure
//! degrades to a notice and a recoverable screen.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::TransportError;

/// Application-wide error type
///
/// - `Transport`: the connection could not be established or dropped.
/// - `ProtocolViolation`: a known frame type carried a malformed payload.
/// - `UnknownFrame`: an unrecognized frame type (ignored by the client).
/// - `UserInput`: empty username or message, rejected before the wire.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "message")]
pub enum ChatError {
    /// Connection-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Known frame type with a malformed payload
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Unrecognized frame type
    #[error("Unknown frame type: {0}")]
    UnknownFrame(String),

    /// Locally rejected user input
    #[error("Invalid input: {0}")]
    UserInput(UserInputError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reporting interface request failed
    #[error("Reporting error: {0}")]
    Reporting(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Input the user supplied that is rejected locally
#[derive(Debug, Clone, Copy, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserInputError {
    #[error("Please enter a username")]
    EmptyUsername,

    #[error("Message is empty")]
    EmptyMessage,
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ChatError>;

impl From<ChatError> for String {
    fn from(error: ChatError) -> String {
        error.to_string()
    }
}

impl From<UserInputError> for ChatError {
    fn from(err: UserInputError) -> Self {
        Self::UserInput(err)
    }
}

impl From<TransportError> for ChatError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        Self::Reporting(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_input_display() {
        let err: ChatError = UserInputError::EmptyUsername.into();
        assert_eq!(err.to_string(), "Invalid input: Please enter a username");
    }

    #[test]
    fn test_error_serialization() {
        let err = ChatError::UnknownFrame("presence".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"type":"UnknownFrame","message":"presence"}"#);

        let parsed: ChatError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, err);
    }

    #[test]
    fn test_transport_conversion() {
        let err: ChatError = TransportError::NotConnected.into();
        assert!(matches!(err, ChatError::Transport(_)));
    }
}
