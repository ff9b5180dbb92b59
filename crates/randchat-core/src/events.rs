//! Event Sink Trait
//!
//! Decouples the driver from whatever presents the chat. The CLI prints
//! to stdout; tests record or discard events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::session::{ChatMessage, Notice, Screen, Sender};

/// Receives the observable state changes of a session
#[async_trait]
pub trait EventSink: Send + Sync {
    /// The top-level screen changed
    async fn emit_screen(&self, screen: Screen) -> Result<(), String>;

    /// A partner was found
    async fn emit_matched(&self, partner_username: &str, session_id: &str)
        -> Result<(), String>;

    /// An entry was appended to the chat log
    async fn emit_message(&self, message: &ChatMessage) -> Result<(), String>;

    /// The chat log was wiped
    async fn emit_log_cleared(&self) -> Result<(), String>;

    /// The partner started or stopped typing
    async fn emit_partner_typing(&self, is_typing: bool) -> Result<(), String>;

    /// A user-visible notice
    async fn emit_notice(&self, notice: &Notice) -> Result<(), String>;
}

/// Discards everything
#[derive(Default, Clone)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit_screen(&self, _screen: Screen) -> Result<(), String> {
        Ok(())
    }

    async fn emit_matched(
        &self,
        _partner_username: &str,
        _session_id: &str,
    ) -> Result<(), String> {
        Ok(())
    }

    async fn emit_message(&self, _message: &ChatMessage) -> Result<(), String> {
        Ok(())
    }

    async fn emit_log_cleared(&self) -> Result<(), String> {
        Ok(())
    }

    async fn emit_partner_typing(&self, _is_typing: bool) -> Result<(), String> {
        Ok(())
    }

    async fn emit_notice(&self, _notice: &Notice) -> Result<(), String> {
        Ok(())
    }
}

/// Stdout event sink for CLI mode
#[derive(Default, Clone)]
pub struct StdoutEventSink {
    /// One JSON object per line instead of human text
    pub json_output: bool,
}

impl StdoutEventSink {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    fn print(&self, json: serde_json::Value, text: String) {
        if self.json_output {
            println!("{json}");
        } else {
            println!("{text}");
        }
    }
}

#[async_trait]
impl EventSink for StdoutEventSink {
    async fn emit_screen(&self, screen: Screen) -> Result<(), String> {
        let text = match screen {
            Screen::Idle => "-- idle (/start <name> to begin) --".to_string(),
            Screen::Waiting => "-- looking for a partner --".to_string(),
            Screen::Chatting => "-- chatting (/skip, /leave, /quit) --".to_string(),
        };
        self.print(json!({ "event": "screen", "screen": screen }), text);
        Ok(())
    }

    async fn emit_matched(
        &self,
        partner_username: &str,
        session_id: &str,
    ) -> Result<(), String> {
        self.print(
            json!({
                "event": "matched",
                "partner_username": partner_username,
                "session_id": session_id,
            }),
            format!("Now chatting with {partner_username} (session {session_id})"),
        );
        Ok(())
    }

    async fn emit_message(&self, message: &ChatMessage) -> Result<(), String> {
        let payload = serde_json::to_value(message).map_err(|e| e.to_string())?;
        let who = match message.sender {
            Sender::Me => "you",
            Sender::Partner => message.username.as_str(),
        };
        self.print(
            json!({ "event": "message", "message": payload }),
            format!("[{}] {}: {}", format_timestamp(message.sent_at), who, message.body),
        );
        Ok(())
    }

    async fn emit_log_cleared(&self) -> Result<(), String> {
        self.print(json!({ "event": "log_cleared" }), "-- chat cleared --".to_string());
        Ok(())
    }

    async fn emit_partner_typing(&self, is_typing: bool) -> Result<(), String> {
        // Only the start of a burst is worth a line in text mode
        if self.json_output {
            println!("{}", json!({ "event": "partner_typing", "is_typing": is_typing }));
        } else if is_typing {
            println!("(partner is typing...)");
        }
        Ok(())
    }

    async fn emit_notice(&self, notice: &Notice) -> Result<(), String> {
        let payload = serde_json::to_value(notice).map_err(|e| e.to_string())?;
        self.print(
            json!({ "event": "notice", "notice": payload, "text": notice.to_string() }),
            format!("* {notice}"),
        );
        Ok(())
    }
}

/// Local wall-clock time of a message, `HH:MM:SS`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&chrono::Local).format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Origin;

    fn message() -> ChatMessage {
        ChatMessage {
            sender: Sender::Partner,
            username: "bob".to_string(),
            body: "hey".to_string(),
            sent_at: DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            origin: Origin::Remote,
        }
    }

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpEventSink;
        assert!(sink.emit_screen(Screen::Waiting).await.is_ok());
        assert!(sink.emit_matched("bob", "s1").await.is_ok());
        assert!(sink.emit_message(&message()).await.is_ok());
        assert!(sink.emit_log_cleared().await.is_ok());
        assert!(sink.emit_partner_typing(true).await.is_ok());
        assert!(sink.emit_notice(&Notice::PartnerDisconnected).await.is_ok());
    }

    #[tokio::test]
    async fn test_stdout_sink_both_formats() {
        for json_output in [false, true] {
            let sink = StdoutEventSink::new(json_output);
            assert!(sink.emit_screen(Screen::Chatting).await.is_ok());
            assert!(sink.emit_message(&message()).await.is_ok());
            assert!(sink.emit_partner_typing(false).await.is_ok());
            assert!(sink
                .emit_notice(&Notice::ConnectionError {
                    detail: "refused".to_string()
                })
                .await
                .is_ok());
        }
    }

    #[test]
    fn test_format_timestamp_shape() {
        let formatted = format_timestamp(message().sent_at);
        assert_eq!(formatted.len(), 8);
        assert_eq!(formatted.matches(':').count(), 2);
    }

    #[test]
    fn test_notice_json_shape() {
        let value = serde_json::to_value(Notice::ConnectedWith {
            partner_username: "bob".to_string(),
        })
        .unwrap();
        assert_eq!(value["notice"], "connected_with");
        assert_eq!(value["partner_username"], "bob");
    }
}
