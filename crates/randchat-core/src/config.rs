//! Client configuration
//!
//! Serde-friendly configuration with defaults and builder-style
//! overrides. The CLI fills these from arguments and environment.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};
use crate::identity::{UserId, Username};

/// Default configuration values
pub mod defaults {
    /// Backend the client talks to when nothing else is configured
    pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";

    /// Wait after a partner leaves before asking for a new match (milliseconds)
    pub const DEFAULT_REMATCH_DELAY_MS: u64 = 500;

    /// Quiet period that ends a typing burst (milliseconds)
    pub const DEFAULT_TYPING_IDLE_MS: u64 = 1000;

    /// Capacity of the intent and transport event channels
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

    /// Reporting viewer refresh interval (milliseconds)
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

    /// Number of recent sessions requested by the reporting viewer
    pub const DEFAULT_SESSION_LIMIT: usize = 100;
}

/// Settings for the chat client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// HTTP(S) base URL of the matching server
    pub backend_url: String,

    /// Delay before the automatic `find_match` after partner loss
    pub rematch_delay_ms: u64,

    /// Quiet period for the typing indicator
    pub typing_idle_ms: u64,

    /// Bounded channel capacity used by the driver
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: defaults::DEFAULT_BACKEND_URL.to_string(),
            rematch_delay_ms: defaults::DEFAULT_REMATCH_DELAY_MS,
            typing_idle_ms: defaults::DEFAULT_TYPING_IDLE_MS,
            channel_capacity: defaults::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    pub fn with_rematch_delay_ms(mut self, ms: u64) -> Self {
        self.rematch_delay_ms = ms;
        self
    }

    pub fn with_typing_idle_ms(mut self, ms: u64) -> Self {
        self.typing_idle_ms = ms;
        self
    }

    /// WebSocket URL for one participant
    ///
    /// `http://host` becomes `ws://host/api/ws/{user_id}?username=...`
    /// and `https` becomes `wss`.
    pub fn websocket_url(&self, user_id: &UserId, username: &Username) -> Result<Url> {
        let mut url = Url::parse(&self.backend_url)
            .map_err(|e| ChatError::Config(format!("invalid backend URL: {e}")))?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ChatError::Config(format!(
                    "unsupported backend scheme '{other}'"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ChatError::Config(format!("cannot switch scheme to {scheme}")))?;

        url.path_segments_mut()
            .map_err(|_| ChatError::Config("backend URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["api", "ws", user_id.as_str()]);
        url.query_pairs_mut()
            .clear()
            .append_pair("username", username.as_str());

        Ok(url)
    }

    /// Base URL of the reporting API (`{backend}/api`)
    pub fn api_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.backend_url)
            .map_err(|e| ChatError::Config(format!("invalid backend URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ChatError::Config("backend URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("api");
        Ok(url)
    }
}

/// Settings for the polling session viewer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportingConfig {
    pub poll_interval_ms: u64,
    pub session_limit: usize,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::DEFAULT_POLL_INTERVAL_MS,
            session_limit: defaults::DEFAULT_SESSION_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> (UserId, Username) {
        (
            UserId::from_string("abc123xyz"),
            Username::parse("alice smith").unwrap(),
        )
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.rematch_delay_ms, 500);
        assert_eq!(config.typing_idle_ms, 1000);

        let reporting = ReportingConfig::default();
        assert_eq!(reporting.poll_interval_ms, 5000);
        assert_eq!(reporting.session_limit, 100);
    }

    #[test]
    fn test_websocket_url_from_http() {
        let (id, name) = alice();
        let config = ClientConfig::new().with_backend_url("http://chat.local:8001");
        let url = config.websocket_url(&id, &name).unwrap();
        assert_eq!(
            url.as_str(),
            "ws://chat.local:8001/api/ws/abc123xyz?username=alice+smith"
        );
    }

    #[test]
    fn test_websocket_url_from_https_with_trailing_slash() {
        let (id, name) = alice();
        let config = ClientConfig::new().with_backend_url("https://chat.example.com/");
        let url = config.websocket_url(&id, &name).unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/api/ws/abc123xyz");
    }

    #[test]
    fn test_websocket_url_encodes_username() {
        let id = UserId::from_string("u1");
        let name = Username::parse("a&b=c").unwrap();
        let url = ClientConfig::new().websocket_url(&id, &name).unwrap();
        assert_eq!(url.query(), Some("username=a%26b%3Dc"));
    }

    #[test]
    fn test_invalid_backend_url() {
        let (id, name) = alice();
        let config = ClientConfig::new().with_backend_url("not a url");
        assert!(matches!(
            config.websocket_url(&id, &name),
            Err(ChatError::Config(_))
        ));

        let config = ClientConfig::new().with_backend_url("ftp://host");
        assert!(config.websocket_url(&id, &name).is_err());
    }

    #[test]
    fn test_api_url() {
        let config = ClientConfig::new().with_backend_url("http://localhost:8001");
        assert_eq!(config.api_url().unwrap().as_str(), "http://localhost:8001/api");
    }
}
