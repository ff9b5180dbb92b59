//! Read-only reporting API
//!
//! Aggregate counters and recorded sessions exposed by the matching
//! server under `{backend}/api`. The client never writes here.

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use crate::protocol::parse_timestamp;

/// Live counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub online_users: u64,
    pub active_sessions: u64,
    pub total_sessions: u64,
    pub waiting_queue: u64,
}

/// One row of the recent sessions list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user1_username: String,
    pub user2_username: String,
    #[serde(default)]
    pub message_count: u64,
    pub started_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
}

impl SessionSummary {
    /// A session is active until the server records its end
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn started(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.started_at)
    }
}

/// A message as recorded by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub sender_username: String,
    pub message: String,
    pub timestamp: String,
}

/// Full record of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session_id: String,
    pub user1_username: String,
    pub user2_username: String,
    pub started_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

impl SessionDetail {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Counters and recent sessions fetched together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub stats: Stats,
    pub sessions: Vec<SessionSummary>,
}

/// HTTP client for the reporting API
#[derive(Debug, Clone)]
pub struct ReportingClient {
    http: Client,
    api: Url,
}

impl ReportingClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            api: config.api_url()?,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api
    }

    /// `GET {api}/stats`
    pub async fn stats(&self) -> Result<Stats> {
        self.get(self.endpoint(&["stats"])?).await
    }

    /// `GET {api}/sessions?limit=N`, most recent first
    pub async fn sessions(&self, limit: usize) -> Result<Vec<SessionSummary>> {
        let mut url = self.endpoint(&["sessions"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        self.get(url).await
    }

    /// `GET {api}/session/{id}`
    pub async fn session(&self, session_id: &str) -> Result<SessionDetail> {
        self.get(self.endpoint(&["session", session_id])?).await
    }

    /// Stats and the session list, requested concurrently
    pub async fn snapshot(&self, limit: usize) -> Result<Snapshot> {
        let (stats, sessions) = futures::try_join!(self.stats(), self.sessions(limit))?;
        Ok(Snapshot { stats, sessions })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api.clone();
        url.path_segments_mut()
            .map_err(|_| ChatError::Config("API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);
        let response = self.http.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ChatError::Reporting(format!("{url} returned {status}: {body}")));
        }

        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ReportingClient {
        let config = ClientConfig::new().with_backend_url("http://chat.local:8001");
        ReportingClient::new(&config).unwrap()
    }

    #[test]
    fn test_endpoints() {
        let client = client();
        assert_eq!(
            client.endpoint(&["stats"]).unwrap().as_str(),
            "http://chat.local:8001/api/stats"
        );
        assert_eq!(
            client.endpoint(&["session", "a/b"]).unwrap().as_str(),
            "http://chat.local:8001/api/session/a%2Fb"
        );
    }

    #[test]
    fn test_parse_stats() {
        let stats: Stats = serde_json::from_str(
            r#"{"online_users":12,"active_sessions":4,"total_sessions":88,"waiting_queue":3}"#,
        )
        .unwrap();
        assert_eq!(stats.online_users, 12);
        assert_eq!(stats.waiting_queue, 3);
    }

    #[test]
    fn test_parse_sessions() {
        let sessions: Vec<SessionSummary> = serde_json::from_str(
            r#"[
                {"session_id":"s1","user1_username":"alice","user2_username":"bob",
                 "message_count":5,"started_at":"2024-05-01T10:00:00","ended_at":null},
                {"session_id":"s2","user1_username":"carol","user2_username":"dave",
                 "message_count":0,"started_at":"2024-05-01T09:00:00Z",
                 "ended_at":"2024-05-01T09:05:00Z"}
            ]"#,
        )
        .unwrap();
        assert!(sessions[0].is_active());
        assert!(!sessions[1].is_active());
        assert!(sessions[0].started().is_some());
        assert_eq!(
            parse_timestamp(sessions[1].ended_at.as_deref().unwrap())
                .unwrap()
                .to_rfc3339(),
            "2024-05-01T09:05:00+00:00"
        );
    }

    #[test]
    fn test_parse_detail_without_messages() {
        let detail: SessionDetail = serde_json::from_str(
            r#"{"session_id":"s1","user1_username":"alice","user2_username":"bob",
                "started_at":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert!(detail.messages.is_empty());
        assert!(detail.is_active());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_reporting_error() {
        let config = ClientConfig::new().with_backend_url("http://127.0.0.1:9");
        let client = ReportingClient::new(&config).unwrap();
        assert!(matches!(
            client.stats().await,
            Err(ChatError::Reporting(_))
        ));
    }
}
