//! Randchat Core Library
//!
//! Client-side engine for an anonymous one-to-one random chat service.
//! Everything that decides *what* happens lives in a pure state machine;
//! the network, timers and presentation are plugged in at the edges.
//!
//! # Modules
//!
//! - [`protocol`] - JSON wire frames exchanged with the matching server
//! - [`session`] - Session state machine (idle, waiting, chatting)
//! - [`typing`] - Typing indicator debouncing
//! - [`client`] - Async driver wiring the machine to a transport
//! - [`transport`] - Transport seam and connection events
//! - [`websocket`] - WebSocket transport (feature `websocket`)
//! - [`events`] - Event sink trait for presenting a session
//! - [`reporting`] - Read-only admin statistics API
//! - [`clock`] - Injectable time source and deadlines
//! - [`config`] - Client configuration
//! - [`identity`] - User id and username
//! - [`error`] - Error types

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod protocol;
pub mod reporting;
pub mod session;
pub mod transport;
pub mod typing;
#[cfg(feature = "websocket")]
pub mod websocket;

// Re-export commonly used types
pub use client::ChatClient;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, ReportingConfig};
pub use error::{ChatError, Result, UserInputError};
pub use events::{EventSink, NoOpEventSink, StdoutEventSink};
pub use identity::{UserId, Username};
pub use protocol::{ClientFrame, ServerFrame};
pub use reporting::{ReportingClient, SessionDetail, SessionSummary, Stats};
pub use session::{Effect, Input, Intent, Notice, Notification, Screen, SessionMachine};
pub use transport::{AttemptId, Transport, TransportError, TransportEvent};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;
