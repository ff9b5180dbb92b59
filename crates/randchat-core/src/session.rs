//! Session state machine
//!
//! Owns the client's screen, the active match and its chat log. Every
//! input (user intent, transport event, timer tick) goes through
//! [`SessionMachine::dispatch`], which mutates state and returns the
//! effects the driver must carry out, in order. No I/O happens here.
//!
//! ```text
//! Idle ──start──▶ Waiting ──matched──▶ Chatting
//!  ▲                 ▲                    │
//!  │                 └──skip / partner────┘
//!  └──────────── disconnect ◀─────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{earliest, Clock, Deadline};
use crate::config::ClientConfig;
use crate::error::{Result, UserInputError};
use crate::identity::{UserId, Username};
use crate::protocol::{decode_server_frame, parse_timestamp, ClientFrame, FrameError, ServerFrame};
use crate::transport::{AttemptId, CloseReason, TransportEvent, TransportEventKind};
use crate::typing::TypingCoordinator;

/// Top-level client mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Idle,
    Waiting,
    Chatting,
}

impl std::fmt::Display for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Screen::Idle => write!(f, "idle"),
            Screen::Waiting => write!(f, "waiting"),
            Screen::Chatting => write!(f, "chatting"),
        }
    }
}

/// The paired conversation currently on screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveMatch {
    pub session_id: String,
    pub partner_username: String,
    pub partner_typing: bool,
}

/// Who wrote a chat entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    Me,
    Partner,
}

/// How a chat entry got into the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Appended optimistically when we sent it
    LocalEcho,
    /// Relayed by the server
    Remote,
}

/// One entry of the chat log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    /// Display name of the author
    pub username: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub origin: Origin,
}

/// Something the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Start { username: String },
    Keystroke,
    Send { text: String },
    Skip,
    Disconnect,
}

/// Anything the state machine reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Intent(Intent),
    Transport(TransportEvent),
    /// A deadline may have expired
    Tick,
}

/// User-visible notices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    ConnectedWith { partner_username: String },
    PartnerDisconnected,
    FindingNewPartner,
    ConnectionError { detail: String },
    ConnectionClosed,
    InputRejected { reason: String },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::ConnectedWith { partner_username } => {
                write!(f, "Connected with {partner_username}!")
            }
            Notice::PartnerDisconnected => write!(f, "Partner disconnected"),
            Notice::FindingNewPartner => write!(f, "Finding new partner..."),
            Notice::ConnectionError { detail } => {
                write!(f, "Connection error ({detail}). Please reconnect.")
            }
            Notice::ConnectionClosed => write!(f, "Connection closed"),
            Notice::InputRejected { reason } => write!(f, "{reason}"),
        }
    }
}

/// State changes the presentation layer observes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ScreenChanged(Screen),
    Matched {
        partner_username: String,
        session_id: String,
    },
    MessageAppended(ChatMessage),
    LogCleared,
    PartnerTyping(bool),
    Notice(Notice),
}

/// Work for the driver, executed in the order returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Connect {
        attempt: AttemptId,
        user_id: UserId,
        username: Username,
    },
    Send(ClientFrame),
    Close {
        attempt: AttemptId,
    },
    Notify(Notification),
}

/// State of the single transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Down,
    Connecting(AttemptId),
    Up(AttemptId),
}

/// Timing knobs taken from [`ClientConfig`]
#[derive(Debug, Clone, Copy)]
struct Timings {
    rematch_delay_ms: u64,
}

/// The session client protocol engine
pub struct SessionMachine<C: Clock> {
    clock: C,
    timings: Timings,
    user_id: UserId,
    username: Option<Username>,
    screen: Screen,
    active: Option<ActiveMatch>,
    log: Vec<ChatMessage>,
    link: Link,
    last_attempt: u64,
    typing: TypingCoordinator,
    rematch: Deadline,
}

impl<C: Clock> SessionMachine<C> {
    pub fn new(user_id: UserId, config: &ClientConfig, clock: C) -> Self {
        Self {
            clock,
            timings: Timings {
                rematch_delay_ms: config.rematch_delay_ms,
            },
            user_id,
            username: None,
            screen: Screen::Idle,
            active: None,
            log: Vec::new(),
            link: Link::Down,
            last_attempt: 0,
            typing: TypingCoordinator::new(config.typing_idle_ms),
            rematch: Deadline::default(),
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn username(&self) -> Option<&Username> {
        self.username.as_ref()
    }

    pub fn active_match(&self) -> Option<&ActiveMatch> {
        self.active.as_ref()
    }

    pub fn log(&self) -> &[ChatMessage] {
        &self.log
    }

    /// Whether the transport is ready for protocol frames
    pub fn is_connected(&self) -> bool {
        matches!(self.link, Link::Up(_))
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Earliest pending timer, in the clock's milliseconds
    pub fn next_deadline(&self) -> Option<u64> {
        earliest(self.typing.next_deadline(), self.rematch.at())
    }

    /// Single entry point: react to one input
    ///
    /// Only user input can fail, and a failure leaves state untouched.
    pub fn dispatch(&mut self, input: Input) -> Result<Vec<Effect>> {
        let mut effects = Vec::new();
        match input {
            Input::Intent(intent) => self.on_intent(intent, &mut effects)?,
            Input::Transport(event) => self.on_transport(event, &mut effects),
            Input::Tick => self.on_tick(&mut effects),
        }
        Ok(effects)
    }

    // ===== User intents =====

    fn on_intent(&mut self, intent: Intent, effects: &mut Vec<Effect>) -> Result<()> {
        match intent {
            Intent::Start { username } => self.start(&username, effects),
            Intent::Keystroke => {
                self.keystroke(effects);
                Ok(())
            }
            Intent::Send { text } => self.send_message(text, effects),
            Intent::Skip => {
                self.skip(effects);
                Ok(())
            }
            Intent::Disconnect => {
                self.disconnect(effects);
                Ok(())
            }
        }
    }

    fn start(&mut self, raw: &str, effects: &mut Vec<Effect>) -> Result<()> {
        if self.screen != Screen::Idle {
            debug!("Ignoring start while {}", self.screen);
            return Ok(());
        }
        let username = Username::parse(raw)?;

        self.last_attempt += 1;
        let attempt = AttemptId(self.last_attempt);
        self.link = Link::Connecting(attempt);
        self.username = Some(username.clone());

        info!("Starting as '{}' ({})", username, attempt);
        self.set_screen(Screen::Waiting, effects);
        effects.push(Effect::Connect {
            attempt,
            user_id: self.user_id.clone(),
            username,
        });
        Ok(())
    }

    fn keystroke(&mut self, effects: &mut Vec<Effect>) {
        if self.screen != Screen::Chatting || !self.is_connected() {
            return;
        }
        if let Some(is_typing) = self.typing.on_keystroke(self.clock.now_ms()) {
            effects.push(Effect::Send(ClientFrame::Typing { is_typing }));
        }
    }

    fn send_message(&mut self, text: String, effects: &mut Vec<Effect>) -> Result<()> {
        if text.trim().is_empty() {
            return Err(UserInputError::EmptyMessage.into());
        }
        if self.screen != Screen::Chatting || !self.is_connected() {
            debug!("Ignoring send while {}", self.screen);
            return Ok(());
        }

        let entry = ChatMessage {
            sender: Sender::Me,
            username: self
                .username
                .as_ref()
                .map(|u| u.to_string())
                .unwrap_or_default(),
            body: text.clone(),
            sent_at: self.clock.wall(),
            origin: Origin::LocalEcho,
        };
        // Local echo goes into the log before the frame reaches the driver
        self.log.push(entry.clone());
        effects.push(Effect::Notify(Notification::MessageAppended(entry)));
        effects.push(Effect::Send(ClientFrame::Message { message: text }));

        if let Some(is_typing) = self.typing.on_send() {
            effects.push(Effect::Send(ClientFrame::Typing { is_typing }));
        }
        Ok(())
    }

    fn skip(&mut self, effects: &mut Vec<Effect>) {
        if self.screen != Screen::Chatting {
            debug!("Ignoring skip while {}", self.screen);
            return;
        }
        if self.is_connected() {
            effects.push(Effect::Send(ClientFrame::Skip));
        }
        self.end_match(effects);
        self.set_screen(Screen::Waiting, effects);
        effects.push(Effect::Notify(Notification::Notice(Notice::FindingNewPartner)));
    }

    fn disconnect(&mut self, effects: &mut Vec<Effect>) {
        if self.screen == Screen::Idle {
            return;
        }

        match self.link {
            Link::Up(attempt) => {
                effects.push(Effect::Send(ClientFrame::Disconnect));
                effects.push(Effect::Close { attempt });
            }
            Link::Connecting(attempt) => effects.push(Effect::Close { attempt }),
            Link::Down => {}
        }
        self.link = Link::Down;

        self.end_match(effects);
        self.username = None;
        info!("Disconnected");
        self.set_screen(Screen::Idle, effects);
    }

    // ===== Transport events =====

    fn on_transport(&mut self, event: TransportEvent, effects: &mut Vec<Effect>) {
        let current = match self.link {
            Link::Connecting(a) | Link::Up(a) => Some(a),
            Link::Down => None,
        };
        if current != Some(event.attempt) {
            debug!("Dropping event from stale connection {}", event.attempt);
            return;
        }

        match event.kind {
            TransportEventKind::Ready => {
                self.link = Link::Up(event.attempt);
                if self.screen == Screen::Waiting {
                    effects.push(Effect::Send(ClientFrame::FindMatch));
                }
            }
            TransportEventKind::Message(raw) => self.on_frame(&raw, effects),
            TransportEventKind::Closed(reason) => self.on_closed(reason, effects),
        }
    }

    fn on_closed(&mut self, reason: CloseReason, effects: &mut Vec<Effect>) {
        warn!("Connection lost while {}: {}", self.screen, reason);
        self.link = Link::Down;
        self.typing.reset();
        self.rematch.cancel();

        let notice = match reason {
            CloseReason::Error(detail) => Notice::ConnectionError { detail },
            CloseReason::Remote | CloseReason::Local => Notice::ConnectionClosed,
        };
        effects.push(Effect::Notify(Notification::Notice(notice)));
    }

    fn on_frame(&mut self, raw: &str, effects: &mut Vec<Effect>) {
        let frame = match decode_server_frame(raw) {
            Ok(frame) => frame,
            Err(FrameError::UnknownFrame(tag)) => {
                debug!("Ignoring unknown frame type '{}'", tag);
                return;
            }
            Err(FrameError::ProtocolViolation(msg)) => {
                warn!("Dropping inbound frame: {}", msg);
                return;
            }
        };

        match frame {
            ServerFrame::Matched {
                partner_username,
                session_id,
            } => self.on_matched(partner_username, session_id, effects),
            ServerFrame::Message {
                username,
                message,
                timestamp,
            } => self.on_remote_message(username, message, timestamp, effects),
            ServerFrame::Typing { is_typing } => {
                if let Some(active) = self.active.as_mut() {
                    if active.partner_typing != is_typing {
                        active.partner_typing = is_typing;
                        effects.push(Effect::Notify(Notification::PartnerTyping(is_typing)));
                    }
                }
            }
            ServerFrame::PartnerDisconnected => self.on_partner_disconnected(effects),
        }
    }

    fn on_matched(&mut self, partner_username: String, session_id: String, effects: &mut Vec<Effect>) {
        match self.screen {
            Screen::Idle => {
                debug!("Ignoring match while idle");
                return;
            }
            Screen::Chatting => {
                warn!("New match while chatting; replacing the current one");
                self.end_match(effects);
            }
            Screen::Waiting => {}
        }

        self.rematch.cancel();
        if !self.log.is_empty() {
            self.log.clear();
            effects.push(Effect::Notify(Notification::LogCleared));
        }
        self.active = Some(ActiveMatch {
            session_id: session_id.clone(),
            partner_username: partner_username.clone(),
            partner_typing: false,
        });

        info!("Matched with '{}' in session {}", partner_username, session_id);
        self.set_screen(Screen::Chatting, effects);
        effects.push(Effect::Notify(Notification::Matched {
            partner_username: partner_username.clone(),
            session_id,
        }));
        effects.push(Effect::Notify(Notification::Notice(Notice::ConnectedWith {
            partner_username,
        })));
    }

    fn on_remote_message(
        &mut self,
        username: String,
        body: String,
        timestamp: Option<String>,
        effects: &mut Vec<Effect>,
    ) {
        let Some(active) = self.active.as_mut() else {
            debug!("Ignoring message outside a match");
            return;
        };

        if active.partner_typing {
            active.partner_typing = false;
            effects.push(Effect::Notify(Notification::PartnerTyping(false)));
        }

        let sent_at = timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(|| self.clock.wall());
        let entry = ChatMessage {
            sender: Sender::Partner,
            username,
            body,
            sent_at,
            origin: Origin::Remote,
        };
        self.log.push(entry.clone());
        effects.push(Effect::Notify(Notification::MessageAppended(entry)));
    }

    fn on_partner_disconnected(&mut self, effects: &mut Vec<Effect>) {
        if self.screen != Screen::Chatting {
            debug!("Ignoring partner_disconnected while {}", self.screen);
            return;
        }
        info!("Partner left; rematching in {}ms", self.timings.rematch_delay_ms);
        self.end_match(effects);
        self.set_screen(Screen::Waiting, effects);
        effects.push(Effect::Notify(Notification::Notice(Notice::PartnerDisconnected)));
        self.rematch
            .arm(self.clock.now_ms(), self.timings.rematch_delay_ms);
    }

    // ===== Timers =====

    fn on_tick(&mut self, effects: &mut Vec<Effect>) {
        let now = self.clock.now_ms();

        if let Some(is_typing) = self.typing.poll(now) {
            if self.screen == Screen::Chatting && self.is_connected() {
                effects.push(Effect::Send(ClientFrame::Typing { is_typing }));
            }
        }

        // The user may have navigated away since the rematch was armed
        if self.rematch.fire(now) && self.screen == Screen::Waiting && self.is_connected() {
            effects.push(Effect::Send(ClientFrame::FindMatch));
        }
    }

    // ===== Helpers =====

    /// Destroy the active match and everything scoped to it
    fn end_match(&mut self, effects: &mut Vec<Effect>) {
        self.typing.reset();
        self.rematch.cancel();
        self.active = None;
        if !self.log.is_empty() {
            self.log.clear();
            effects.push(Effect::Notify(Notification::LogCleared));
        }
    }

    fn set_screen(&mut self, screen: Screen, effects: &mut Vec<Effect>) {
        if self.screen != screen {
            self.screen = screen;
            effects.push(Effect::Notify(Notification::ScreenChanged(screen)));
        }
    }
}
