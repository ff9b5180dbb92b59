//! Client driver
//!
//! Runs a [`SessionMachine`] against a real [`Transport`] and
//! [`EventSink`]. One task owns everything: each wakeup turns into one
//! [`Input`], and the resulting effects are carried out in order before
//! the next wakeup is considered.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::error::ChatError;
use crate::events::EventSink;
use crate::identity::UserId;
use crate::session::{Effect, Input, Intent, Notice, Notification, SessionMachine};
use crate::transport::{CloseReason, ConnectRequest, Transport, TransportEvent};

/// Reactive loop around the session state machine
pub struct ChatClient<T: Transport, C: Clock, E: EventSink> {
    machine: SessionMachine<C>,
    transport: T,
    sink: E,
    events_tx: mpsc::Sender<TransportEvent>,
    events_rx: mpsc::Receiver<TransportEvent>,
}

impl<T: Transport, C: Clock, E: EventSink> ChatClient<T, C, E> {
    pub fn new(user_id: UserId, config: &ClientConfig, transport: T, clock: C, sink: E) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity);
        Self {
            machine: SessionMachine::new(user_id, config, clock),
            transport,
            sink,
            events_tx,
            events_rx,
        }
    }

    pub fn machine(&self) -> &SessionMachine<C> {
        &self.machine
    }

    /// Process intents until the sender side is dropped
    ///
    /// On exit the session is disconnected as if the user asked for it.
    pub async fn run(mut self, mut intents: mpsc::Receiver<Intent>) {
        info!("Chat client {} running", self.machine.user_id());

        loop {
            let wait = self.machine.next_deadline().map(|at| {
                Duration::from_millis(at.saturating_sub(self.machine.clock().now_ms()))
            });

            let input = tokio::select! {
                intent = intents.recv() => match intent {
                    Some(intent) => Input::Intent(intent),
                    None => break,
                },
                Some(event) = self.events_rx.recv() => Input::Transport(event),
                _ = sleep_or_pending(wait) => Input::Tick,
            };

            self.step(input).await;
        }

        debug!("Intent channel closed, shutting down");
        self.step(Input::Intent(Intent::Disconnect)).await;
    }

    /// Feed one input to the machine and execute its effects
    pub async fn step(&mut self, input: Input) {
        match self.machine.dispatch(input) {
            Ok(effects) => {
                for effect in effects {
                    self.execute(effect).await;
                }
            }
            Err(ChatError::UserInput(e)) => {
                let notice = Notice::InputRejected {
                    reason: e.to_string(),
                };
                self.notify(Notification::Notice(notice)).await;
            }
            Err(e) => warn!("Dispatch failed: {}", e),
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Connect {
                attempt,
                user_id,
                username,
            } => {
                let request = ConnectRequest {
                    attempt,
                    user_id,
                    username,
                };
                if let Err(e) = self.transport.open(request, self.events_tx.clone()) {
                    warn!("Could not open connection {}: {}", attempt, e);
                    // Report it like any other failed attempt
                    let event = TransportEvent::closed(attempt, CloseReason::Error(e.to_string()));
                    if self.events_tx.try_send(event).is_err() {
                        warn!("Event queue full; dropped failure of {}", attempt);
                    }
                }
            }
            Effect::Send(frame) => {
                if let Err(e) = self.transport.send(&frame) {
                    warn!("Failed to send {}: {}", frame.kind(), e);
                }
            }
            Effect::Close { attempt } => {
                debug!("Closing {}", attempt);
                self.transport.close();
            }
            Effect::Notify(notification) => self.notify(notification).await,
        }
    }

    async fn notify(&mut self, notification: Notification) {
        let result = match &notification {
            Notification::ScreenChanged(screen) => self.sink.emit_screen(*screen).await,
            Notification::Matched {
                partner_username,
                session_id,
            } => self.sink.emit_matched(partner_username, session_id).await,
            Notification::MessageAppended(message) => self.sink.emit_message(message).await,
            Notification::LogCleared => self.sink.emit_log_cleared().await,
            Notification::PartnerTyping(is_typing) => {
                self.sink.emit_partner_typing(*is_typing).await
            }
            Notification::Notice(notice) => self.sink.emit_notice(notice).await,
        };
        if let Err(e) = result {
            warn!("Event sink rejected {:?}: {}", notification, e);
        }
    }
}

async fn sleep_or_pending(wait: Option<Duration>) {
    match wait {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}
