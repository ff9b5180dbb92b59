//! WebSocket transport
//!
//! Connection manager backed by tokio-tungstenite. Each `open` spawns one
//! task that connects, reports `Ready`, then pumps frames in both
//! directions until either side closes. Exactly one `Closed` event is
//! reported per attempt.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::protocol::{encode_client_frame, ClientFrame};
use crate::transport::{
    AttemptId, CloseReason, ConnectRequest, Transport, TransportError, TransportEvent,
};

/// Frames queued for the writer half
#[derive(Debug)]
enum Outbound {
    Text(String),
    Close,
}

/// The single live connection, if any
struct LiveConnection {
    attempt: AttemptId,
    outbound: mpsc::UnboundedSender<Outbound>,
}

/// [`Transport`] over a WebSocket to the matching server
pub struct WebSocketTransport {
    config: ClientConfig,
    live: Option<LiveConnection>,
}

impl WebSocketTransport {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, live: None }
    }
}

impl Transport for WebSocketTransport {
    fn open(
        &mut self,
        request: ConnectRequest,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<(), TransportError> {
        if let Some(live) = &self.live {
            if !live.outbound.is_closed() {
                return Err(TransportError::AlreadyConnected);
            }
        }

        let url = self
            .config
            .websocket_url(&request.user_id, &request.username)
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let attempt = request.attempt;

        info!("Connecting {} to {}", attempt, url);
        tokio::spawn(run_connection(url.to_string(), attempt, outbound_rx, events));

        self.live = Some(LiveConnection {
            attempt,
            outbound: outbound_tx,
        });
        Ok(())
    }

    fn send(&mut self, frame: &ClientFrame) -> Result<(), TransportError> {
        let live = self.live.as_ref().ok_or(TransportError::NotConnected)?;
        let text =
            encode_client_frame(frame).map_err(|e| TransportError::Serialization(e.to_string()))?;
        live.outbound
            .send(Outbound::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        if let Some(live) = self.live.take() {
            debug!("Closing connection {}", live.attempt);
            let _ = live.outbound.send(Outbound::Close);
        }
    }
}

/// Connect and pump frames until the connection ends
async fn run_connection(
    url: String,
    attempt: AttemptId,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::Sender<TransportEvent>,
) {
    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            warn!("Failed to connect {}: {}", attempt, e);
            let reason = CloseReason::Error(TransportError::ConnectFailed(e.to_string()).to_string());
            let _ = events.send(TransportEvent::closed(attempt, reason)).await;
            return;
        }
    };

    info!("Connection {} ready", attempt);
    if events.send(TransportEvent::ready(attempt)).await.is_err() {
        return;
    }

    let (mut write, mut read) = ws.split();

    let reason = loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        break CloseReason::Error(TransportError::WebSocket(e.to_string()).to_string());
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.send(Message::Close(None)).await;
                    let _ = write.close().await;
                    break CloseReason::Local;
                }
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if events.send(TransportEvent::message(attempt, text)).await.is_err() {
                        break CloseReason::Local;
                    }
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                    Ok(text) => {
                        if events.send(TransportEvent::message(attempt, text)).await.is_err() {
                            break CloseReason::Local;
                        }
                    }
                    Err(_) => debug!("Dropping non-UTF-8 binary frame on {}", attempt),
                },
                Some(Ok(Message::Close(_))) | None => break CloseReason::Remote,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Read error on {}: {}", attempt, e);
                    break CloseReason::Error(TransportError::WebSocket(e.to_string()).to_string());
                }
            },
        }
    };

    info!("Connection {} ended ({})", attempt, reason);
    let _ = events.send(TransportEvent::closed(attempt, reason)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{UserId, Username};

    fn request(attempt: u64) -> ConnectRequest {
        ConnectRequest {
            attempt: AttemptId(attempt),
            user_id: UserId::from_string("u1"),
            username: Username::parse("alice").unwrap(),
        }
    }

    #[test]
    fn test_send_without_connection() {
        let mut transport = WebSocketTransport::new(ClientConfig::new());
        let err = transport.send(&ClientFrame::FindMatch).unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_url() {
        let config = ClientConfig::new().with_backend_url("not a url");
        let mut transport = WebSocketTransport::new(config);
        let (tx, _rx) = mpsc::channel(8);
        let err = transport.open(request(1), tx).unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_closed_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let config = ClientConfig::new().with_backend_url("http://127.0.0.1:9");
        let mut transport = WebSocketTransport::new(config);
        let (tx, mut rx) = mpsc::channel(8);
        transport.open(request(7), tx).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.attempt, AttemptId(7));
        assert!(matches!(
            event.kind,
            crate::transport::TransportEventKind::Closed(CloseReason::Error(_))
        ));
    }

    #[tokio::test]
    async fn test_second_open_while_live_is_rejected() {
        let config = ClientConfig::new().with_backend_url("http://127.0.0.1:9");
        let mut transport = WebSocketTransport::new(config);
        let (tx, _rx) = mpsc::channel(8);
        transport.open(request(1), tx.clone()).unwrap();
        assert!(matches!(
            transport.open(request(2), tx),
            Err(TransportError::AlreadyConnected)
        ));

        transport.close();
        assert!(matches!(
            transport.send(&ClientFrame::Skip),
            Err(TransportError::NotConnected)
        ));
    }

    #[test]
    fn test_send_queues_wire_encoding() {
        let (outbound, mut queued) = mpsc::unbounded_channel();
        let mut transport = WebSocketTransport::new(ClientConfig::new());
        transport.live = Some(LiveConnection {
            attempt: AttemptId(1),
            outbound,
        });

        let frame = ClientFrame::Typing { is_typing: true };
        transport.send(&frame).unwrap();
        match queued.try_recv().unwrap() {
            Outbound::Text(text) => assert_eq!(text, encode_client_frame(&frame).unwrap()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ping_answered_once() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Ping(b"hb".to_vec())).await.unwrap();
            let first = ws.next().await.unwrap().unwrap();
            ws.send(Message::Text(r#"{"type":"partner_disconnected"}"#.to_string()))
                .await
                .unwrap();
            let second = ws.next().await.unwrap().unwrap();
            (first, second)
        });

        let config = ClientConfig::new().with_backend_url(format!("http://127.0.0.1:{port}"));
        let mut transport = WebSocketTransport::new(config);
        let (tx, mut rx) = mpsc::channel(8);
        transport.open(request(1), tx).unwrap();

        assert_eq!(rx.recv().await.unwrap(), TransportEvent::ready(AttemptId(1)));
        assert_eq!(
            rx.recv().await.unwrap(),
            TransportEvent::message(AttemptId(1), r#"{"type":"partner_disconnected"}"#)
        );
        transport.send(&ClientFrame::FindMatch).unwrap();

        let (first, second) = server.await.unwrap();
        assert_eq!(first, Message::Pong(b"hb".to_vec()));
        assert_eq!(
            second,
            Message::Text(encode_client_frame(&ClientFrame::FindMatch).unwrap())
        );
        transport.close();
    }
}
