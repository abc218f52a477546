use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::events::{EventDispatcher, EventEnvelope, ServerEvent};

pub const WEBSOCKET_PATH: &str = "/api/v4/websocket";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("event stream failed to connect: {0}")]
    Connect(String),
    #[error("event stream read failed: {0}")]
    Receive(String),
    #[error("event stream close failed: {0}")]
    Close(String),
}

/// The realtime event feed, one envelope at a time.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// Blocking receive; `Ok(None)` means the stream ended.
    async fn next_event(&self) -> Result<Option<EventEnvelope>, TransportError>;
    async fn close(&self) -> Result<(), TransportError>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Websocket connection to the server's realtime endpoint, authenticated
/// with the session token captured at login.
pub struct WebSocketTransport {
    endpoint: String,
    token: String,
    stream: Mutex<Option<WsStream>>,
    shutdown: Notify,
    closed: AtomicBool,
}

impl WebSocketTransport {
    /// `ws_base` is the scheme-swapped server base URL, e.g.
    /// `ws://localhost:8065`.
    pub fn new(ws_base: &str, token: impl Into<String>) -> Self {
        Self {
            endpoint: format!("{}{WEBSOCKET_PATH}", ws_base.trim_end_matches('/')),
            token: token.into(),
            stream: Mutex::new(None),
            shutdown: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EventTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let (mut stream, _response) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        // The server expects an authentication challenge as the first frame.
        let challenge = serde_json::json!({
            "seq": 1,
            "action": "authentication_challenge",
            "data": { "token": self.token },
        });
        stream
            .send(WsMessage::text(challenge.to_string()))
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        *self.stream.lock().await = Some(stream);
        info!(endpoint = %self.endpoint, "event stream connected");
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<EventEnvelope>, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return Err(TransportError::Receive("event stream is not connected".to_string()));
        };

        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }

            tokio::select! {
                _ = self.shutdown.notified() => return Ok(None),
                frame = stream.next() => match frame {
                    None => return Ok(None),
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<EventEnvelope>(&text) {
                            // Frames with no event name are protocol replies
                            // (auth acks, seq responses); skip them.
                            Ok(envelope) if envelope.is_event() => return Ok(Some(envelope)),
                            Ok(_) => continue,
                            Err(error) => {
                                debug!(%error, "skipping unparseable frame");
                                continue;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) => return Ok(None),
                    Some(Ok(_)) => continue,
                    Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                },
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();

        // Best effort. The reader usually holds the stream lock until the
        // shutdown notification wakes it, so only send a close frame if the
        // lock is free right now.
        if let Ok(mut guard) = self.stream.try_lock() {
            if let Some(stream) = guard.as_mut() {
                stream
                    .close(None)
                    .await
                    .map_err(|error| TransportError::Close(error.to_string()))?;
            }
            *guard = None;
        }

        Ok(())
    }
}

/// The long-running consumer loop: receives one event at a time in delivery
/// order and hands it to the dispatcher. A transport failure or end of
/// stream ends the loop; there is no reconnect.
pub struct EventPump {
    transport: Arc<dyn EventTransport>,
    dispatcher: EventDispatcher,
}

impl EventPump {
    pub fn new(transport: Arc<dyn EventTransport>, dispatcher: EventDispatcher) -> Self {
        Self { transport, dispatcher }
    }

    pub async fn run(self) {
        loop {
            match self.transport.next_event().await {
                Ok(Some(envelope)) => {
                    let Some(event) = ServerEvent::from_envelope(&envelope) else {
                        debug!(seq = envelope.seq, "dropping event with unusable payload");
                        continue;
                    };
                    debug!(event_type = %envelope.event, seq = envelope.seq, "received event");

                    if let Err(error) = self.dispatcher.dispatch(&event).await {
                        warn!(%error, "event dispatch failed; continuing");
                    }
                }
                Ok(None) => {
                    info!("event stream closed");
                    break;
                }
                Err(error) => {
                    warn!(%error, "event stream receive failed; stopping listener");
                    break;
                }
            }
        }

        if let Err(error) = self.transport.close().await {
            debug!(%error, "event stream close after loop exit failed");
        }
    }
}
