//! STOMP-over-WebSocket transport
//!
//! One WebSocket per session. `connect` performs the CONNECT/CONNECTED
//! handshake, `subscribe` sends SUBSCRIBE and spawns a reader task that
//! forwards MESSAGE bodies to the sink, `disconnect` stops the reader and
//! sends DISCONNECT before closing the socket. Frames split across WebSocket
//! messages are reassembled before they are dispatched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use fleet_types::errors::{ConnectionError, TeardownError};
use fleet_types::ids::SessionId;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::frame::{Command, Frame, FrameBuffer};
use super::{SubscriptionId, Transport};
use crate::config::StompConfig;
use crate::events::InboundEvent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// A connected STOMP session.
pub struct StompSession {
    id: SessionId,
    endpoint: String,
    writer: tokio::sync::Mutex<WsWriter>,
    /// Taken by the reader task on subscribe, with any bytes read past CONNECTED.
    reader: Mutex<Option<(WsReader, FrameBuffer)>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl StompSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, frame: &Frame) -> Result<(), tungstenite::Error> {
        let mut writer = self.writer.lock().await;
        writer.send(Message::Text(frame.encode_text())).await
    }
}

/// STOMP 1.2 client over WebSocket.
pub struct StompTransport {
    config: StompConfig,
    next_subscription: AtomicU64,
}

impl StompTransport {
    pub fn new(config: StompConfig) -> Self {
        Self {
            config,
            next_subscription: AtomicU64::new(0),
        }
    }
}

impl Default for StompTransport {
    fn default() -> Self {
        Self::new(StompConfig::default())
    }
}

#[async_trait]
impl Transport for StompTransport {
    type Session = StompSession;

    async fn connect(&self, endpoint: &str) -> Result<StompSession, ConnectionError> {
        let (socket, _response) =
            connect_async(endpoint)
                .await
                .map_err(|e| ConnectionError::ConnectFailed {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                })?;
        let (mut writer, mut reader) = socket.split();

        writer
            .send(Message::Text(Frame::connect(&self.config.host).encode_text()))
            .await
            .map_err(|e| ConnectionError::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let mut buffer = FrameBuffer::new();
        let connected = tokio::time::timeout(
            self.config.handshake_timeout,
            await_connected(&mut reader, &mut buffer, endpoint),
        )
        .await
        .map_err(|_| ConnectionError::HandshakeTimeout {
            endpoint: endpoint.to_string(),
        })??;

        let session = StompSession {
            id: SessionId::new(),
            endpoint: endpoint.to_string(),
            writer: tokio::sync::Mutex::new(writer),
            reader: Mutex::new(Some((reader, buffer))),
            reader_task: Mutex::new(None),
        };

        info!(
            session_id = %session.id,
            endpoint,
            server = connected.header("server").unwrap_or("unknown"),
            version = connected.header("version").unwrap_or("1.0"),
            "STOMP session established"
        );

        Ok(session)
    }

    async fn subscribe(
        &self,
        session: &StompSession,
        topic: &str,
        sink: mpsc::Sender<InboundEvent>,
    ) -> Result<SubscriptionId, ConnectionError> {
        let subscribe_failed = |reason: String| ConnectionError::SubscribeFailed {
            topic: topic.to_string(),
            reason,
        };

        let (reader, buffer) = session
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| subscribe_failed("session already has a subscription".to_string()))?;

        let id = SubscriptionId::new(format!(
            "sub-{}",
            self.next_subscription.fetch_add(1, Ordering::Relaxed)
        ));

        session
            .send(&Frame::subscribe(id.as_str(), topic))
            .await
            .map_err(|e| subscribe_failed(e.to_string()))?;

        let task = tokio::spawn(pump_messages(reader, buffer, sink, session.id));
        *session
            .reader_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);

        debug!(session_id = %session.id, subscription = %id, topic, "Subscribed");
        Ok(id)
    }

    async fn disconnect(&self, session: StompSession) -> Result<(), TeardownError> {
        let task = session
            .reader_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }

        let receipt = format!("disconnect-{}", session.id);
        let mut writer = session.writer.into_inner();

        let result = match writer
            .send(Message::Text(Frame::disconnect(&receipt).encode_text()))
            .await
        {
            Ok(()) => writer.close().await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Ok(()),
            // Already gone: nothing left to release.
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(TeardownError::DisconnectFailed {
                reason: e.to_string(),
            }),
        }
    }

    fn reconnect_delay(&self, attempt: u32) -> Duration {
        self.config.backoff.delay_for(attempt)
    }
}

/// Read frames until CONNECTED arrives. Bytes after it stay in `buffer`.
async fn await_connected(
    reader: &mut WsReader,
    buffer: &mut FrameBuffer,
    endpoint: &str,
) -> Result<Frame, ConnectionError> {
    while let Some(message) = reader.next().await {
        let data = match message {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                return Err(ConnectionError::ConnectFailed {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        buffer.extend(&data);
        while let Some(frame) = buffer
            .next_frame()
            .map_err(|e| ConnectionError::Protocol(e.to_string()))?
        {
            match frame.command {
                Command::Connected => return Ok(frame),
                Command::Error => {
                    return Err(ConnectionError::Protocol(
                        frame.header("message").unwrap_or("ERROR frame").to_string(),
                    ))
                }
                other => debug!(command = %other, "Ignoring frame before CONNECTED"),
            }
        }
    }

    Err(ConnectionError::ConnectFailed {
        endpoint: endpoint.to_string(),
        reason: "socket closed during handshake".to_string(),
    })
}

/// Forward MESSAGE bodies to the sink until the socket ends.
///
/// Always ends with exactly one `ConnectionLost` unless the sink is gone.
async fn pump_messages(
    mut reader: WsReader,
    mut buffer: FrameBuffer,
    sink: mpsc::Sender<InboundEvent>,
    session_id: SessionId,
) {
    let reason = loop {
        let data = match reader.next().await {
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Binary(bytes))) => bytes,
            Some(Ok(Message::Close(frame))) => {
                break frame
                    .map(|f| format!("closed by broker: {}", f.reason))
                    .unwrap_or_else(|| "closed by broker".to_string());
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => break e.to_string(),
            None => break "stream ended".to_string(),
        };

        buffer.extend(&data);
        loop {
            let frame = match buffer.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Discarding unparseable STOMP data");
                    break;
                }
            };
            match frame.command {
                Command::Message => {
                    if sink.send(InboundEvent::Message(frame.body)).await.is_err() {
                        debug!(session_id = %session_id, "Sink closed; stopping reader");
                        return;
                    }
                }
                Command::Error => {
                    let reason = frame.header("message").unwrap_or("ERROR frame").to_string();
                    let _ = sink.send(InboundEvent::ConnectionLost(reason)).await;
                    return;
                }
                other => debug!(session_id = %session_id, command = %other, "Ignoring frame"),
            }
        }
    };

    warn!(session_id = %session_id, reason = %reason, "STOMP connection lost");
    let _ = sink.send(InboundEvent::ConnectionLost(reason)).await;
}
