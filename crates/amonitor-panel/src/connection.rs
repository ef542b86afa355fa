//! Single WebSocket connection to a monitored service or agent hub.

use crate::error::{PanelError, Result};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;

/// Connection lifecycle event reported by the background socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Opened,
    Frame(String),
    Binary(usize),
    Error(String),
    Closed,
}

/// Socket event tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: u64,
    pub event: SocketEvent,
}

/// Connection configuration.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    /// Upper bound on the opening handshake. `None` leaves it to the network stack.
    pub connect_timeout: Option<Duration>,
}

/// Parse and check a WebSocket URL.
pub fn parse_ws_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim())?;
    if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
        return Err(PanelError::InvalidUrl(format!(
            "URL must use ws:// or wss:// scheme, got: {}",
            parsed.scheme()
        )));
    }
    Ok(parsed)
}

/// An opening or open WebSocket.
///
/// Opening happens on a background task; the caller learns the outcome from
/// [`SocketEvent::Opened`] or [`SocketEvent::Error`] followed by
/// [`SocketEvent::Closed`].
pub struct PanelConnection {
    url: Url,
    session: u64,
    writer: Arc<Mutex<Option<WsWriter>>>,
    task: Option<JoinHandle<()>>,
}

impl PanelConnection {
    /// Start opening `url`; events are sent to `events` wrapped by `wrap`.
    pub fn open<E, F>(
        url: &str,
        session: u64,
        config: ConnectionConfig,
        events: mpsc::UnboundedSender<E>,
        wrap: F,
    ) -> Result<Self>
    where
        E: Send + 'static,
        F: Fn(SessionEvent) -> E + Send + Sync + 'static,
    {
        let url = parse_ws_url(url)?;
        let writer: Arc<Mutex<Option<WsWriter>>> = Arc::new(Mutex::new(None));

        let task_writer = Arc::clone(&writer);
        let task_url = url.clone();
        let emit = move |event: SocketEvent| events.send(wrap(SessionEvent { session, event })).is_ok();

        let task = tokio::spawn(async move {
            let connected = match config.connect_timeout {
                Some(limit) => match timeout(limit, connect_async(task_url.as_str())).await {
                    Ok(result) => result.map_err(|error| PanelError::WebSocket(error.to_string())),
                    Err(_) => Err(PanelError::Timeout(format!(
                        "connection timeout after {limit:?}"
                    ))),
                },
                None => connect_async(task_url.as_str())
                    .await
                    .map_err(|error| PanelError::WebSocket(error.to_string())),
            };

            let (stream, _response) = match connected {
                Ok(connected) => connected,
                Err(error) => {
                    warn!("websocket connect to {} failed: {}", task_url, error);
                    emit(SocketEvent::Error(error.to_string()));
                    emit(SocketEvent::Closed);
                    return;
                }
            };

            let (sink, mut reader) = stream.split();
            *task_writer.lock().await = Some(sink);
            if !emit(SocketEvent::Opened) {
                return;
            }

            while let Some(frame) = reader.next().await {
                let forwarded = match frame {
                    Ok(Message::Text(text)) => emit(SocketEvent::Frame(text.to_string())),
                    Ok(Message::Binary(bytes)) => emit(SocketEvent::Binary(bytes.len())),
                    Ok(Message::Ping(payload)) => {
                        debug!("received ping from {} ({} bytes)", task_url, payload.len());
                        true
                    }
                    Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => true,
                    Ok(Message::Close(_)) => break,
                    Err(error) => {
                        warn!("websocket read error on {}: {}", task_url, error);
                        emit(SocketEvent::Error(error.to_string()));
                        break;
                    }
                };
                if !forwarded {
                    break;
                }
            }

            task_writer.lock().await.take();
            emit(SocketEvent::Closed);
        });

        Ok(Self {
            url,
            session,
            writer,
            task: Some(task),
        })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Whether the handshake finished and the writer is still live.
    pub async fn is_open(&self) -> bool {
        self.writer.lock().await.is_some()
    }

    /// Send one text frame.
    pub async fn send_text(&self, text: String) -> Result<()> {
        let mut writer_guard = self.writer.lock().await;
        let writer = writer_guard.as_mut().ok_or(PanelError::NotConnected)?;
        writer
            .send(Message::Text(text))
            .await
            .map_err(|error| PanelError::WebSocket(error.to_string()))
    }

    /// Send a close frame and stop the reader. No further events are reported.
    pub async fn close(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(mut writer) = self.writer.lock().await.take()
            && let Err(error) = writer.send(Message::Close(None)).await
        {
            debug!("close frame to {} not delivered: {}", self.url, error);
        }
    }
}

impl Drop for PanelConnection {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
