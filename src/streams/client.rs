use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

use super::command::{decode_frame, LogCommand};
use crate::action::CorrelationToken;
use crate::error::{ActionError, Result};

/// Events a log stream reports to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum LogStreamEvent {
    Connected,
    Command(LogCommand),
    /// Connection ended without an explicit close from our side
    Disconnected(Option<String>),
    Error(String),
}

/// Callback invoked synchronously, in arrival order, for every stream event
pub type CommandSink = Arc<dyn Fn(LogStreamEvent) + Send + Sync>;

/// Opens log streams for correlation tokens
pub trait LogStreamOpener: Send + Sync {
    fn open(&self, token: &CorrelationToken, sink: CommandSink) -> Box<dyn LogStream>;
}

/// Handle to one open log stream
pub trait LogStream: Send {
    /// Close the stream. Closing twice is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Derive the stream endpoint from the admin page URL.
///
/// `http://host:8000/admin/user/list` becomes
/// `ws://host:8000/admin/ws/action_log/<token>`.
pub fn log_stream_url(page_url: &Url, token: &CorrelationToken) -> Result<Url> {
    let scheme = match page_url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(ActionError::UnsupportedScheme(other.to_string())),
    };
    let host = page_url
        .host_str()
        .ok_or_else(|| ActionError::MissingHost(page_url.to_string()))?;
    let port = page_url
        .port()
        .map(|p| format!(":{}", p))
        .unwrap_or_default();
    let prefix = page_url
        .path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|segment| !segment.is_empty())
        .map(|segment| format!("/{}", segment))
        .unwrap_or_default();

    let raw = format!("{}://{}{}{}/ws/action_log/{}", scheme, host, port, prefix, token);
    Url::parse(&raw).map_err(|e| ActionError::invalid_url(&raw, e))
}

/// Opens WebSocket log streams relative to a fixed admin page URL
pub struct WebSocketOpener {
    page_url: Url,
}

impl WebSocketOpener {
    /// Fails early when the page URL cannot host a stream endpoint
    pub fn new(page_url: Url) -> Result<Self> {
        log_stream_url(&page_url, &CorrelationToken::mint())?;
        Ok(Self { page_url })
    }
}

impl LogStreamOpener for WebSocketOpener {
    fn open(&self, token: &CorrelationToken, sink: CommandSink) -> Box<dyn LogStream> {
        match log_stream_url(&self.page_url, token) {
            Ok(url) => Box::new(LogStreamClient::open(url, sink)),
            Err(e) => {
                tracing::warn!("Cannot derive log stream URL: {}", e);
                sink(LogStreamEvent::Error(e.to_string()));
                Box::new(LogStreamClient::closed())
            }
        }
    }
}

/// One WebSocket connection delivering [`LogCommand`]s for one invocation
pub struct LogStreamClient {
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl LogStreamClient {
    /// Connect in the background. Must be called inside a tokio runtime.
    pub fn open(url: Url, sink: CommandSink) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            Self::run_connection(url, sink, shutdown_rx).await;
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// A handle that was never connected
    pub fn closed() -> Self {
        Self {
            shutdown_tx: None,
        }
    }

    async fn run_connection(url: Url, sink: CommandSink, mut shutdown_rx: mpsc::Receiver<()>) {
        tracing::debug!("Connecting log stream {}", url);

        let connect_result = tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::debug!("Log stream closed before connecting");
                return;
            }
            result = connect_async(url.as_str()) => result,
        };

        let ws_stream = match connect_result {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                tracing::warn!("Log stream connection to {} failed: {}", url, e);
                sink(LogStreamEvent::Error(e.to_string()));
                return;
            }
        };

        sink(LogStreamEvent::Connected);
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                signal = shutdown_rx.recv() => {
                    // None means the handle was dropped without closing: abandon quietly
                    if signal.is_some() {
                        let _ = write.send(WsMessage::Close(None)).await;
                    }
                    break;
                }
                msg_opt = read.next() => {
                    match msg_opt {
                        Some(Ok(msg)) => {
                            if !Self::handle_message(msg, &sink) {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!("Log stream error: {}", e);
                            sink(LogStreamEvent::Disconnected(Some(e.to_string())));
                            break;
                        }
                        None => {
                            sink(LogStreamEvent::Disconnected(Some("Connection closed".to_string())));
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!("Log stream {} finished", url);
    }

    /// Returns false once the server has closed the connection
    fn handle_message(msg: WsMessage, sink: &CommandSink) -> bool {
        let text = match msg {
            WsMessage::Text(t) => t.to_string(),
            WsMessage::Binary(b) => match String::from_utf8(b.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    tracing::warn!("Dropping non UTF-8 log stream frame");
                    return true;
                }
            },
            WsMessage::Close(_) => {
                sink(LogStreamEvent::Disconnected(Some("Close frame received".to_string())));
                return false;
            }
            _ => return true,
        };

        match decode_frame(&text) {
            Ok(command) => {
                tracing::trace!("Log stream command: {}", command.tag());
                sink(LogStreamEvent::Command(command));
            }
            Err(e) => {
                tracing::warn!(
                    "Dropping malformed log stream frame: {} - {}",
                    e,
                    text.chars().take(100).collect::<String>()
                );
            }
        }
        true
    }
}

impl LogStream for LogStreamClient {
    fn close(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
    }

    fn is_open(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}
