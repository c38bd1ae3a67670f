// Persistent push channel to the backend (WebSocket, JSON named events)

use crate::aggregator::MetricsAggregator;
use crate::models::{ConnectionStatus, LogLevel, ServerEvent, now_ms};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Queue capacity for inbound events awaiting dispatch.
const EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed event: {0}")]
    Protocol(String),
    #[error("channel not connected")]
    NotConnected,
}

/// Single handshake attempt under an explicit deadline. Shared by the
/// telemetry client and the stress harness's ephemeral connections.
pub async fn open_channel(ws_url: &str, connect_timeout: Duration) -> Result<WsStream, ChannelError> {
    match timeout(connect_timeout, connect_async(ws_url)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(ChannelError::Transport(e)),
        Err(_) => Err(ChannelError::Timeout(connect_timeout)),
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerEventPayload {
    game_id: String,
    player_id: String,
}

#[derive(Debug, Deserialize)]
struct PongPayload {
    timestamp: f64,
}

#[derive(Debug, Deserialize)]
struct WelcomePayload {
    #[serde(default)]
    message: Option<String>,
}

/// Decode one inbound frame. An unknown event name is `Unrecognized`, not an
/// error; a known name with a payload of the wrong shape is a protocol error.
pub fn decode_event(frame: &str) -> Result<ServerEvent, ChannelError> {
    let envelope: Envelope = serde_json::from_str(frame)
        .map_err(|e| ChannelError::Protocol(format!("bad envelope: {e}")))?;
    let Envelope { event, data } = envelope;
    let mismatch = |e: serde_json::Error| ChannelError::Protocol(format!("{event} payload: {e}"));
    match event.as_str() {
        "welcome" => {
            let payload: WelcomePayload = serde_json::from_value(data).map_err(mismatch)?;
            Ok(ServerEvent::Welcome {
                message: payload.message.unwrap_or_default(),
            })
        }
        "pong" => {
            let payload: PongPayload = serde_json::from_value(data).map_err(mismatch)?;
            Ok(ServerEvent::Pong {
                timestamp: payload.timestamp,
            })
        }
        "player_count" => {
            let count: u64 = serde_json::from_value(data).map_err(mismatch)?;
            Ok(ServerEvent::PlayerCount { count })
        }
        "player_joined" => {
            let payload: PlayerEventPayload = serde_json::from_value(data).map_err(mismatch)?;
            Ok(ServerEvent::PlayerJoined {
                game_id: payload.game_id,
                player_id: payload.player_id,
            })
        }
        "player_left" => {
            let payload: PlayerEventPayload = serde_json::from_value(data).map_err(mismatch)?;
            Ok(ServerEvent::PlayerLeft {
                game_id: payload.game_id,
                player_id: payload.player_id,
            })
        }
        _ => Ok(ServerEvent::Unrecognized { name: event.clone() }),
    }
}

enum ChannelSignal {
    Frame(String),
    Dropped(String),
}

/// Client side of the push channel. One handshake attempt per `connect`
/// call; the orchestrator decides when to retry. Inbound frames flow
/// through a single-consumer queue so state mutation stays ordered and
/// off the socket read path.
pub struct TelemetryClient {
    ws_url: String,
    connect_timeout: Duration,
    aggregator: Arc<MetricsAggregator>,
    writer: Mutex<Option<WsSink>>,
    reader: Mutex<Option<tokio::task::JoinHandle<()>>>,
    event_tx: mpsc::Sender<ChannelSignal>,
}

impl TelemetryClient {
    /// Spawns the dispatch task; must be called from within a runtime.
    pub fn new(
        ws_url: String,
        connect_timeout: Duration,
        aggregator: Arc<MetricsAggregator>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        tokio::spawn(dispatch(event_rx, aggregator.clone()));
        Self {
            ws_url,
            connect_timeout,
            aggregator,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            event_tx,
        }
    }

    /// One handshake attempt. No-op when already connected; on failure the
    /// connection state moves to `error` and the caller retries later.
    pub async fn connect(&self) -> Result<(), ChannelError> {
        if self.aggregator.connection_status() == ConnectionStatus::Connected {
            return Ok(());
        }
        self.aggregator.mark_connecting();
        match open_channel(&self.ws_url, self.connect_timeout).await {
            Ok(stream) => {
                let (sink, source) = stream.split();
                *self.writer.lock().await = Some(sink);
                let mut reader = self.reader.lock().await;
                if let Some(stale) = reader.take() {
                    stale.abort();
                }
                *reader = Some(tokio::spawn(read_loop(source, self.event_tx.clone())));
                self.aggregator.mark_connected();
                self.aggregator.append_log(
                    LogLevel::Success,
                    "channel",
                    format!("connected to {}", self.ws_url),
                );
                Ok(())
            }
            Err(e) => {
                self.aggregator.mark_connect_error(e.to_string());
                self.aggregator
                    .append_log(LogLevel::Error, "channel", format!("connect failed: {e}"));
                Err(e)
            }
        }
    }

    /// Tear down the channel; no-op when already disconnected.
    pub async fn disconnect(&self) {
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        if let Some(mut sink) = self.writer.lock().await.take() {
            let _ = sink.close().await;
            self.aggregator.mark_disconnected();
            self.aggregator
                .append_log(LogLevel::Warning, "channel", "disconnected from backend");
        }
    }

    /// Emit a ping carrying the current epoch-ms timestamp; the matching
    /// pong produces a latency sample.
    pub async fn send_ping(&self) -> Result<(), ChannelError> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(ChannelError::NotConnected)?;
        let frame = serde_json::json!({
            "event": "ping",
            "data": { "timestamp": now_ms() },
        });
        sink.send(Message::Text(frame.to_string().into())).await?;
        Ok(())
    }
}

async fn read_loop(mut source: SplitStream<WsStream>, tx: mpsc::Sender<ChannelSignal>) {
    while let Some(item) = source.next().await {
        match item {
            Ok(Message::Text(frame)) => {
                if tx.send(ChannelSignal::Frame(frame.to_string())).await.is_err() {
                    return;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                let _ = tx.send(ChannelSignal::Dropped(e.to_string())).await;
                return;
            }
        }
    }
    let _ = tx.send(ChannelSignal::Dropped("closed by server".into())).await;
}

/// Single consumer of the event queue: decodes frames and applies pure
/// state mutation, preserving arrival order.
async fn dispatch(mut rx: mpsc::Receiver<ChannelSignal>, aggregator: Arc<MetricsAggregator>) {
    while let Some(signal) = rx.recv().await {
        match signal {
            ChannelSignal::Frame(frame) => match decode_event(&frame) {
                Ok(event) => apply_event(&aggregator, event),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed channel event");
                    aggregator.append_log(
                        LogLevel::Warning,
                        "channel",
                        format!("malformed event: {e}"),
                    );
                }
            },
            ChannelSignal::Dropped(reason) => {
                aggregator.mark_disconnected();
                aggregator.append_log(
                    LogLevel::Error,
                    "channel",
                    format!("connection lost: {reason}"),
                );
            }
        }
    }
}

fn apply_event(aggregator: &MetricsAggregator, event: ServerEvent) {
    match event {
        ServerEvent::Welcome { message } => {
            aggregator.append_log(
                LogLevel::Success,
                "channel",
                format!("server welcome: {message}"),
            );
        }
        ServerEvent::Pong { timestamp } => {
            let latency_ms = (now_ms() as f64 - timestamp).max(0.0);
            aggregator.record_latency(latency_ms);
            aggregator.append_log(LogLevel::Info, "channel", format!("ping: {latency_ms:.1}ms"));
        }
        ServerEvent::PlayerCount { count } => {
            aggregator.record_player_count(count);
            aggregator.append_log(
                LogLevel::Info,
                "channel",
                format!("player count updated: {count}"),
            );
        }
        ServerEvent::PlayerJoined { game_id, player_id } => {
            aggregator.upsert_game_session(&game_id, 1);
            aggregator.append_log(
                LogLevel::Success,
                "channel",
                format!("player {player_id} joined {game_id}"),
            );
        }
        ServerEvent::PlayerLeft { game_id, player_id } => {
            aggregator.upsert_game_session(&game_id, -1);
            aggregator.append_log(
                LogLevel::Warning,
                "channel",
                format!("player {player_id} left {game_id}"),
            );
        }
        ServerEvent::Unrecognized { name } => {
            aggregator.append_log(LogLevel::Info, "channel", format!("unrecognized event: {name}"));
        }
    }
}
