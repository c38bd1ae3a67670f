// Domain models (wire shapes follow the backend's JSON)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current time as epoch milliseconds (0 if the clock is before the epoch).
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHealth {
    pub status: String,
    pub uptime_secs: u64,
    pub version: String,
    pub connected_users: u64,
    pub captured_at: u64,
    /// Measured round-trip of the health request in milliseconds.
    pub response_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    pub primary_store: String,
    pub cache_store: String,
    pub features: BTreeMap<String, bool>,
    pub captured_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub latency_ms: f64,
    pub player_count: u64,
    pub socket_connections: u64,
    pub captured_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub game_id: String,
    pub name: String,
    pub player_count: u64,
    pub active: bool,
    pub last_updated: u64,
}

/// Activity log severity; serializes to lowercase JSON (e.g. "warning").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub captured_at: u64,
    pub level: LogLevel,
    pub message: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub reconnect_attempts: u32,
    pub last_connected_at: Option<u64>,
    pub last_error: Option<String>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            reconnect_attempts: 0,
            last_connected_at: None,
            last_error: None,
        }
    }
}

/// Immutable copy of the aggregator state at a point in time.
/// Performance samples and activity entries are ordered oldest to newest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub captured_at: u64,
    pub connection: ConnectionState,
    pub server_health: Option<ServerHealth>,
    pub database_status: Option<DatabaseStatus>,
    pub performance: Vec<PerformanceSample>,
    pub game_sessions: BTreeMap<String, GameSession>,
    pub activity: Vec<LogEntry>,
}

/// Inbound push-channel events. Anything the backend sends that we do not
/// model decodes to `Unrecognized` rather than failing the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Welcome { message: String },
    Pong { timestamp: f64 },
    PlayerCount { count: u64 },
    PlayerJoined { game_id: String, player_id: String },
    PlayerLeft { game_id: String, player_id: String },
    Unrecognized { name: String },
}

/// Display name for a game id, with a generic fallback for ids the
/// platform catalog does not know about.
pub fn game_display_name(game_id: &str) -> String {
    match game_id {
        "snake" => "Snake".into(),
        "memory" => "Memory".into(),
        "pong" => "Pong".into(),
        "tetris" => "Tetris".into(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => "Unknown Game".into(),
            }
        }
    }
}
