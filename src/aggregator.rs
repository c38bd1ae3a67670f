// Bounded in-memory telemetry state; the only resource shared across tasks.

use crate::models::{
    ConnectionState, ConnectionStatus, DatabaseStatus, GameSession, LogEntry, LogLevel,
    MonitorSnapshot, PerformanceSample, ServerHealth, game_display_name, now_ms,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

pub struct MetricsAggregator {
    performance_capacity: usize,
    log_capacity: usize,
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    server_health: Option<ServerHealth>,
    database_status: Option<DatabaseStatus>,
    performance: VecDeque<PerformanceSample>,
    game_sessions: BTreeMap<String, GameSession>,
    activity: VecDeque<LogEntry>,
    connection: ConnectionState,
}

impl MetricsAggregator {
    pub fn new(performance_capacity: usize, log_capacity: usize) -> Self {
        Self {
            performance_capacity,
            log_capacity,
            inner: Mutex::new(State::default()),
        }
    }

    // A poisoned lock only means a writer panicked mid-append; the state
    // itself is still a valid set of plain values, so keep serving it.
    fn state(&self) -> MutexGuard<'_, State> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_server_health(&self, health: ServerHealth) {
        self.state().server_health = Some(health);
    }

    pub fn set_database_status(&self, status: DatabaseStatus) {
        self.state().database_status = Some(status);
    }

    pub fn append_performance_sample(&self, sample: PerformanceSample) {
        let mut state = self.state();
        if state.performance.len() == self.performance_capacity {
            state.performance.pop_front();
        }
        state.performance.push_back(sample);
    }

    /// Sample from a pong round-trip. Player counts carry over from the most
    /// recent sample so latency points don't zero out the player series.
    pub fn record_latency(&self, latency_ms: f64) {
        let (player_count, socket_connections) = {
            let state = self.state();
            state
                .performance
                .back()
                .map(|s| (s.player_count, s.socket_connections))
                .unwrap_or((0, 0))
        };
        self.append_performance_sample(PerformanceSample {
            latency_ms,
            player_count,
            socket_connections,
            captured_at: now_ms(),
        });
    }

    /// Sample from a `player_count` broadcast (no latency measurement).
    pub fn record_player_count(&self, count: u64) {
        self.append_performance_sample(PerformanceSample {
            latency_ms: 0.0,
            player_count: count,
            socket_connections: count,
            captured_at: now_ms(),
        });
    }

    pub fn append_log(&self, level: LogLevel, source: &str, message: impl Into<String>) {
        let entry = LogEntry {
            captured_at: now_ms(),
            level,
            message: message.into(),
            source: source.to_string(),
        };
        let mut state = self.state();
        if state.activity.len() == self.log_capacity {
            state.activity.pop_front();
        }
        state.activity.push_back(entry);
    }

    /// Apply a signed player delta to a game session, creating the session
    /// on first sight. Player counts never go below zero.
    pub fn upsert_game_session(&self, game_id: &str, delta: i64) {
        let mut state = self.state();
        match state.game_sessions.get_mut(game_id) {
            Some(session) => {
                session.player_count = (session.player_count as i64 + delta).max(0) as u64;
                session.last_updated = now_ms();
            }
            None => {
                state.game_sessions.insert(
                    game_id.to_string(),
                    GameSession {
                        game_id: game_id.to_string(),
                        name: game_display_name(game_id),
                        player_count: delta.max(0) as u64,
                        active: true,
                        last_updated: now_ms(),
                    },
                );
            }
        }
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.state().connection.status
    }

    pub fn mark_connecting(&self) {
        let mut state = self.state();
        match state.connection.status {
            ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                state.connection.status = ConnectionStatus::Connecting;
            }
            other => tracing::debug!(from = ?other, "ignoring connecting transition"),
        }
    }

    pub fn mark_connected(&self) {
        let mut state = self.state();
        match state.connection.status {
            ConnectionStatus::Connecting => {
                state.connection.status = ConnectionStatus::Connected;
                state.connection.reconnect_attempts = 0;
                state.connection.last_connected_at = Some(now_ms());
                state.connection.last_error = None;
            }
            other => tracing::debug!(from = ?other, "ignoring connected transition"),
        }
    }

    pub fn mark_connect_error(&self, error: impl Into<String>) {
        let mut state = self.state();
        match state.connection.status {
            ConnectionStatus::Connecting => {
                state.connection.status = ConnectionStatus::Error;
                state.connection.reconnect_attempts += 1;
                state.connection.last_error = Some(error.into());
            }
            other => tracing::debug!(from = ?other, "ignoring error transition"),
        }
    }

    pub fn mark_disconnected(&self) {
        let mut state = self.state();
        match state.connection.status {
            ConnectionStatus::Connected => {
                state.connection.status = ConnectionStatus::Disconnected;
            }
            other => tracing::debug!(from = ?other, "ignoring disconnect transition"),
        }
    }

    /// Deep, independent copy of the current state; later aggregator
    /// mutation never alters a snapshot already handed out.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.state();
        MonitorSnapshot {
            captured_at: now_ms(),
            connection: state.connection.clone(),
            server_health: state.server_health.clone(),
            database_status: state.database_status.clone(),
            performance: state.performance.iter().cloned().collect(),
            game_sessions: state.game_sessions.clone(),
            activity: state.activity.iter().cloned().collect(),
        }
    }

    /// Drop all buffered telemetry (graceful-shutdown teardown).
    pub fn clear(&self) {
        let mut state = self.state();
        state.server_health = None;
        state.database_status = None;
        state.performance.clear();
        state.game_sessions.clear();
        state.activity.clear();
    }
}
