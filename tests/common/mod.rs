// Shared test backend: axum stand-in for the game service

#![allow(dead_code)]

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

#[derive(Clone)]
struct BackendState {
    frames: broadcast::Sender<String>,
    kill: broadcast::Sender<()>,
    accepted: Arc<AtomicUsize>,
}

pub struct TestBackend {
    pub addr: SocketAddr,
    frames: broadcast::Sender<String>,
    kill: broadcast::Sender<()>,
    accepted: Arc<AtomicUsize>,
    server: tokio::task::JoinHandle<()>,
}

impl TestBackend {
    pub async fn spawn() -> TestBackend {
        let (frames, _) = broadcast::channel(64);
        let (kill, _) = broadcast::channel(4);
        let accepted = Arc::new(AtomicUsize::new(0));
        let state = BackendState {
            frames: frames.clone(),
            kill: kill.clone(),
            accepted: accepted.clone(),
        };
        let app = Router::new()
            .route("/", get(ws_upgrade))
            .route("/health", get(health))
            .route("/health-db", get(health_db))
            .route("/api/games", get(games))
            .route("/api/leaderboard", get(leaderboard))
            .route("/api/sessions", get(sessions))
            .route("/api/status", get(status))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        TestBackend {
            addr,
            frames,
            kill,
            accepted,
            server,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    /// Broadcast a named event to every connected push-channel client.
    pub fn push(&self, event: &str, data: serde_json::Value) {
        let _ = self
            .frames
            .send(json!({ "event": event, "data": data }).to_string());
    }

    /// Broadcast a raw frame (for malformed-input tests).
    pub fn push_raw(&self, frame: &str) {
        let _ = self.frames.send(frame.to_string());
    }

    /// Total websocket connections ever accepted.
    pub fn accepted_connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Stop accepting and drop every open socket (frees the port).
    pub fn shutdown(&self) {
        self.server.abort();
        let _ = self.kill.send(());
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<BackendState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: BackendState) {
    state.accepted.fetch_add(1, Ordering::SeqCst);
    let mut frames = state.frames.subscribe();
    let mut kill = state.kill.subscribe();
    let welcome = json!({
        "event": "welcome",
        "data": { "message": "welcome to the test backend" },
    })
    .to_string();
    if socket.send(Message::Text(welcome.into())).await.is_err() {
        return;
    }
    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        // Echo pings back as pongs carrying the same timestamp.
                        if let Ok(v) = serde_json::from_str::<serde_json::Value>(text.as_str())
                            && v.get("event").and_then(|e| e.as_str()) == Some("ping")
                        {
                            let ts = v
                                .get("data")
                                .and_then(|d| d.get("timestamp"))
                                .cloned()
                                .unwrap_or_else(|| json!(0));
                            let pong =
                                json!({ "event": "pong", "data": { "timestamp": ts } }).to_string();
                            if socket.send(Message::Text(pong.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            frame = frames.recv() => {
                match frame {
                    Ok(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                }
            }
            _ = kill.recv() => break,
        }
    }
}

async fn health() -> impl IntoResponse {
    axum::Json(json!({
        "status": "OK",
        "uptime": 120,
        "version": "1.0.0",
        "connectedUsers": 3,
    }))
}

async fn health_db() -> impl IntoResponse {
    axum::Json(json!({
        "status": "database-check",
        "databases": { "primary": "connected", "cache": "connected" },
        "features": {
            "userManagement": true,
            "sessionManagement": true,
            "scoreTracking": false,
        },
    }))
}

async fn games() -> impl IntoResponse {
    axum::Json(json!({ "availableGames": [{ "id": "snake" }, { "id": "pong" }] }))
}

async fn leaderboard() -> impl IntoResponse {
    axum::Json(json!({ "leaderboard": [] }))
}

async fn sessions() -> impl IntoResponse {
    axum::Json(json!({ "sessions": [{ "id": 1 }] }))
}

async fn status() -> impl IntoResponse {
    axum::Json(json!({ "status": "ok" }))
}
