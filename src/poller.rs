// Request/response health checks against the backend's REST surface

use crate::aggregator::MetricsAggregator;
use crate::models::{DatabaseStatus, LogLevel, ServerHealth, now_ms};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use tracing::instrument;

pub struct Poller {
    http: reqwest::Client,
    health_url: String,
    db_url: String,
    aggregator: Arc<MetricsAggregator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    uptime: u64,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    connected_users: u64,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseSection {
    #[serde(default)]
    primary: Option<String>,
    #[serde(default)]
    cache: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DbHealthResponse {
    #[serde(default)]
    databases: DatabaseSection,
    #[serde(default)]
    features: BTreeMap<String, bool>,
}

/// Concise cause string; timeouts are called out distinctly from other
/// transport failures.
fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".into()
    } else if e.is_status() {
        match e.status() {
            Some(code) => format!("HTTP {code}"),
            None => e.to_string(),
        }
    } else {
        e.to_string()
    }
}

impl Poller {
    pub fn new(
        backend_url: &str,
        poll_timeout: Duration,
        aggregator: Arc<MetricsAggregator>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(poll_timeout).build()?;
        let base = backend_url.trim_end_matches('/');
        Ok(Self {
            http,
            health_url: format!("{base}/health"),
            db_url: format!("{base}/health-db"),
            aggregator,
        })
    }

    /// Both checks run each invocation; a failure on either logs an error
    /// and leaves the previous snapshot untouched (stale-but-present).
    pub async fn poll(&self) {
        self.fetch_server_health().await;
        self.fetch_database_status().await;
    }

    #[instrument(skip(self), fields(operation = "fetch_server_health"))]
    async fn fetch_server_health(&self) {
        let started = Instant::now();
        let result: Result<HealthResponse, reqwest::Error> = async {
            self.http
                .get(&self.health_url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .await;

        match result {
            Ok(body) => {
                let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.aggregator.set_server_health(ServerHealth {
                    status: body.status.unwrap_or_else(|| "Unknown".into()),
                    uptime_secs: body.uptime,
                    version: body.version.unwrap_or_else(|| "Unknown".into()),
                    connected_users: body.connected_users,
                    captured_at: now_ms(),
                    response_time_ms,
                });
            }
            Err(e) => {
                let cause = describe(&e);
                tracing::warn!(error = %e, "health check failed");
                self.aggregator.append_log(
                    LogLevel::Error,
                    "poller",
                    format!("failed to fetch server health: {cause}"),
                );
            }
        }
    }

    #[instrument(skip(self), fields(operation = "fetch_database_status"))]
    async fn fetch_database_status(&self) {
        let result: Result<DbHealthResponse, reqwest::Error> = async {
            self.http
                .get(&self.db_url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
        }
        .await;

        match result {
            Ok(body) => {
                self.aggregator.set_database_status(DatabaseStatus {
                    primary_store: body.databases.primary.unwrap_or_else(|| "unknown".into()),
                    cache_store: body.databases.cache.unwrap_or_else(|| "unknown".into()),
                    features: body.features,
                    captured_at: now_ms(),
                });
            }
            Err(e) => {
                let cause = describe(&e);
                tracing::warn!(error = %e, "database status check failed");
                self.aggregator.append_log(
                    LogLevel::Error,
                    "poller",
                    format!("failed to fetch database status: {cause}"),
                );
            }
        }
    }
}
