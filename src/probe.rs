// On-demand probe of the backend's REST API surface

use crate::aggregator::MetricsAggregator;
use crate::models::LogLevel;
use std::sync::Arc;
use tokio::time::Duration;

/// Endpoints probed, with the response array that carries a useful count.
const ENDPOINTS: &[(&str, &str, Option<&str>)] = &[
    ("/api/games", "games API", Some("availableGames")),
    ("/api/leaderboard", "leaderboard API", Some("leaderboard")),
    ("/api/sessions", "sessions API", Some("sessions")),
    ("/api/status", "status API", None),
];

pub struct ApiProbe {
    http: reqwest::Client,
    base: String,
    aggregator: Arc<MetricsAggregator>,
}

impl ApiProbe {
    pub fn new(
        backend_url: &str,
        probe_timeout: Duration,
        aggregator: Arc<MetricsAggregator>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(probe_timeout).build()?;
        Ok(Self {
            http,
            base: backend_url.trim_end_matches('/').to_string(),
            aggregator,
        })
    }

    /// Hit every endpoint once, logging one entry per outcome. Read-only,
    /// so concurrent probes are allowed.
    pub async fn run(&self) {
        self.aggregator
            .append_log(LogLevel::Warning, "probe", "running API probe...");
        for &(path, name, count_key) in ENDPOINTS {
            let url = format!("{}{}", self.base, path);
            let result: Result<serde_json::Value, reqwest::Error> = async {
                self.http
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await
            }
            .await;
            match result {
                Ok(body) => {
                    let message = match count_key
                        .and_then(|key| body.get(key))
                        .and_then(|v| v.as_array())
                    {
                        Some(items) => format!("{name}: {} entries", items.len()),
                        None => format!("{name}: OK"),
                    };
                    self.aggregator.append_log(LogLevel::Success, "probe", message);
                }
                Err(e) => {
                    self.aggregator
                        .append_log(LogLevel::Error, "probe", format!("{name}: {e}"));
                }
            }
        }
        self.aggregator
            .append_log(LogLevel::Info, "probe", "API probe completed");
    }
}
