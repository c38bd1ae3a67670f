// Orchestrator: owns the client, poller, and aggregator; drives the tick loop.

use crate::aggregator::MetricsAggregator;
use crate::channel::TelemetryClient;
use crate::config::MonitorConfig;
use crate::models::{ConnectionStatus, LogLevel, MonitorSnapshot};
use crate::poller::Poller;
use crate::probe::ApiProbe;
use crate::stress::{StressHarness, StressReport};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{Duration, interval};

pub struct Monitor {
    update_interval: Duration,
    aggregator: Arc<MetricsAggregator>,
    client: TelemetryClient,
    poller: Poller,
    stress: StressHarness,
    probe: ApiProbe,
}

impl Monitor {
    /// Construction is the only place configuration can fail; everything
    /// after the loop starts is recovered in place.
    pub fn new(config: MonitorConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let ws_url = config.ws_url()?;
        let connect_timeout = Duration::from_secs(config.backend.connect_timeout_secs);

        let aggregator = Arc::new(MetricsAggregator::new(
            config.buffers.performance_capacity,
            config.buffers.log_capacity,
        ));
        let client = TelemetryClient::new(ws_url.clone(), connect_timeout, aggregator.clone());
        let poller = Poller::new(
            &config.backend.url,
            Duration::from_secs(config.backend.poll_timeout_secs),
            aggregator.clone(),
        )?;
        let stress = StressHarness::new(
            ws_url,
            connect_timeout,
            Duration::from_millis(config.stress.stagger_ms),
            aggregator.clone(),
        );
        let probe = ApiProbe::new(
            &config.backend.url,
            Duration::from_secs(config.stress.probe_timeout_secs),
            aggregator.clone(),
        )?;

        Ok(Self {
            update_interval: Duration::from_secs(config.monitoring.update_interval_secs),
            aggregator,
            client,
            poller,
            stress,
            probe,
        })
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.aggregator.snapshot()
    }

    pub fn aggregator(&self) -> Arc<MetricsAggregator> {
        self.aggregator.clone()
    }

    /// Triggerable command (UI button, socket event). Refused while another
    /// run is in flight.
    pub async fn run_stress_test(&self, connection_count: usize, hold_secs: u64) -> StressReport {
        self.stress
            .run_stress_test(connection_count, Duration::from_secs(hold_secs))
            .await
    }

    pub async fn run_api_probe(&self) {
        self.probe.run().await;
    }

    /// Spawn the steady-state loop. Each tick reconnects the channel if
    /// needed, runs both health checks, and pings when connected; no tick
    /// failure ever stops the loop. The shutdown signal tears the channel
    /// down and clears the buffers.
    pub fn spawn(self: Arc<Self>, mut shutdown_rx: oneshot::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(self.update_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            self.aggregator
                .append_log(LogLevel::Info, "monitor", "monitoring loop started");
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        self.run_tick().await;
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("monitor shutting down");
                        break;
                    }
                }
            }
            self.client.disconnect().await;
            self.aggregator.clear();
        })
    }

    async fn run_tick(&self) {
        if self.aggregator.connection_status() != ConnectionStatus::Connected {
            if let Err(e) = self.client.connect().await {
                tracing::warn!(error = %e, operation = "connect", "channel connect failed");
            }
        }

        self.poller.poll().await;

        if self.aggregator.connection_status() == ConnectionStatus::Connected {
            if let Err(e) = self.client.send_ping().await {
                tracing::warn!(error = %e, operation = "send_ping", "ping failed");
                self.aggregator
                    .append_log(LogLevel::Error, "channel", format!("ping failed: {e}"));
            }
        }
    }
}
