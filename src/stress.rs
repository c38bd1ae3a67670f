// Synthetic-load generator: fan out ephemeral channels, hold, fan in

use crate::aggregator::MetricsAggregator;
use crate::channel::{WsStream, open_channel};
use crate::models::LogLevel;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Duration;

pub struct StressHarness {
    ws_url: String,
    connect_timeout: Duration,
    stagger: Duration,
    aggregator: Arc<MetricsAggregator>,
    in_flight: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressReport {
    pub connected: usize,
    pub failed: usize,
    /// True when the run was refused because another was in flight.
    pub rejected: bool,
}

impl StressHarness {
    pub fn new(
        ws_url: String,
        connect_timeout: Duration,
        stagger: Duration,
        aggregator: Arc<MetricsAggregator>,
    ) -> Self {
        Self {
            ws_url,
            connect_timeout,
            stagger,
            aggregator,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Open `connection_count` ephemeral channels (staggered), hold them for
    /// `hold`, then tear every slot down sequentially. Exactly one connect
    /// log and one teardown log per slot, whatever happens to it. Only one
    /// run at a time; a second trigger is refused and makes no attempts.
    pub async fn run_stress_test(&self, connection_count: usize, hold: Duration) -> StressReport {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.aggregator.append_log(
                LogLevel::Warning,
                "stress",
                "stress test already in flight, ignoring trigger",
            );
            return StressReport {
                connected: 0,
                failed: 0,
                rejected: true,
            };
        }

        self.aggregator.append_log(
            LogLevel::Warning,
            "stress",
            format!("starting stress test with {connection_count} connections"),
        );

        // Fan out: every slot reaches connected-or-failed before the hold
        // timer starts. A failed slot never aborts its siblings.
        let mut tasks = Vec::with_capacity(connection_count);
        for i in 0..connection_count {
            let ws_url = self.ws_url.clone();
            let connect_timeout = self.connect_timeout;
            let stagger = self.stagger * i as u32;
            let aggregator = self.aggregator.clone();
            tasks.push(tokio::spawn(async move {
                tokio::time::sleep(stagger).await;
                match open_channel(&ws_url, connect_timeout).await {
                    Ok(stream) => {
                        aggregator.append_log(
                            LogLevel::Success,
                            "stress",
                            format!("stress client {} connected", i + 1),
                        );
                        Some(stream)
                    }
                    Err(e) => {
                        aggregator.append_log(
                            LogLevel::Error,
                            "stress",
                            format!("stress client {} connect failed: {e}", i + 1),
                        );
                        None
                    }
                }
            }));
        }

        let mut slots: Vec<Option<WsStream>> = Vec::with_capacity(connection_count);
        for (i, task) in tasks.into_iter().enumerate() {
            match task.await {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    self.aggregator.append_log(
                        LogLevel::Error,
                        "stress",
                        format!("stress client {} connect failed: {e}", i + 1),
                    );
                    slots.push(None);
                }
            }
        }
        let connected = slots.iter().filter(|s| s.is_some()).count();
        let failed = connection_count - connected;

        tokio::time::sleep(hold).await;

        // Fan in: best-effort sequential teardown of every slot, including
        // the ones that never connected.
        for (i, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(mut stream) => match stream.close(None).await {
                    Ok(()) => self.aggregator.append_log(
                        LogLevel::Warning,
                        "stress",
                        format!("stress client {} closed", i + 1),
                    ),
                    Err(e) => self.aggregator.append_log(
                        LogLevel::Error,
                        "stress",
                        format!("stress client {} close failed: {e}", i + 1),
                    ),
                },
                None => self.aggregator.append_log(
                    LogLevel::Info,
                    "stress",
                    format!("stress client {} had no open channel", i + 1),
                ),
            }
        }

        self.aggregator.append_log(
            LogLevel::Info,
            "stress",
            format!("stress test completed: {connected} connected, {failed} failed"),
        );
        self.in_flight.store(false, Ordering::SeqCst);
        StressReport {
            connected,
            failed,
            rejected: false,
        }
    }
}
