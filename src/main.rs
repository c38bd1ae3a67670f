use anyhow::Result;
use gamemon::sink::PresentationSink;
use gamemon::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

/// Bound on how long shutdown may take before the loop is abandoned.
const SHUTDOWN_TIMEOUT: tokio::time::Duration = tokio::time::Duration::from_secs(2);

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let config = config::MonitorConfig::load()?;
    tracing::info!(
        backend = %config.backend.url,
        interval_secs = config.monitoring.update_interval_secs,
        "{} v{} starting",
        version::NAME,
        version::VERSION
    );

    let monitor = Arc::new(monitor::Monitor::new(config)?);
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let mut monitor_handle = monitor.clone().spawn(shutdown_rx);

    let mut sink = sink::TermSink::new();
    let mut render_tick = tokio::time::interval(tokio::time::Duration::from_secs(1));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = render_tick.tick() => {
                if let Err(e) = sink.render(&monitor.snapshot()) {
                    tracing::warn!(error = %e, "render failed");
                }
            }
            _ = async {
                #[cfg(unix)]
                {
                    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                        Ok(s) => s,
                        Err(_) => {
                            let _ = tokio::signal::ctrl_c().await;
                            return;
                        }
                    };
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                #[cfg(not(unix))]
                {
                    let _ = tokio::signal::ctrl_c().await;
                }
            } => {
                tracing::info!("Received shutdown signal");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(());
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut monitor_handle)
        .await
        .is_err()
    {
        tracing::warn!("monitor did not stop within {:?}; aborting", SHUTDOWN_TIMEOUT);
        monitor_handle.abort();
    }

    Ok(())
}
