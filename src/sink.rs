// Presentation sinks pull snapshots at their own cadence

use crate::models::{ConnectionStatus, MonitorSnapshot};
use std::io::Write;

/// A renderer for monitor snapshots. Which sink runs (terminal, web, ...)
/// is decided at construction time, not inside the core.
pub trait PresentationSink {
    fn render(&mut self, snapshot: &MonitorSnapshot) -> anyhow::Result<()>;
}

pub fn format_uptime(secs: u64) -> String {
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Compact plain-terminal status block.
pub struct TermSink;

impl TermSink {
    pub fn new() -> Self {
        Self
    }

    fn write_to(&self, w: &mut impl Write, snapshot: &MonitorSnapshot) -> std::io::Result<()> {
        writeln!(w, "{}", "=".repeat(60))?;
        writeln!(
            w,
            "Gaming Platform Monitor - {}",
            chrono::Local::now().format("%H:%M:%S")
        )?;
        writeln!(w, "{}", "=".repeat(60))?;

        let status = match snapshot.connection.status {
            ConnectionStatus::Connected => "CONNECTED",
            ConnectionStatus::Connecting => "CONNECTING",
            ConnectionStatus::Error => "ERROR",
            ConnectionStatus::Disconnected => "DISCONNECTED",
        };
        writeln!(w, "Connection: {status}")?;

        if let Some(health) = &snapshot.server_health {
            writeln!(
                w,
                "Server: {} | Uptime: {} | Users: {}",
                health.status,
                format_uptime(health.uptime_secs),
                health.connected_users
            )?;
        }
        if let Some(db) = &snapshot.database_status {
            writeln!(
                w,
                "Database: primary:{} | cache:{}",
                db.primary_store, db.cache_store
            )?;
        }
        if let Some(latest) = snapshot.performance.last() {
            writeln!(
                w,
                "Performance: {} players | {:.1}ms latency",
                latest.player_count, latest.latency_ms
            )?;
        }

        writeln!(w, "\nRecent Activity:")?;
        let skip = snapshot.activity.len().saturating_sub(5);
        for entry in snapshot.activity.iter().skip(skip) {
            writeln!(w, "  [{}] {}", entry.source, entry.message)?;
        }
        Ok(())
    }
}

impl Default for TermSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationSink for TermSink {
    fn render(&mut self, snapshot: &MonitorSnapshot) -> anyhow::Result<()> {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        self.write_to(&mut lock, snapshot)?;
        Ok(())
    }
}
