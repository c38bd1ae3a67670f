use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub buffers: BufferConfig,
    #[serde(default)]
    pub stress: StressConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_poll_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,
}

fn default_update_interval_secs() -> u64 {
    5
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BufferConfig {
    /// Max performance samples kept in memory (oldest evicted first).
    #[serde(default = "default_performance_capacity")]
    pub performance_capacity: usize,
    /// Max activity log entries kept in memory (oldest evicted first).
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_performance_capacity() -> usize {
    100
}

fn default_log_capacity() -> usize {
    500
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            performance_capacity: default_performance_capacity(),
            log_capacity: default_log_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StressConfig {
    /// Delay between ephemeral connection launches (avoids connection storms).
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_stagger_ms() -> u64 {
    200
}

fn default_probe_timeout_secs() -> u64 {
    5
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            stagger_ms: default_stagger_ms(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

impl MonitorConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: MonitorConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.backend.url)
            .map_err(|e| anyhow::anyhow!("backend.url is not a valid URL: {}", e))?;
        anyhow::ensure!(
            matches!(url.scheme(), "http" | "https"),
            "backend.url must use http or https, got {}",
            url.scheme()
        );
        anyhow::ensure!(url.host_str().is_some(), "backend.url must have a host");
        anyhow::ensure!(
            self.backend.poll_timeout_secs > 0,
            "backend.poll_timeout_secs must be > 0, got {}",
            self.backend.poll_timeout_secs
        );
        anyhow::ensure!(
            self.backend.connect_timeout_secs > 0,
            "backend.connect_timeout_secs must be > 0, got {}",
            self.backend.connect_timeout_secs
        );
        anyhow::ensure!(
            self.monitoring.update_interval_secs > 0,
            "monitoring.update_interval_secs must be > 0, got {}",
            self.monitoring.update_interval_secs
        );
        anyhow::ensure!(
            self.buffers.performance_capacity > 0,
            "buffers.performance_capacity must be > 0, got {}",
            self.buffers.performance_capacity
        );
        anyhow::ensure!(
            self.buffers.log_capacity > 0,
            "buffers.log_capacity must be > 0, got {}",
            self.buffers.log_capacity
        );
        anyhow::ensure!(
            self.stress.probe_timeout_secs > 0,
            "stress.probe_timeout_secs must be > 0, got {}",
            self.stress.probe_timeout_secs
        );
        Ok(())
    }

    /// Push-channel URL derived from the backend URL (http -> ws, https -> wss).
    pub fn ws_url(&self) -> anyhow::Result<String> {
        let mut url = Url::parse(&self.backend.url)?;
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| anyhow::anyhow!("cannot derive ws URL from {}", self.backend.url))?;
        Ok(url.to_string())
    }
}
