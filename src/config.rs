use crate::blacklist::Blacklist;
use crate::diskstats_repo::{DEFAULT_DISKSTATS_PATH, DEFAULT_LABEL_DIR};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub publishing: PublishingConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of metric batches kept in the broadcast channel for /ws/metrics (slow clients may lag).
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub sample_interval_ms: u64,
    /// How often to log app stats (cycles run/failed, ws clients) at INFO level.
    pub stats_log_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_diskstats_path")]
    pub diskstats_path: String,
    /// Directory of label symlinks; empty string disables label lookup.
    #[serde(default = "default_label_dir")]
    pub label_dir: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            diskstats_path: default_diskstats_path(),
            label_dir: default_label_dir(),
        }
    }
}

fn default_diskstats_path() -> String {
    DEFAULT_DISKSTATS_PATH.into()
}

fn default_label_dir() -> String {
    DEFAULT_LABEL_DIR.into()
}

/// One independently-sampled check (own history, own metric stream).
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    pub name: String,
    /// Regex; matching device names produce no metrics at all.
    #[serde(default)]
    pub device_blacklist_re: Option<String>,
}

impl InstanceConfig {
    pub fn blacklist(&self) -> anyhow::Result<Blacklist> {
        Blacklist::new(self.device_blacklist_re.as_deref()).map_err(|e| {
            anyhow::anyhow!(
                "instances.{}.device_blacklist_re is not a valid pattern: {}",
                self.name,
                e
            )
        })
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.server.host.is_empty(), "server.host must be non-empty");
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        anyhow::ensure!(
            self.monitoring.sample_interval_ms > 0,
            "monitoring.sample_interval_ms must be > 0, got {}",
            self.monitoring.sample_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        anyhow::ensure!(
            !self.source.diskstats_path.is_empty(),
            "source.diskstats_path must be non-empty"
        );
        anyhow::ensure!(
            !self.instances.is_empty(),
            "at least one [[instances]] entry is required"
        );
        let mut seen = HashSet::new();
        for instance in &self.instances {
            anyhow::ensure!(
                !instance.name.is_empty(),
                "instances.name must be non-empty"
            );
            anyhow::ensure!(
                seen.insert(instance.name.as_str()),
                "instances.name must be unique, '{}' appears more than once",
                instance.name
            );
            instance.blacklist()?;
        }
        Ok(())
    }
}
