//! Daemon configuration file.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use corral::runtime::EngineConfig;
use corral_common::StatusPolicy;
use serde::{Deserialize, Serialize};

/// Which process supervisor backs the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorKind {
    /// Host processes.
    #[default]
    Native,
    /// In-memory processes, for demos and tests.
    Simulated,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Settings read from `corrald.toml`. Command-line flags override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Address to listen on.
    pub listen: SocketAddr,
    /// Process supervisor.
    pub supervisor: SupervisorKind,
    /// How invalid transitions are reported.
    pub status_policy: StatusPolicy,
    /// Default stop timeout in seconds.
    pub stop_timeout: u64,
    /// Wait after SIGKILL in seconds.
    pub kill_grace: u64,
    /// Runtime event channel capacity.
    pub event_capacity: usize,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            supervisor: SupervisorKind::default(),
            status_policy: StatusPolicy::default(),
            stop_timeout: 10,
            kill_grace: 5,
            event_capacity: 1024,
            log_format: LogFormat::default(),
        }
    }
}

impl DaemonConfig {
    /// Load a config file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid TOML for this type.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse TOML.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or unknown keys.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Engine settings derived from this config.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_stop_timeout(Duration::from_secs(self.stop_timeout))
            .with_kill_grace(Duration::from_secs(self.kill_grace))
            .with_event_capacity(self.event_capacity)
    }
}
