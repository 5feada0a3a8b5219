//! Wire types as the client sees them.

use chrono::{DateTime, Utc};
use corral_common::ContainerStatus;
use serde::{Deserialize, Serialize};

/// Parameters for creating a container.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateOptions {
    /// Container name; the daemon picks one when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Program and arguments.
    pub cmd: Vec<String>,
    /// Environment as `KEY=VALUE` strings.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    /// Stop timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_timeout: Option<u64>,
}

impl CreateOptions {
    /// Options for running `cmd`.
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set the container name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push(format!("{key}={value}"));
        self
    }
}

/// Reply to a create request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateResponse {
    /// Full ID of the new container.
    pub id: String,
    /// Non-fatal problems.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Runtime state of a container.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    /// Current status.
    pub status: ContainerStatus,
    /// True while running.
    pub running: bool,
    /// True while paused.
    pub paused: bool,
    /// Exit code of the last run, or -1.
    pub exit_code: i32,
    /// Process ID, 0 when none.
    pub pid: u32,
    /// Start of the current or last run.
    pub started_at: Option<DateTime<Utc>>,
    /// End of the last run.
    pub finished_at: Option<DateTime<Utc>>,
}

/// Creation parameters echoed back by inspect.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    /// Program and arguments.
    pub cmd: Vec<String>,
}

/// Full view of one container.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspect {
    /// Full ID.
    pub id: String,
    /// Name.
    pub name: String,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Runtime state.
    pub state: ContainerState,
    /// Creation parameters.
    pub config: ContainerConfig,
}

/// One entry of a container listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    /// Full ID.
    pub id: String,
    /// Names.
    pub names: Vec<String>,
    /// Command line.
    pub command: String,
    /// Creation time as a Unix timestamp.
    pub created: i64,
    /// Current status.
    pub state: ContainerStatus,
    /// Exit code of the last run, or -1.
    pub exit_code: i32,
}

/// Result of a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitResponse {
    /// Exit code if the wait ended on `exited`, otherwise -1.
    pub exit_code: i32,
    /// The status that ended the wait.
    pub status: ContainerStatus,
}

/// Daemon version information.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionInfo {
    /// Daemon version.
    pub version: String,
    /// Current API version.
    pub api_version: String,
    /// All accepted API versions.
    #[serde(default)]
    pub supported_api_versions: Vec<String>,
    /// Operating system.
    pub os: String,
    /// CPU architecture.
    pub arch: String,
}
