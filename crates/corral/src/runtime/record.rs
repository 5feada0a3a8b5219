//! Per-container record and its public snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use corral_common::{ContainerId, ContainerName, ContainerStatus, EXIT_CODE_UNKNOWN};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use super::wait::Waiters;
use crate::supervisor::{ExitStatus, ProcessHandle};

/// What a container runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Requested name. One is derived from the ID when absent.
    pub name: Option<ContainerName>,
    /// Program and arguments.
    pub command: Vec<String>,
    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Per-container override of the engine stop timeout.
    #[serde(default)]
    pub stop_timeout: Option<Duration>,
}

impl ContainerConfig {
    /// Create a config running `command`.
    #[must_use]
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            ..Self::default()
        }
    }

    /// Set the container name.
    #[must_use]
    pub fn with_name(mut self, name: ContainerName) -> Self {
        self.name = Some(name);
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Override the stop timeout for this container.
    #[must_use]
    pub const fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }
}

/// Mutable state of one container, guarded by the entry lock.
#[derive(Debug)]
pub(crate) struct ContainerRecord {
    pub(crate) status: ContainerStatus,
    pub(crate) exit_code: i32,
    pub(crate) handle: Option<ProcessHandle>,
    pub(crate) config: ContainerConfig,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
    /// Set while a stop waits for the process outside the lock.
    pub(crate) stopping: bool,
    /// Exit reported by the supervisor while `stopping` was set.
    pub(crate) pending_exit: Option<ExitStatus>,
}

/// A container in the store.
///
/// Identity fields are immutable. Everything else lives in `record` and is
/// only touched with the lock held, which is what serializes transitions
/// on one container.
#[derive(Debug)]
pub(crate) struct ContainerEntry {
    pub(crate) id: ContainerId,
    pub(crate) name: ContainerName,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) record: Mutex<ContainerRecord>,
    pub(crate) waiters: Arc<Waiters>,
    /// Signaled, with the lock held, when `stopping` is cleared.
    pub(crate) stop_done: Notify,
}

impl ContainerEntry {
    pub(crate) fn new(id: ContainerId, name: ContainerName, config: ContainerConfig) -> Self {
        Self {
            id,
            name,
            created_at: Utc::now(),
            record: Mutex::new(ContainerRecord {
                status: ContainerStatus::Created,
                exit_code: EXIT_CODE_UNKNOWN,
                handle: None,
                config,
                started_at: None,
                finished_at: None,
                stopping: false,
                pending_exit: None,
            }),
            waiters: Arc::new(Waiters::default()),
            stop_done: Notify::new(),
        }
    }

    pub(crate) fn snapshot(&self, record: &ContainerRecord) -> ContainerSnapshot {
        ContainerSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            status: record.status,
            exit_code: record.exit_code,
            pid: record.handle.map(ProcessHandle::pid),
            command: record.config.command.clone(),
            created_at: self.created_at,
            started_at: record.started_at,
            finished_at: record.finished_at,
        }
    }
}

/// Point-in-time view of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    /// Full container ID.
    pub id: ContainerId,
    /// Container name.
    pub name: ContainerName,
    /// Current status.
    pub status: ContainerStatus,
    /// Exit code of the last run, or -1.
    pub exit_code: i32,
    /// Process ID while running or paused.
    pub pid: Option<u32>,
    /// Program and arguments.
    pub command: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Start time of the current or last run.
    pub started_at: Option<DateTime<Utc>>,
    /// Exit time of the last run.
    pub finished_at: Option<DateTime<Utc>>,
}
