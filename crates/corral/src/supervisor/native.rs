#![allow(unsafe_code)]
//! Supervisor backed by host processes.
//!
//! Pause and resume use SIGSTOP/SIGCONT rather than a cgroup freezer, so
//! a paused process only sees SIGKILL until it is continued.

use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use corral_common::ContainerId;
use dashmap::DashMap;
use tokio::process::Command;
use tokio::sync::{mpsc, watch};

use super::{
    ExitReport, ExitReporter, ExitStatus, ProcessHandle, ProcessSupervisor, Signal,
    SupervisorError, SupervisorResult,
};
use crate::runtime::ContainerConfig;

/// Supervisor that runs container commands as host processes.
#[derive(Debug)]
pub struct NativeSupervisor {
    processes: DashMap<u32, watch::Receiver<Option<ExitStatus>>>,
    reporter: ExitReporter,
}

impl Default for NativeSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeSupervisor {
    /// Create a new native supervisor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            processes: DashMap::new(),
            reporter: ExitReporter::new(),
        }
    }

    fn signal(pid: u32, signal: Signal) -> SupervisorResult<()> {
        let raw = i32::try_from(pid).map_err(|_| SupervisorError::NoSuchProcess { pid })?;

        tracing::debug!(pid, %signal, "sending signal");
        // SAFETY: kill(2) has no memory-safety preconditions.
        if unsafe { libc::kill(raw, signal.number()) } != 0 {
            return Err(SupervisorError::Signal {
                pid,
                signal,
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    fn convert(status: std::process::ExitStatus) -> ExitStatus {
        match (status.code(), status.signal()) {
            (Some(code), _) => ExitStatus::Exited(code),
            (None, Some(sig)) => ExitStatus::Signaled(sig),
            (None, None) => ExitStatus::Exited(1),
        }
    }
}

#[async_trait]
impl ProcessSupervisor for NativeSupervisor {
    async fn start(
        &self,
        id: &ContainerId,
        config: &ContainerConfig,
    ) -> SupervisorResult<ProcessHandle> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or(SupervisorError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                command: program.clone(),
                source,
            })?;

        let pid = child.id().ok_or_else(|| SupervisorError::Spawn {
            command: program.clone(),
            source: std::io::Error::other("process exited before its pid was read"),
        })?;
        let handle = ProcessHandle::new(pid);

        let (tx, rx) = watch::channel(None);
        self.processes.insert(pid, rx);

        let reports = self.reporter.sender();
        let container_id = id.clone();
        tokio::spawn(async move {
            let status = match child.wait().await {
                Ok(status) => Self::convert(status),
                Err(e) => {
                    tracing::error!(pid, error = %e, "failed to reap container process");
                    ExitStatus::Exited(-1)
                }
            };
            tracing::debug!(container_id = %container_id, pid, ?status, "process exited");
            tx.send_replace(Some(status));
            let _ = reports.send(ExitReport {
                id: container_id,
                handle,
                status,
            });
        });

        tracing::info!(container_id = %id, pid, command = ?config.command, "spawned container process");
        Ok(handle)
    }

    async fn pause(&self, handle: ProcessHandle) -> SupervisorResult<()> {
        Self::signal(handle.pid(), Signal::STOP)
    }

    async fn resume(&self, handle: ProcessHandle) -> SupervisorResult<()> {
        Self::signal(handle.pid(), Signal::CONT)
    }

    async fn kill(&self, handle: ProcessHandle, signal: Signal) -> SupervisorResult<()> {
        Self::signal(handle.pid(), signal)
    }

    async fn wait_exit(
        &self,
        handle: ProcessHandle,
        timeout: Duration,
    ) -> SupervisorResult<Option<ExitStatus>> {
        let pid = handle.pid();
        let mut rx = self
            .processes
            .get(&pid)
            .map(|r| r.clone())
            .ok_or(SupervisorError::NoSuchProcess { pid })?;

        match tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(status)) => Ok(*status),
            Ok(Err(_)) => Err(SupervisorError::NoSuchProcess { pid }),
            Err(_) => Ok(None),
        }
    }

    async fn release(&self, handle: ProcessHandle) {
        self.processes.remove(&handle.pid());
    }

    fn take_exit_reports(&self) -> Option<mpsc::UnboundedReceiver<ExitReport>> {
        self.reporter.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_and_reaps_host_process() {
        let sup = NativeSupervisor::new();
        let config = ContainerConfig::new(vec!["sh".into(), "-c".into(), "exit 3".into()]);
        let handle = sup.start(&ContainerId::generate(), &config).await.unwrap();

        let status = sup
            .wait_exit(handle, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(status, Some(ExitStatus::Exited(3)));
    }

    #[tokio::test]
    async fn sigterm_yields_graceful_code() {
        let sup = NativeSupervisor::new();
        let config = ContainerConfig::new(vec!["sleep".into(), "30".into()]);
        let handle = sup.start(&ContainerId::generate(), &config).await.unwrap();

        sup.kill(handle, Signal::TERM).await.unwrap();
        let status = sup
            .wait_exit(handle, Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.code(), 143);
        sup.release(handle).await;
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let sup = NativeSupervisor::new();
        let err = sup
            .start(&ContainerId::generate(), &ContainerConfig::new(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::EmptyCommand));
    }
}
