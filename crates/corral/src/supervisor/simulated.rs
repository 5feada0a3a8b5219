//! In-memory supervisor with no OS processes behind it.
//!
//! Processes run until signaled. SIGTERM and SIGKILL terminate them,
//! SIGSTOP/SIGCONT freeze and thaw them, and a SIGTERM sent to a frozen
//! process stays pending until it is thawed, as it would for a real
//! stopped process.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use corral_common::ContainerId;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};

use super::{
    ExitReport, ExitReporter, ExitStatus, ProcessHandle, ProcessSupervisor, Signal,
    SupervisorError, SupervisorResult,
};
use crate::runtime::ContainerConfig;

/// Supervisor operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorOp {
    /// Process start.
    Start,
    /// Freeze.
    Pause,
    /// Thaw.
    Resume,
    /// Signal delivery.
    Kill,
}

impl fmt::Display for SupervisorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::Kill => write!(f, "kill"),
        }
    }
}

#[derive(Debug, Default)]
struct Behavior {
    ignore_sigterm: bool,
    failing: HashSet<SupervisorOp>,
}

#[derive(Debug)]
struct SimProcess {
    id: ContainerId,
    frozen: bool,
    pending: Option<Signal>,
    exit: watch::Sender<Option<ExitStatus>>,
}

/// Supervisor that simulates container processes in memory.
#[derive(Debug)]
pub struct SimulatedSupervisor {
    next_pid: AtomicU32,
    processes: DashMap<u32, SimProcess>,
    behavior: RwLock<Behavior>,
    reporter: ExitReporter,
}

impl Default for SimulatedSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSupervisor {
    /// Create a supervisor whose processes honor SIGTERM.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU32::new(1000),
            processes: DashMap::new(),
            behavior: RwLock::new(Behavior::default()),
            reporter: ExitReporter::new(),
        }
    }

    /// Make processes ignore SIGTERM, forcing stop to escalate.
    pub fn set_ignore_sigterm(&self, ignore: bool) {
        self.behavior.write().ignore_sigterm = ignore;
    }

    /// Make an operation fail until [`Self::clear_failures`] is called.
    pub fn fail(&self, op: SupervisorOp) {
        self.behavior.write().failing.insert(op);
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        self.behavior.write().failing.clear();
    }

    /// Terminate a process as if it exited on its own.
    pub fn exit_process(&self, handle: ProcessHandle, status: ExitStatus) {
        self.terminate(handle.pid(), status);
    }

    /// Number of processes currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.processes.len()
    }

    fn check(&self, op: SupervisorOp) -> SupervisorResult<()> {
        if self.behavior.read().failing.contains(&op) {
            return Err(SupervisorError::Injected {
                operation: op,
                message: "simulated failure".to_string(),
            });
        }
        Ok(())
    }

    fn terminate(&self, pid: u32, status: ExitStatus) {
        let id = {
            let Some(process) = self.processes.get(&pid) else {
                return;
            };
            if process.exit.borrow().is_some() {
                return;
            }
            process.exit.send_replace(Some(status));
            process.id.clone()
        };

        tracing::debug!(pid, ?status, "simulated process exited");
        self.reporter.report(ExitReport {
            id,
            handle: ProcessHandle::new(pid),
            status,
        });
    }

    fn deliver(&self, pid: u32, signal: Signal) -> SupervisorResult<()> {
        let terminate_with = {
            let mut process = self
                .processes
                .get_mut(&pid)
                .ok_or(SupervisorError::NoSuchProcess { pid })?;

            if signal == Signal::STOP {
                process.frozen = true;
                None
            } else if signal == Signal::CONT {
                process.frozen = false;
                process.pending.take()
            } else if signal == Signal::KILL {
                Some(signal)
            } else if process.frozen {
                process.pending = Some(signal);
                None
            } else {
                Some(signal)
            }
        };

        if let Some(sig) = terminate_with {
            if sig == Signal::TERM && self.behavior.read().ignore_sigterm {
                return Ok(());
            }
            self.terminate(pid, ExitStatus::Signaled(sig.number()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessSupervisor for SimulatedSupervisor {
    async fn start(
        &self,
        id: &ContainerId,
        config: &ContainerConfig,
    ) -> SupervisorResult<ProcessHandle> {
        self.check(SupervisorOp::Start)?;
        if config.command.is_empty() {
            return Err(SupervisorError::EmptyCommand);
        }

        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        let (exit, _) = watch::channel(None);
        self.processes.insert(
            pid,
            SimProcess {
                id: id.clone(),
                frozen: false,
                pending: None,
                exit,
            },
        );

        tracing::debug!(container_id = %id, pid, "simulated process started");
        Ok(ProcessHandle::new(pid))
    }

    async fn pause(&self, handle: ProcessHandle) -> SupervisorResult<()> {
        self.check(SupervisorOp::Pause)?;
        self.deliver(handle.pid(), Signal::STOP)
    }

    async fn resume(&self, handle: ProcessHandle) -> SupervisorResult<()> {
        self.check(SupervisorOp::Resume)?;
        self.deliver(handle.pid(), Signal::CONT)
    }

    async fn kill(&self, handle: ProcessHandle, signal: Signal) -> SupervisorResult<()> {
        self.check(SupervisorOp::Kill)?;
        self.deliver(handle.pid(), signal)
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
            .map(|p| p.exit.subscribe())
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
