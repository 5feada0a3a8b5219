//! Process supervisor seam.
//!
//! The engine never touches OS processes itself. Everything that forks,
//! signals or reaps goes through a [`ProcessSupervisor`].

#[cfg(unix)]
mod native;
mod simulated;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use corral_common::{ContainerId, CorralError, GRACEFUL_STOP_EXIT_CODE};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::runtime::ContainerConfig;

#[cfg(unix)]
pub use native::NativeSupervisor;
pub use simulated::{SimulatedSupervisor, SupervisorOp};

/// Result type for supervisor calls.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Failures reported by a process supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The container has no command to run.
    #[error("no command configured")]
    EmptyCommand,

    /// The process could not be spawned.
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        /// Program that failed to start.
        command: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A signal could not be delivered.
    #[error("failed to send {signal} to pid {pid}: {source}")]
    Signal {
        /// Target process.
        pid: u32,
        /// Signal that was sent.
        signal: Signal,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The supervisor does not know this process.
    #[error("no such process: {pid}")]
    NoSuchProcess {
        /// The unknown pid.
        pid: u32,
    },

    /// A failure injected by the simulated supervisor.
    #[error("{operation} failed: {message}")]
    Injected {
        /// Operation that failed.
        operation: SupervisorOp,
        /// Description of the failure.
        message: String,
    },
}

impl From<SupervisorError> for CorralError {
    fn from(err: SupervisorError) -> Self {
        Self::internal(err.to_string())
    }
}

/// Opaque reference to a live container process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessHandle {
    pid: u32,
}

impl ProcessHandle {
    /// Wraps a process ID.
    #[must_use]
    pub const fn new(pid: u32) -> Self {
        Self { pid }
    }

    /// Returns the process ID.
    #[must_use]
    pub const fn pid(self) -> u32 {
        self.pid
    }
}

/// A POSIX signal number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signal(i32);

impl Signal {
    /// Hang up.
    pub const HUP: Self = Self(libc::SIGHUP);
    /// Interrupt.
    pub const INT: Self = Self(libc::SIGINT);
    /// Quit.
    pub const QUIT: Self = Self(libc::SIGQUIT);
    /// Forced termination.
    pub const KILL: Self = Self(libc::SIGKILL);
    /// User signal 1.
    pub const USR1: Self = Self(libc::SIGUSR1);
    /// User signal 2.
    pub const USR2: Self = Self(libc::SIGUSR2);
    /// Graceful termination.
    pub const TERM: Self = Self(libc::SIGTERM);
    /// Stop (freeze) the process.
    pub const STOP: Self = Self(libc::SIGSTOP);
    /// Continue a stopped process.
    pub const CONT: Self = Self(libc::SIGCONT);

    const NAMED: [(&'static str, Self); 9] = [
        ("HUP", Self::HUP),
        ("INT", Self::INT),
        ("QUIT", Self::QUIT),
        ("KILL", Self::KILL),
        ("USR1", Self::USR1),
        ("USR2", Self::USR2),
        ("TERM", Self::TERM),
        ("STOP", Self::STOP),
        ("CONT", Self::CONT),
    ];

    /// Returns the raw signal number.
    #[must_use]
    pub const fn number(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::NAMED.iter().find(|(_, s)| *s == *self) {
            Some((name, _)) => write!(f, "SIG{name}"),
            None => write!(f, "signal {}", self.0),
        }
    }
}

impl FromStr for Signal {
    type Err = CorralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<i32>() {
            return if (1..=64).contains(&n) {
                Ok(Self(n))
            } else {
                Err(CorralError::InvalidSignal {
                    value: s.to_string(),
                })
            };
        }

        let upper = s.to_ascii_uppercase();
        let name = upper.strip_prefix("SIG").unwrap_or(&upper);
        Self::NAMED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, sig)| *sig)
            .ok_or_else(|| CorralError::InvalidSignal {
                value: s.to_string(),
            })
    }
}

/// How a container process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The process called exit with this code.
    Exited(i32),
    /// The process was terminated by this signal number.
    Signaled(i32),
}

impl ExitStatus {
    /// Returns the exit code recorded for this termination.
    ///
    /// Signal deaths are reported shell-style as `128 + signal`; the
    /// graceful stop signal yields [`GRACEFUL_STOP_EXIT_CODE`].
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Signaled(sig) if sig == Signal::TERM.number() => GRACEFUL_STOP_EXIT_CODE,
            Self::Signaled(sig) => 128 + sig,
        }
    }
}

/// Unsolicited termination of a container process.
#[derive(Debug, Clone)]
pub struct ExitReport {
    /// Container the process belongs to.
    pub id: ContainerId,
    /// Process that exited.
    pub handle: ProcessHandle,
    /// How it exited.
    pub status: ExitStatus,
}

/// Process control capability used by the engine.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Spawn the container process.
    async fn start(
        &self,
        id: &ContainerId,
        config: &ContainerConfig,
    ) -> SupervisorResult<ProcessHandle>;

    /// Freeze the process.
    async fn pause(&self, handle: ProcessHandle) -> SupervisorResult<()>;

    /// Thaw a frozen process.
    async fn resume(&self, handle: ProcessHandle) -> SupervisorResult<()>;

    /// Deliver a signal.
    async fn kill(&self, handle: ProcessHandle, signal: Signal) -> SupervisorResult<()>;

    /// Wait up to `timeout` for the process to exit.
    ///
    /// Returns `None` if it is still alive when the timeout expires.
    async fn wait_exit(
        &self,
        handle: ProcessHandle,
        timeout: Duration,
    ) -> SupervisorResult<Option<ExitStatus>>;

    /// Forget a process whose exit has been recorded.
    async fn release(&self, handle: ProcessHandle);

    /// Take the stream of unsolicited exits. Returns `None` after the
    /// first call.
    fn take_exit_reports(&self) -> Option<mpsc::UnboundedReceiver<ExitReport>>;
}

/// Exit report channel shared by the supervisor implementations.
#[derive(Debug)]
pub(crate) struct ExitReporter {
    tx: mpsc::UnboundedSender<ExitReport>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<ExitReport>>>,
}

impl ExitReporter {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<ExitReport> {
        self.tx.clone()
    }

    pub(crate) fn report(&self, report: ExitReport) {
        // Nobody listening is fine
        let _ = self.tx.send(report);
    }

    pub(crate) fn take(&self) -> Option<mpsc::UnboundedReceiver<ExitReport>> {
        self.rx.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(ExitStatus::Exited(0).code(), 0);
        assert_eq!(ExitStatus::Exited(3).code(), 3);
        assert_eq!(ExitStatus::Signaled(libc::SIGTERM).code(), 143);
        assert_eq!(ExitStatus::Signaled(libc::SIGKILL).code(), 137);
    }

    #[test]
    fn signal_parsing() {
        assert_eq!("SIGTERM".parse::<Signal>().unwrap(), Signal::TERM);
        assert_eq!("kill".parse::<Signal>().unwrap(), Signal::KILL);
        assert_eq!("9".parse::<Signal>().unwrap(), Signal::KILL);
        assert!("SIGBOGUS".parse::<Signal>().is_err());
        assert!("0".parse::<Signal>().is_err());
        assert_eq!(Signal::TERM.to_string(), "SIGTERM");
    }

    #[test]
    fn supervisor_errors_become_internal() {
        let err: CorralError = SupervisorError::NoSuchProcess { pid: 7 }.into();
        assert_eq!(err.kind(), corral_common::ErrorKind::Internal);
        assert!(err.to_string().contains("no such process: 7"));
    }
}
