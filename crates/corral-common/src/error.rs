//! Error taxonomy for the Corral lifecycle engine.

use std::fmt;
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::ContainerStatus;

/// Result type alias using [`CorralError`].
pub type CorralResult<T> = Result<T, CorralError>;

/// Errors surfaced by lifecycle operations.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum CorralError {
    /// No container matches the given ID or name.
    #[error("no such container: {id}")]
    #[diagnostic(code(corral::container::not_found))]
    ContainerNotFound {
        /// The ID or name that was looked up.
        id: String,
    },

    /// The requested transition is not legal from the current status.
    #[error("container {id} is {status}, cannot {operation}")]
    #[diagnostic(
        code(corral::container::invalid_state),
        help("inspect the container to see its current status")
    )]
    InvalidState {
        /// The container ID.
        id: String,
        /// The status observed while holding the container lock.
        status: ContainerStatus,
        /// The operation that was rejected.
        operation: &'static str,
    },

    /// A container is already being stopped by another request.
    #[error("container {id} is being stopped, cannot {operation}")]
    #[diagnostic(code(corral::container::stopping))]
    Stopping {
        /// The container ID.
        id: String,
        /// The operation that was rejected.
        operation: &'static str,
    },

    /// The process supervisor failed.
    #[error("internal error: {message}")]
    #[diagnostic(code(corral::internal))]
    Internal {
        /// Description of the supervisor failure.
        message: String,
    },

    /// A bounded wait ran out of time before its condition was met.
    #[error("timed out after {elapsed:?} waiting on container {id}")]
    #[diagnostic(code(corral::wait::timeout))]
    Timeout {
        /// The container ID.
        id: String,
        /// How long the caller waited.
        elapsed: Duration,
    },

    /// The caller aborted a blocking wait.
    #[error("wait on container {id} was canceled")]
    #[diagnostic(code(corral::wait::canceled))]
    Canceled {
        /// The container ID.
        id: String,
    },

    /// A container name failed validation.
    #[error("invalid container name: {name}")]
    #[diagnostic(
        code(corral::container::invalid_name),
        help("names must be 1-64 characters of [a-zA-Z0-9_.-] and start alphanumeric")
    )]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A status string (e.g. a wait condition) was not recognized.
    #[error("unknown container status: {value}")]
    #[diagnostic(
        code(corral::status::unknown),
        help("use one of created, running, paused, exited, removing, removed")
    )]
    UnknownStatus {
        /// The rejected value.
        value: String,
    },

    /// A signal name or number was not recognized.
    #[error("invalid signal: {value}")]
    #[diagnostic(code(corral::signal::invalid))]
    InvalidSignal {
        /// The rejected value.
        value: String,
    },

    /// A request parameter could not be parsed.
    #[error("invalid value for {name}: {value}")]
    #[diagnostic(code(corral::request::invalid_parameter))]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Another container already uses this name.
    #[error("container name {name} is already in use")]
    #[diagnostic(code(corral::container::name_in_use))]
    NameInUse {
        /// The conflicting name.
        name: String,
    },
}

impl CorralError {
    /// Shorthand for a not-found error.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::ContainerNotFound { id: id.into() }
    }

    /// Shorthand for a supervisor failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the stable kind this error belongs to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ContainerNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidState { .. } | Self::Stopping { .. } => ErrorKind::InvalidState,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Canceled { .. } => ErrorKind::Canceled,
            Self::InvalidName { .. }
            | Self::UnknownStatus { .. }
            | Self::InvalidSignal { .. }
            | Self::InvalidParameter { .. }
            | Self::NameInUse { .. } => ErrorKind::InvalidArgument,
        }
    }
}

/// Coarse classification of a [`CorralError`].
///
/// This is the part of an error that is stable across versions and that
/// the HTTP layer and client bindings agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No such container.
    NotFound,
    /// Transition not legal for the current status.
    InvalidState,
    /// The process supervisor failed.
    Internal,
    /// A bounded wait expired.
    Timeout,
    /// A wait was aborted by its caller.
    Canceled,
    /// A request argument was malformed.
    InvalidArgument,
}

impl ErrorKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidState => "invalid_state",
            Self::Internal => "internal",
            Self::Timeout => "timeout",
            Self::Canceled => "canceled",
            Self::InvalidArgument => "invalid_argument",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
