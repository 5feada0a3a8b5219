//! Container status and the transition table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CorralError;

/// Exit code reported when none is known yet, or when a wait resolved on
/// a non-terminal status.
pub const EXIT_CODE_UNKNOWN: i32 = -1;

/// Exit code recorded when a container was terminated by the graceful
/// stop signal (128 + SIGTERM).
pub const GRACEFUL_STOP_EXIT_CODE: i32 = 143;

/// Container status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// Container has been created but not started.
    Created,
    /// Container process is running.
    Running,
    /// Container process is frozen.
    Paused,
    /// Container process has terminated; the exit code is valid.
    Exited,
    /// Container is being deleted.
    Removing,
    /// Container record has been deleted.
    Removed,
}

impl ContainerStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Created,
        Self::Running,
        Self::Paused,
        Self::Exited,
        Self::Removing,
        Self::Removed,
    ];

    /// Returns true if the container can be started.
    #[must_use]
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Created | Self::Exited)
    }

    /// Returns true if the container can be paused.
    #[must_use]
    pub const fn can_pause(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if the container can be unpaused.
    #[must_use]
    pub const fn can_unpause(self) -> bool {
        matches!(self, Self::Paused)
    }

    /// Returns true if a caller-requested stop is legal.
    ///
    /// A paused container must be unpaused first; only the implicit stop
    /// of a forced removal reaches a paused process.
    #[must_use]
    pub const fn can_stop(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if the forced stop path of `remove` applies.
    #[must_use]
    pub const fn can_force_stop(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Returns true if the container can receive a signal.
    #[must_use]
    pub const fn can_kill(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if the container can be removed.
    #[must_use]
    pub const fn can_remove(self, force: bool) -> bool {
        match self {
            Self::Created | Self::Exited => true,
            Self::Running | Self::Paused => force,
            Self::Removing | Self::Removed => false,
        }
    }

    /// Returns true if the container has a live process.
    #[must_use]
    pub const fn is_alive(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Returns true for the status that carries an exit code.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exited)
    }

    /// Returns the lowercase name used in inspect output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Exited => "exited",
            Self::Removing => "removing",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerStatus {
    type Err = CorralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "created" | "configured" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "exited" | "stopped" => Ok(Self::Exited),
            "removing" => Ok(Self::Removing),
            "removed" => Ok(Self::Removed),
            _ => Err(CorralError::UnknownStatus {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn transition_table() {
        use ContainerStatus::{Created, Exited, Paused, Removed, Removing, Running};

        assert!(Running.can_pause());
        assert!(!Paused.can_pause());
        assert!(!Created.can_pause());
        assert!(!Exited.can_pause());

        assert!(Paused.can_unpause());
        assert!(!Running.can_unpause());

        assert!(Running.can_stop());
        assert!(!Paused.can_stop());
        assert!(!Exited.can_stop());
        assert!(Paused.can_force_stop());

        assert!(Created.can_remove(false));
        assert!(Exited.can_remove(false));
        assert!(!Paused.can_remove(false));
        assert!(Paused.can_remove(true));
        assert!(!Removing.can_remove(true));
        assert!(!Removed.can_remove(true));

        assert!(Created.can_start());
        assert!(Exited.can_start());
        assert!(!Running.can_start());
    }

    #[test]
    fn status_strings() {
        assert_eq!(ContainerStatus::Exited.to_string(), "exited");
        assert_eq!(
            "stopped".parse::<ContainerStatus>().unwrap(),
            ContainerStatus::Exited
        );
        assert_eq!(
            "Paused".parse::<ContainerStatus>().unwrap(),
            ContainerStatus::Paused
        );
        assert!("frozen".parse::<ContainerStatus>().is_err());

        let json = serde_json::to_string(&ContainerStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }

    fn any_status() -> impl Strategy<Value = ContainerStatus> {
        proptest::sample::select(ContainerStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn force_only_widens_remove(status in any_status()) {
            if status.can_remove(false) {
                prop_assert!(status.can_remove(true));
            }
        }

        #[test]
        fn deleted_records_accept_nothing(status in any_status()) {
            if matches!(status, ContainerStatus::Removing | ContainerStatus::Removed) {
                prop_assert!(!status.can_start());
                prop_assert!(!status.can_pause());
                prop_assert!(!status.can_unpause());
                prop_assert!(!status.can_force_stop());
                prop_assert!(!status.can_remove(true));
            }
        }

        #[test]
        fn stop_sources_are_alive(status in any_status()) {
            prop_assert_eq!(status.can_force_stop(), status.is_alive());
            if status.can_stop() {
                prop_assert!(status.can_force_stop());
            }
        }
    }
}
