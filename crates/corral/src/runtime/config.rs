//! Engine configuration.

use std::time::Duration;

/// Engine configuration options.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long `stop` waits after SIGTERM before escalating.
    pub stop_timeout: Duration,
    /// How long to wait for a process to die after SIGKILL.
    pub kill_grace: Duration,
    /// Capacity of the runtime event broadcast channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(10),
            kill_grace: Duration::from_secs(5),
            event_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Set the default stop timeout.
    #[must_use]
    pub const fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Set the grace period after SIGKILL.
    #[must_use]
    pub const fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        // broadcast::channel panics on zero
        self.event_capacity = capacity.max(1);
        self
    }
}
