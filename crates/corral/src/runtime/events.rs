//! Runtime event definitions and bus.
//!
//! Events are for observers such as logs and dashboards. Waiters are woken
//! through their own channels and never depend on this bus.

use chrono::{DateTime, Utc};
use corral_common::{ContainerId, ContainerStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A committed container transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEvent {
    /// Container the transition applied to.
    pub id: ContainerId,
    /// Status after the transition.
    pub status: ContainerStatus,
    /// Exit code, or -1 unless `status` is exited.
    pub exit_code: i32,
    /// When the transition committed.
    pub timestamp: DateTime<Utc>,
}

/// Event bus for runtime events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RuntimeEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(1024)
    }
}

impl EventBus {
    /// Create a new event bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus that buffers up to `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.sender.subscribe()
    }

    /// Publish an event.
    pub fn publish(&self, event: RuntimeEvent) {
        // Ignore SendError (no subscribers)
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_published_events() {
        let bus = EventBus::with_capacity(4);
        let mut rx = bus.subscribe();

        let event = RuntimeEvent {
            id: ContainerId::generate(),
            status: ContainerStatus::Paused,
            exit_code: -1,
            timestamp: Utc::now(),
        };
        bus.publish(event.clone());

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(RuntimeEvent {
            id: ContainerId::generate(),
            status: ContainerStatus::Running,
            exit_code: -1,
            timestamp: Utc::now(),
        });
    }
}
