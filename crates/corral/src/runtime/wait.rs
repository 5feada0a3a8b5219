//! Wait/notify.
//!
//! Every container owns a [`Waiters`] set. A waiter is registered with the
//! container lock held, in the same critical section that checks the current
//! status, and transitions dispatch to the set before releasing that lock.
//! Each waiter gets its own oneshot channel, so waking one never blocks the
//! publisher or another waiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use corral_common::{ContainerId, ContainerStatus, CorralError, CorralResult, EXIT_CODE_UNKNOWN};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Parameters of a blocking wait.
#[derive(Debug, Clone, Default)]
pub struct WaitRequest {
    /// Statuses that satisfy the wait. Empty means exited.
    pub conditions: Vec<ContainerStatus>,
    /// Give up after this long.
    pub timeout: Option<Duration>,
    /// Abort when this token is canceled.
    pub cancel: Option<CancellationToken>,
}

impl WaitRequest {
    /// Wait for the container to exit.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the first transition into any of `conditions`.
    #[must_use]
    pub fn until(conditions: impl IntoIterator<Item = ContainerStatus>) -> Self {
        Self {
            conditions: conditions.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Bound the wait.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Make the wait cancelable.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn targets(&self) -> Vec<ContainerStatus> {
        if self.conditions.is_empty() {
            vec![ContainerStatus::Exited]
        } else {
            self.conditions.clone()
        }
    }
}

/// Result of a satisfied wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitOutcome {
    /// The status that satisfied the wait.
    pub status: ContainerStatus,
    /// Exit code when `status` is exited, otherwise -1.
    pub exit_code: i32,
}

impl WaitOutcome {
    pub(crate) const fn new(status: ContainerStatus, exit_code: i32) -> Self {
        Self {
            status,
            exit_code: if status.is_terminal() {
                exit_code
            } else {
                EXIT_CODE_UNKNOWN
            },
        }
    }
}

#[derive(Debug)]
struct Waiter {
    conditions: Vec<ContainerStatus>,
    tx: oneshot::Sender<WaitOutcome>,
}

#[derive(Debug, Default)]
struct Inner {
    next_key: u64,
    // Allocated on first registration, dropped again when it empties
    set: Option<HashMap<u64, Waiter>>,
}

/// Pending waiters of one container.
#[derive(Debug, Default)]
pub(crate) struct Waiters {
    inner: Mutex<Inner>,
}

impl Waiters {
    /// Register a waiter. Callers must hold the container lock.
    pub(crate) fn register(
        self: &Arc<Self>,
        conditions: Vec<ContainerStatus>,
    ) -> (WaiterGuard, oneshot::Receiver<WaitOutcome>) {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock();
        let key = inner.next_key;
        inner.next_key += 1;
        inner
            .set
            .get_or_insert_with(HashMap::new)
            .insert(key, Waiter { conditions, tx });

        let guard = WaiterGuard {
            waiters: Arc::clone(self),
            key,
        };
        (guard, rx)
    }

    /// Hand `outcome` to every waiter it satisfies. Returns how many were woken.
    pub(crate) fn notify(&self, outcome: WaitOutcome) -> usize {
        let mut inner = self.inner.lock();
        let Some(set) = inner.set.as_mut() else {
            return 0;
        };

        let ready: Vec<u64> = set
            .iter()
            .filter(|(_, w)| w.conditions.contains(&outcome.status))
            .map(|(key, _)| *key)
            .collect();
        for key in &ready {
            if let Some(waiter) = set.remove(key) {
                // The receiver may already be gone
                let _ = waiter.tx.send(outcome);
            }
        }

        if set.is_empty() {
            inner.set = None;
        }
        ready.len()
    }

    /// Drop every pending waiter; their receivers observe a closed channel.
    pub(crate) fn close(&self) {
        self.inner.lock().set = None;
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().set.as_ref().map_or(0, HashMap::len)
    }

    fn unregister(&self, key: u64) {
        let mut inner = self.inner.lock();
        if let Some(set) = inner.set.as_mut() {
            set.remove(&key);
            if set.is_empty() {
                inner.set = None;
            }
        }
    }
}

/// Removes its waiter when the wait ends for any reason.
#[derive(Debug)]
pub(crate) struct WaiterGuard {
    waiters: Arc<Waiters>,
    key: u64,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.waiters.unregister(self.key);
    }
}

/// Block on a registered waiter until it is notified, times out or is
/// canceled. A closed channel means the container went away.
pub(crate) async fn block(
    id: &ContainerId,
    rx: oneshot::Receiver<WaitOutcome>,
    request: &WaitRequest,
    started: Instant,
) -> CorralResult<WaitOutcome> {
    let deadline = async {
        match request.timeout {
            Some(timeout) => tokio::time::sleep(timeout.saturating_sub(started.elapsed())).await,
            None => std::future::pending().await,
        }
    };
    let canceled = async {
        match &request.cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        outcome = rx => outcome.map_err(|_| CorralError::not_found(id.as_str())),
        () = canceled => Err(CorralError::Canceled { id: id.to_string() }),
        () = deadline => Err(CorralError::Timeout {
            id: id.to_string(),
            elapsed: started.elapsed(),
        }),
    }
}
