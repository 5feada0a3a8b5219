//! Transition engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use corral_common::{ContainerId, ContainerName, ContainerStatus, CorralError, CorralResult};
use tokio::sync::MutexGuard;
use tokio::task::JoinHandle;

use super::config::EngineConfig;
use super::events::{EventBus, RuntimeEvent};
use super::record::{ContainerConfig, ContainerEntry, ContainerRecord, ContainerSnapshot};
use super::store::StateStore;
use super::wait::{self, WaitOutcome, WaitRequest};
use crate::supervisor::{ExitReport, ExitStatus, ProcessHandle, ProcessSupervisor, Signal};

/// Which source states a stop accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopMode {
    /// A caller-requested stop: running only.
    Requested,
    /// The implicit stop of a forced removal: running or paused.
    Forced,
}

/// The container lifecycle engine.
///
/// Cloning is cheap; clones share the same store and supervisor.
#[derive(Clone)]
pub struct Engine {
    store: Arc<StateStore>,
    supervisor: Arc<dyn ProcessSupervisor>,
    events: EventBus,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("containers", &self.store.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine driving processes through `supervisor`.
    #[must_use]
    pub fn new(supervisor: Arc<dyn ProcessSupervisor>, config: EngineConfig) -> Self {
        Self {
            store: Arc::new(StateStore::new()),
            supervisor,
            events: EventBus::with_capacity(config.event_capacity),
            config,
        }
    }

    /// Runtime event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Engine configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Feed the supervisor's unsolicited exits into [`Engine::notify_exit`].
    ///
    /// Returns `None` if the exit stream was already taken.
    pub fn start_exit_monitor(&self) -> Option<JoinHandle<()>> {
        let mut reports = self.supervisor.take_exit_reports()?;
        let engine = self.clone();

        Some(tokio::spawn(async move {
            while let Some(report) = reports.recv().await {
                engine.notify_exit(report).await;
            }
            tracing::debug!("exit report stream closed");
        }))
    }

    /// Register a new container in the created state.
    ///
    /// # Errors
    ///
    /// Returns `NameInUse` if another container has the requested name.
    pub async fn create(&self, config: ContainerConfig) -> CorralResult<ContainerId> {
        let id = ContainerId::generate();
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| ContainerName::from_id(&id));

        let entry = Arc::new(ContainerEntry::new(id.clone(), name, config));
        self.store.insert(Arc::clone(&entry))?;

        tracing::info!(container_id = %entry.id, name = %entry.name, "container created");
        self.events.publish(RuntimeEvent {
            id: id.clone(),
            status: ContainerStatus::Created,
            exit_code: corral_common::EXIT_CODE_UNKNOWN,
            timestamp: entry.created_at,
        });
        Ok(id)
    }

    /// Start a created or exited container.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidState`, or `Internal` if the process cannot be spawned.
    pub async fn start(&self, key: &str) -> CorralResult<()> {
        let entry = self.store.get(key)?;
        let mut record = Self::lock(&entry, "start").await?;
        if !record.status.can_start() {
            return Err(Self::reject(&entry, record.status, "start"));
        }

        let handle = self
            .supervisor
            .start(&entry.id, &record.config)
            .await
            .inspect_err(|e| tracing::warn!(container_id = %entry.id, error = %e, "start failed"))?;

        record.handle = Some(handle);
        record.exit_code = corral_common::EXIT_CODE_UNKNOWN;
        record.started_at = Some(Utc::now());
        record.finished_at = None;
        record.pending_exit = None;
        self.commit(&entry, &mut record, ContainerStatus::Running);
        Ok(())
    }

    /// Freeze a running container.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidState` unless running, or `Internal`.
    pub async fn pause(&self, key: &str) -> CorralResult<()> {
        let entry = self.store.get(key)?;
        let mut record = Self::lock(&entry, "pause").await?;
        if !record.status.can_pause() {
            return Err(Self::reject(&entry, record.status, "pause"));
        }

        let handle = Self::live_handle(&entry, &record)?;
        self.supervisor
            .pause(handle)
            .await
            .inspect_err(|e| tracing::warn!(container_id = %entry.id, error = %e, "pause failed"))?;

        self.commit(&entry, &mut record, ContainerStatus::Paused);
        Ok(())
    }

    /// Thaw a paused container.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidState` unless paused, or `Internal`.
    pub async fn unpause(&self, key: &str) -> CorralResult<()> {
        let entry = self.store.get(key)?;
        let mut record = Self::lock(&entry, "unpause").await?;
        if !record.status.can_unpause() {
            return Err(Self::reject(&entry, record.status, "unpause"));
        }

        let handle = Self::live_handle(&entry, &record)?;
        self.supervisor
            .resume(handle)
            .await
            .inspect_err(|e| tracing::warn!(container_id = %entry.id, error = %e, "unpause failed"))?;

        self.commit(&entry, &mut record, ContainerStatus::Running);
        Ok(())
    }

    /// Stop a running container and return its exit code.
    ///
    /// Sends SIGTERM, waits up to `timeout` (or the configured default) and
    /// escalates to SIGKILL. The wait happens outside the container lock.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidState` unless running, or `Internal`.
    pub async fn stop(&self, key: &str, timeout: Option<Duration>) -> CorralResult<i32> {
        let entry = self.store.get(key)?;
        self.stop_entry(&entry, timeout, StopMode::Requested).await
    }

    /// Deliver a signal to a running container.
    ///
    /// The status does not change here; if the signal kills the process the
    /// exit arrives through [`Engine::notify_exit`].
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidState` unless running, `InvalidArgument` for
    /// SIGSTOP and SIGCONT, or `Internal`.
    pub async fn kill(&self, key: &str, signal: Signal) -> CorralResult<()> {
        if signal == Signal::STOP || signal == Signal::CONT {
            return Err(CorralError::InvalidSignal {
                value: signal.to_string(),
            });
        }

        let entry = self.store.get(key)?;
        let record = Self::lock(&entry, "kill").await?;
        if !record.status.can_kill() {
            return Err(Self::reject(&entry, record.status, "kill"));
        }

        let handle = Self::live_handle(&entry, &record)?;
        tracing::debug!(container_id = %entry.id, %signal, "signaling container");
        self.supervisor.kill(handle, signal).await?;
        Ok(())
    }

    /// Delete a container.
    ///
    /// Running and paused containers are refused unless `force` is set, in
    /// which case they are stopped first. A forced removal that finds a stop
    /// in flight waits for it instead of failing, and keeps stopping until
    /// the container is dead, even if it is restarted in between.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidState` without `force`, or `Internal` from the
    /// implicit stop.
    pub async fn remove(&self, key: &str, force: bool) -> CorralResult<()> {
        let entry = self.store.get(key)?;

        loop {
            let record = entry.record.lock().await;
            if record.status == ContainerStatus::Removed {
                return Err(CorralError::not_found(entry.id.as_str()));
            }

            if record.stopping {
                if !force {
                    return Err(CorralError::Stopping {
                        id: entry.id.to_string(),
                        operation: "remove",
                    });
                }
                // Created under the lock, so the stop cannot finish unseen
                let stopped = entry.stop_done.notified();
                drop(record);
                tracing::debug!(container_id = %entry.id, "remove waiting for stop in progress");
                stopped.await;
                continue;
            }

            if !record.status.can_remove(force) {
                return Err(Self::reject(&entry, record.status, "remove"));
            }

            if record.status.is_alive() {
                drop(record);
                match self.stop_entry(&entry, None, StopMode::Forced).await {
                    // Lost a race with an exit or another stop; look again
                    Ok(_) | Err(CorralError::InvalidState { .. } | CorralError::Stopping { .. }) => {
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            self.finish_remove(&entry, record).await;
            return Ok(());
        }
    }

    async fn finish_remove(&self, entry: &ContainerEntry, mut record: MutexGuard<'_, ContainerRecord>) {
        self.commit(entry, &mut record, ContainerStatus::Removing);
        if let Some(handle) = record.handle.take() {
            self.supervisor.release(handle).await;
        }
        self.store.remove(&entry.id);
        self.commit(entry, &mut record, ContainerStatus::Removed);
        entry.waiters.close();
    }

    /// Block until the container reaches one of the requested statuses.
    ///
    /// The current status is checked and the waiter registered under the
    /// container lock, so a transition cannot slip in between.
    ///
    /// # Errors
    ///
    /// `NotFound` if the container does not exist or is removed while
    /// waiting, `Timeout` or `Canceled` as requested.
    pub async fn wait(&self, key: &str, request: WaitRequest) -> CorralResult<WaitOutcome> {
        let started = Instant::now();
        let entry = self.store.get(key)?;
        let targets = request.targets();

        let (_guard, rx) = {
            let record = entry.record.lock().await;
            if record.status == ContainerStatus::Removed {
                return Err(CorralError::not_found(key));
            }
            if targets.contains(&record.status) {
                return Ok(WaitOutcome::new(record.status, record.exit_code));
            }
            entry.waiters.register(targets)
        };

        tracing::debug!(
            container_id = %entry.id,
            conditions = ?request.conditions,
            waiters = entry.waiters.len(),
            "waiting"
        );
        wait::block(&entry.id, rx, &request, started).await
    }

    /// Current view of a container.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    pub async fn inspect(&self, key: &str) -> CorralResult<ContainerSnapshot> {
        let entry = self.store.get(key)?;
        let record = entry.record.lock().await;
        if record.status == ContainerStatus::Removed {
            return Err(CorralError::not_found(key));
        }
        Ok(entry.snapshot(&record))
    }

    /// All containers, oldest first.
    pub async fn list(&self) -> Vec<ContainerSnapshot> {
        let mut snapshots = Vec::new();
        for entry in self.store.entries() {
            let record = entry.record.lock().await;
            if record.status != ContainerStatus::Removed {
                snapshots.push(entry.snapshot(&record));
            }
        }
        snapshots
    }

    /// Record a process exit the engine did not ask for.
    ///
    /// Reports for a process that is no longer the container's current one
    /// are ignored, so an exit is recorded at most once per run.
    pub async fn notify_exit(&self, report: ExitReport) {
        let Ok(entry) = self.store.get(report.id.as_str()) else {
            tracing::debug!(container_id = %report.id, "exit report for unknown container");
            return;
        };

        let mut record = entry.record.lock().await;
        if record.handle != Some(report.handle) || !record.status.is_alive() {
            tracing::debug!(container_id = %entry.id, pid = report.handle.pid(), "stale exit report");
            return;
        }
        if record.stopping {
            // The stop in flight commits it
            record.pending_exit = Some(report.status);
            return;
        }

        self.record_exit(&entry, &mut record, report.status).await;
    }

    async fn stop_entry(
        &self,
        entry: &Arc<ContainerEntry>,
        timeout: Option<Duration>,
        mode: StopMode,
    ) -> CorralResult<i32> {
        let (handle, first_wait) = {
            let mut record = Self::lock(entry, "stop").await?;
            let allowed = match mode {
                StopMode::Requested => record.status.can_stop(),
                StopMode::Forced => record.status.can_force_stop(),
            };
            if !allowed {
                return Err(Self::reject(entry, record.status, "stop"));
            }

            let handle = Self::live_handle(entry, &record)?;
            // A frozen process only reacts to SIGKILL
            let (signal, first_wait) = if record.status == ContainerStatus::Paused {
                (Signal::KILL, self.config.kill_grace)
            } else {
                let grace = timeout
                    .or(record.config.stop_timeout)
                    .unwrap_or(self.config.stop_timeout);
                (Signal::TERM, grace)
            };

            tracing::debug!(container_id = %entry.id, %signal, ?first_wait, "stopping container");
            self.supervisor
                .kill(handle, signal)
                .await
                .inspect_err(|e| tracing::warn!(container_id = %entry.id, error = %e, "stop failed"))?;
            record.stopping = true;
            (handle, first_wait)
        };

        // Detached so a caller that goes away cannot leave `stopping` set
        let engine = self.clone();
        let entry = Arc::clone(entry);
        let finish = tokio::spawn(async move { engine.finish_stop(&entry, handle, first_wait).await });

        match finish.await {
            Ok(result) => result,
            Err(e) => Err(CorralError::internal(format!("stop task failed: {e}"))),
        }
    }

    async fn finish_stop(
        &self,
        entry: &ContainerEntry,
        handle: ProcessHandle,
        first_wait: Duration,
    ) -> CorralResult<i32> {
        let exited = self.await_exit(entry, handle, first_wait).await;

        let mut record = entry.record.lock().await;
        record.stopping = false;
        entry.stop_done.notify_waiters();
        let pending = record.pending_exit.take();

        if record.handle != Some(handle) || !record.status.is_alive() {
            return Ok(record.exit_code);
        }

        let status = match exited {
            Ok(Some(status)) => status,
            Ok(None) => pending.ok_or_else(|| {
                CorralError::internal(format!(
                    "process {} survived SIGKILL",
                    handle.pid()
                ))
            })?,
            Err(e) => pending.ok_or(e)?,
        };

        Ok(self.record_exit(entry, &mut record, status).await)
    }

    async fn await_exit(
        &self,
        entry: &ContainerEntry,
        handle: ProcessHandle,
        first_wait: Duration,
    ) -> CorralResult<Option<ExitStatus>> {
        if let Some(status) = self.supervisor.wait_exit(handle, first_wait).await? {
            return Ok(Some(status));
        }

        tracing::warn!(
            container_id = %entry.id,
            timeout = ?first_wait,
            "container did not exit in time, sending SIGKILL"
        );
        self.supervisor.kill(handle, Signal::KILL).await?;
        Ok(self
            .supervisor
            .wait_exit(handle, self.config.kill_grace)
            .await?)
    }

    async fn record_exit(
        &self,
        entry: &ContainerEntry,
        record: &mut ContainerRecord,
        status: ExitStatus,
    ) -> i32 {
        if let Some(handle) = record.handle.take() {
            self.supervisor.release(handle).await;
        }
        record.exit_code = status.code();
        record.finished_at = Some(Utc::now());
        self.commit(entry, record, ContainerStatus::Exited);
        record.exit_code
    }

    /// Apply a status and wake whoever it satisfies, with the lock held.
    fn commit(&self, entry: &ContainerEntry, record: &mut ContainerRecord, status: ContainerStatus) {
        let from = record.status;
        record.status = status;

        let outcome = WaitOutcome::new(status, record.exit_code);
        let woken = entry.waiters.notify(outcome);

        tracing::info!(
            container_id = %entry.id,
            name = %entry.name,
            %from,
            to = %status,
            exit_code = outcome.exit_code,
            woken,
            "container transition"
        );

        self.events.publish(RuntimeEvent {
            id: entry.id.clone(),
            status,
            exit_code: outcome.exit_code,
            timestamp: Utc::now(),
        });
    }

    /// Lock a container, refusing if it was removed or is being stopped.
    async fn lock<'a>(
        entry: &'a ContainerEntry,
        operation: &'static str,
    ) -> CorralResult<MutexGuard<'a, ContainerRecord>> {
        let record = entry.record.lock().await;
        if record.status == ContainerStatus::Removed {
            return Err(CorralError::not_found(entry.id.as_str()));
        }
        if record.stopping {
            tracing::debug!(container_id = %entry.id, operation, "rejected, stop in progress");
            return Err(CorralError::Stopping {
                id: entry.id.to_string(),
                operation,
            });
        }
        Ok(record)
    }

    fn reject(entry: &ContainerEntry, status: ContainerStatus, operation: &'static str) -> CorralError {
        tracing::debug!(container_id = %entry.id, %status, operation, "invalid transition");
        CorralError::InvalidState {
            id: entry.id.to_string(),
            status,
            operation,
        }
    }

    fn live_handle(entry: &ContainerEntry, record: &ContainerRecord) -> CorralResult<ProcessHandle> {
        record.handle.ok_or_else(|| {
            CorralError::internal(format!(
                "container {} is {} without a process",
                entry.id, record.status
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::SimulatedSupervisor;

    fn engine() -> (Engine, Arc<SimulatedSupervisor>) {
        let sup = Arc::new(SimulatedSupervisor::new());
        let config = EngineConfig::default()
            .with_stop_timeout(Duration::from_millis(50))
            .with_kill_grace(Duration::from_millis(50));
        let engine = Engine::new(Arc::clone(&sup) as Arc<dyn ProcessSupervisor>, config);
        (engine, sup)
    }

    async fn running(engine: &Engine) -> ContainerId {
        let id = engine
            .create(ContainerConfig::new(vec!["top".into()]))
            .await
            .unwrap();
        engine.start(id.as_str()).await.unwrap();
        id
    }

    #[test_log::test(tokio::test)]
    async fn create_and_start() {
        let (engine, _) = engine();
        let id = running(&engine).await;

        let snap = engine.inspect(id.as_str()).await.unwrap();
        assert_eq!(snap.status, ContainerStatus::Running);
        assert_eq!(snap.exit_code, -1);
        assert!(snap.pid.is_some());
        assert!(snap.started_at.is_some());
    }

    #[tokio::test]
    async fn pause_requires_running() {
        let (engine, _) = engine();
        let id = engine
            .create(ContainerConfig::new(vec!["top".into()]))
            .await
            .unwrap();

        let err = engine.pause(id.as_str()).await.unwrap_err();
        assert!(matches!(
            err,
            CorralError::InvalidState {
                status: ContainerStatus::Created,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn stop_records_graceful_code() {
        let (engine, sup) = engine();
        let id = running(&engine).await;

        assert_eq!(engine.stop(id.as_str(), None).await.unwrap(), 143);
        let snap = engine.inspect(id.as_str()).await.unwrap();
        assert_eq!(snap.status, ContainerStatus::Exited);
        assert_eq!(snap.exit_code, 143);
        assert!(snap.finished_at.is_some());
        assert_eq!(sup.tracked(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn stop_escalates_to_sigkill() {
        let (engine, sup) = engine();
        sup.set_ignore_sigterm(true);
        let id = running(&engine).await;

        assert_eq!(engine.stop(id.as_str(), None).await.unwrap(), 137);
    }

    #[tokio::test]
    async fn stop_on_paused_is_invalid() {
        let (engine, _) = engine();
        let id = running(&engine).await;
        engine.pause(id.as_str()).await.unwrap();

        let err = engine.stop(id.as_str(), None).await.unwrap_err();
        assert_eq!(err.kind(), corral_common::ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn supervisor_failure_is_internal_and_keeps_state() {
        let (engine, sup) = engine();
        let id = running(&engine).await;
        sup.fail(crate::supervisor::SupervisorOp::Pause);

        let err = engine.pause(id.as_str()).await.unwrap_err();
        assert_eq!(err.kind(), corral_common::ErrorKind::Internal);
        assert_eq!(
            engine.inspect(id.as_str()).await.unwrap().status,
            ContainerStatus::Running
        );
    }

    #[tokio::test]
    async fn restart_resets_exit_code() {
        let (engine, _) = engine();
        let id = running(&engine).await;
        engine.stop(id.as_str(), None).await.unwrap();

        engine.start(id.as_str()).await.unwrap();
        let snap = engine.inspect(id.as_str()).await.unwrap();
        assert_eq!(snap.status, ContainerStatus::Running);
        assert_eq!(snap.exit_code, -1);
        assert!(snap.finished_at.is_none());
    }

    #[tokio::test]
    async fn kill_rejects_freeze_signals() {
        let (engine, _) = engine();
        let id = running(&engine).await;
        let err = engine.kill(id.as_str(), Signal::STOP).await.unwrap_err();
        assert!(matches!(err, CorralError::InvalidSignal { .. }));
    }

    #[tokio::test]
    async fn transitions_are_published() {
        let (engine, _) = engine();
        let mut events = engine.events().subscribe();
        let id = running(&engine).await;

        let created = events.recv().await.unwrap();
        assert_eq!(created.id, id);
        assert_eq!(created.status, ContainerStatus::Created);
        assert_eq!(events.recv().await.unwrap().status, ContainerStatus::Running);
    }

    #[tokio::test]
    async fn create_publishes_a_single_event() {
        let (engine, _) = engine();
        let mut events = engine.events().subscribe();
        let id = engine
            .create(ContainerConfig::new(vec!["top".into()]))
            .await
            .unwrap();

        let created = events.try_recv().unwrap();
        assert_eq!(created.id, id);
        assert_eq!(created.status, ContainerStatus::Created);
        assert_eq!(created.exit_code, -1);
        assert!(events.try_recv().is_err());
    }
}
