//! Lifecycle supervision for the backend process.
//!
//! State lives behind a short-lived async mutex that is never held across a launch or the
//! settle interval, so `status` always answers promptly. Connect attempts are serialized by a
//! separate gate. A caller that queued behind an attempt already in flight takes that
//! attempt's outcome instead of launching again, so a burst of callers costs one launch and
//! waits at most one settle interval. Background work (exit watching, delayed reconnects) runs
//! in spawned tasks that hold only a weak reference and re-check a generation counter; any
//! connect or shutdown bumps the generation, which invalidates every older timer and watcher.

use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};

use super::process::{LaunchedProcess, ProcessExit, ProcessHandle, ProcessLauncher};

/// Connection lifecycle of the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No process is running and no reconnect is pending.
    Disconnected,
    /// A process has been launched and is settling.
    Connecting,
    /// The process survived its settle interval and is considered ready.
    Connected,
    /// The last attempt failed and a delayed reconnect is pending.
    Reconnecting,
}

/// Timing and retry bounds for the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorPolicy {
    /// Time a freshly launched process must stay alive to count as connected.
    pub settle_interval: Duration,
    /// Fixed delay before each automatic reconnect.
    pub reconnect_delay: Duration,
    /// Automatic reconnects attempted before settling into `Disconnected`.
    pub max_reconnect_attempts: u32,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            settle_interval: Duration::from_secs(3),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 3,
        }
    }
}

/// Read-only snapshot of the supervisor for status endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Shorthand for `state == Connected`.
    pub connected: bool,
    /// Consecutive failed attempts since the last successful connect.
    pub reconnect_attempts: u32,
    /// Whether a process is held and still running.
    pub process_alive: bool,
}

struct SupervisorState {
    connection: ConnectionState,
    reconnect_attempts: u32,
    generation: u64,
    /// Bumped whenever a connect attempt finishes, whatever its outcome.
    completed_attempts: u64,
    process: Option<ProcessHandle>,
}

impl SupervisorState {
    fn is_ready(&self) -> bool {
        self.connection == ConnectionState::Connected
            && self.process.as_ref().is_some_and(ProcessHandle::is_alive)
    }
}

struct Shared {
    launcher: Arc<dyn ProcessLauncher>,
    policy: SupervisorPolicy,
    state: Mutex<SupervisorState>,
    connect_gate: Mutex<()>,
}

/// Owns the backend process and its connection state. Cheap to clone.
#[derive(Clone)]
pub struct BackendSupervisor {
    shared: Arc<Shared>,
}

impl BackendSupervisor {
    /// Create a disconnected supervisor. Nothing is launched until [`Self::ensure_connected`].
    pub fn new(launcher: Arc<dyn ProcessLauncher>, policy: SupervisorPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                launcher,
                policy,
                state: Mutex::new(SupervisorState {
                    connection: ConnectionState::Disconnected,
                    reconnect_attempts: 0,
                    generation: 0,
                    completed_attempts: 0,
                    process: None,
                }),
                connect_gate: Mutex::new(()),
            }),
        }
    }

    fn from_weak(shared: &Weak<Shared>) -> Option<Self> {
        shared.upgrade().map(|shared| Self { shared })
    }

    /// Make sure a backend process is running, launching one if needed.
    ///
    /// Returns `true` when the backend is ready. If another attempt is in flight the caller
    /// waits for it and reports its outcome; otherwise it runs one launch plus settle interval.
    pub async fn ensure_connected(&self) -> bool {
        let observed = {
            let state = self.shared.state.lock().await;
            if state.is_ready() {
                return true;
            }
            state.completed_attempts
        };

        let _gate = self.shared.connect_gate.lock().await;
        {
            let state = self.shared.state.lock().await;
            if state.completed_attempts != observed {
                tracing::debug!("Sharing outcome of concurrent connect attempt");
                return state.is_ready();
            }
        }
        self.connect().await
    }

    /// Snapshot the current state without changing it.
    pub async fn status(&self) -> BackendStatus {
        let state = self.shared.state.lock().await;
        BackendStatus {
            state: state.connection,
            connected: state.connection == ConnectionState::Connected,
            reconnect_attempts: state.reconnect_attempts,
            process_alive: state.process.as_ref().is_some_and(ProcessHandle::is_alive),
        }
    }

    /// Terminate the process (best effort) and return to `Disconnected`. Idempotent. An
    /// attempt still settling is abandoned and its process terminated.
    pub async fn shutdown(&self) {
        let mut state = self.shared.state.lock().await;
        Self::stop(&mut state);
        tracing::info!("Analysis backend shut down");
    }

    /// Manual reinitialize: stop, forget past failures, and connect again.
    pub async fn restart(&self) -> bool {
        let _gate = self.shared.connect_gate.lock().await;
        {
            let mut state = self.shared.state.lock().await;
            Self::stop(&mut state);
            state.reconnect_attempts = 0;
        }
        tracing::info!("Restarting analysis backend");
        self.connect().await
    }

    fn stop(state: &mut SupervisorState) {
        state.generation += 1;
        if let Some(process) = state.process.take() {
            tracing::debug!(pid = ?process.pid(), "Terminating backend process");
            process.terminate();
        }
        state.connection = ConnectionState::Disconnected;
    }

    /// One launch-and-settle attempt. Callers hold the connect gate.
    async fn connect(&self) -> bool {
        let generation = {
            let mut state = self.shared.state.lock().await;
            state.generation += 1;
            if let Some(stale) = state.process.take() {
                stale.terminate();
            }
            state.connection = ConnectionState::Connecting;
            tracing::info!(
                attempt = state.reconnect_attempts,
                "Starting analysis backend process"
            );
            state.generation
        };

        let LaunchedProcess { handle, exit } = match self.shared.launcher.launch().await {
            Ok(launched) => launched,
            Err(error) => {
                tracing::error!(error = %error, "Failed to start analysis backend");
                let mut state = self.shared.state.lock().await;
                return self.finish_failed(&mut state, generation);
            }
        };
        self.watch_exit(generation, exit);

        tokio::time::sleep(self.shared.policy.settle_interval).await;

        let mut state = self.shared.state.lock().await;
        if state.generation != generation {
            tracing::debug!(pid = ?handle.pid(), "Connect attempt superseded while settling");
            handle.terminate();
            state.completed_attempts += 1;
            return false;
        }
        if !handle.is_alive() {
            tracing::warn!(pid = ?handle.pid(), "Analysis backend exited while starting");
            return self.finish_failed(&mut state, generation);
        }

        state.process = Some(handle);
        state.connection = ConnectionState::Connected;
        state.reconnect_attempts = 0;
        state.completed_attempts += 1;
        tracing::info!("Analysis backend connected");
        true
    }

    fn finish_failed(&self, state: &mut SupervisorState, generation: u64) -> bool {
        state.completed_attempts += 1;
        if state.generation == generation {
            self.schedule_reconnect(state);
        }
        false
    }

    fn schedule_reconnect(&self, state: &mut SupervisorState) {
        let max_attempts = self.shared.policy.max_reconnect_attempts;
        if state.reconnect_attempts >= max_attempts {
            state.connection = ConnectionState::Disconnected;
            tracing::error!(
                attempts = state.reconnect_attempts,
                "Max reconnection attempts reached; analysis backend will remain disconnected"
            );
            return;
        }

        state.reconnect_attempts += 1;
        state.connection = ConnectionState::Reconnecting;
        let generation = state.generation;
        let delay = self.shared.policy.reconnect_delay;
        tracing::warn!(
            attempt = state.reconnect_attempts,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            "Scheduling analysis backend reconnect"
        );

        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(supervisor) = Self::from_weak(&shared) {
                supervisor.reconnect(generation).await;
            }
        });
    }

    async fn reconnect(&self, generation: u64) {
        let _gate = self.shared.connect_gate.lock().await;
        {
            let state = self.shared.state.lock().await;
            if state.generation != generation || state.connection != ConnectionState::Reconnecting
            {
                tracing::debug!("Skipping superseded reconnect");
                return;
            }
        }
        self.connect().await;
    }

    fn watch_exit(&self, generation: u64, exit: oneshot::Receiver<ProcessExit>) {
        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let Ok(exit) = exit.await else {
                return;
            };
            if let Some(supervisor) = Self::from_weak(&shared) {
                supervisor.on_process_exit(generation, exit).await;
            }
        });
    }

    /// Exits during the settle interval are picked up by `connect` itself.
    async fn on_process_exit(&self, generation: u64, exit: ProcessExit) {
        let mut state = self.shared.state.lock().await;
        if state.generation != generation || state.connection != ConnectionState::Connected {
            return;
        }
        state.process = None;
        if exit.is_failure() {
            tracing::warn!(?exit, "Analysis backend process failed");
            self.schedule_reconnect(&mut state);
        } else {
            tracing::info!(?exit, "Analysis backend process exited cleanly");
            state.connection = ConnectionState::Disconnected;
        }
    }
}
