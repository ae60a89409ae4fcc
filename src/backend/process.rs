//! Spawning and monitoring the long-running backend process.
//!
//! A launched process is split into two halves connected by oneshot channels. The
//! [`ProcessHandle`] stays with the supervisor and can ask for termination; the
//! [`ProcessMonitor`] lives next to the child, waits for it to exit (or for a termination
//! request), and reports the outcome exactly once. Dropping the handle counts as a termination
//! request. A read error on the child's stdout or stderr is treated as a process failure: the
//! child is killed and the exit is reported as [`ProcessExit::Errored`].

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use super::BackendError;

/// How a backend process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessExit {
    /// The process exited on its own; `code` is `None` when it was killed by a signal.
    Exited {
        /// Exit status code.
        code: Option<i32>,
    },
    /// Waiting on the process failed.
    Errored(String),
    /// The process was stopped at the supervisor's request.
    Terminated,
}

impl ProcessExit {
    /// Whether the exit should be treated as a backend failure.
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Exited { code: Some(0) } | Self::Terminated)
    }
}

/// Supervisor-side view of a running process.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    alive: Arc<AtomicBool>,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    /// OS process identifier, when known.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the process has not yet reported an exit.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Ask the monitor to stop the process. Best effort; never blocks.
    pub fn terminate(mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

/// Process-side half that reports the exit back to the supervisor.
#[derive(Debug)]
pub struct ProcessMonitor {
    alive: Arc<AtomicBool>,
    kill: oneshot::Receiver<()>,
    exit: oneshot::Sender<ProcessExit>,
}

impl ProcessMonitor {
    /// Resolve once termination has been requested or the handle has been dropped.
    pub async fn termination_requested(&mut self) {
        let _ = (&mut self.kill).await;
    }

    /// Mark the process dead and deliver its exit to the supervisor.
    pub fn report_exit(self, exit: ProcessExit) {
        self.alive.store(false, Ordering::SeqCst);
        let _ = self.exit.send(exit);
    }
}

/// A freshly launched process: the handle plus the channel its exit arrives on.
#[derive(Debug)]
pub struct LaunchedProcess {
    /// Handle retained by the supervisor.
    pub handle: ProcessHandle,
    /// Resolves with the process exit.
    pub exit: oneshot::Receiver<ProcessExit>,
}

/// Wire up a handle/monitor pair for a process with the given pid.
pub fn process_channel(pid: Option<u32>) -> (LaunchedProcess, ProcessMonitor) {
    let alive = Arc::new(AtomicBool::new(true));
    let (kill_tx, kill_rx) = oneshot::channel();
    let (exit_tx, exit_rx) = oneshot::channel();
    let launched = LaunchedProcess {
        handle: ProcessHandle {
            pid,
            alive: Arc::clone(&alive),
            kill: Some(kill_tx),
        },
        exit: exit_rx,
    };
    let monitor = ProcessMonitor {
        alive,
        kill: kill_rx,
        exit: exit_tx,
    };
    (launched, monitor)
}

/// Starts backend processes.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn a new process instance.
    async fn launch(&self) -> Result<LaunchedProcess, BackendError>;
}

/// Program and arguments used to start the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
}

/// Launches the backend as a child process with piped standard streams.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    command: ProcessCommand,
}

impl CommandLauncher {
    /// Launch `command` on every call to [`ProcessLauncher::launch`].
    pub fn new(command: ProcessCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl ProcessLauncher for CommandLauncher {
    async fn launch(&self) -> Result<LaunchedProcess, BackendError> {
        let ProcessCommand { program, args } = &self.command;
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| BackendError::Launch(format!("{program}: {error}")))?;

        let pid = child.id();
        tracing::info!(program = %program, ?pid, "Spawned backend process");

        let (stream_failed, mut stream_failures) = mpsc::channel(2);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, StreamKind::Stdout, stream_failed.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, StreamKind::Stderr, stream_failed));
        }
        // Some backends exit as soon as stdin reaches EOF, so the pipe stays open until exit.
        let stdin = child.stdin.take();

        let (launched, mut monitor) = process_channel(pid);
        tokio::spawn(async move {
            let _stdin = stdin;
            let exit = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => ProcessExit::Exited { code: status.code() },
                    Err(error) => ProcessExit::Errored(error.to_string()),
                },
                Some(reason) = stream_failures.recv() => {
                    if let Err(error) = child.kill().await {
                        tracing::warn!(?pid, error = %error, "Failed to kill backend process");
                    }
                    ProcessExit::Errored(reason)
                }
                _ = monitor.termination_requested() => {
                    if let Err(error) = child.kill().await {
                        tracing::warn!(?pid, error = %error, "Failed to kill backend process");
                    }
                    ProcessExit::Terminated
                }
            };
            tracing::info!(?pid, ?exit, "Backend process exited");
            monitor.report_exit(exit);
        });

        Ok(launched)
    }
}

#[derive(Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    fn name(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Log every line the backend writes; output is never parsed. Lines are decoded lossily, so
/// only a genuine read error is reported on `failures`.
async fn forward_lines<R>(stream: R, kind: StreamKind, failures: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(stream).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(bytes)) => {
                let line = String::from_utf8_lossy(&bytes);
                let line = line.trim_end_matches('\r');
                match kind {
                    StreamKind::Stdout => tracing::info!(target: "backend", "{line}"),
                    StreamKind::Stderr => tracing::warn!(target: "backend", "{line}"),
                }
            }
            Ok(None) => break,
            Err(error) => {
                tracing::warn!(target: "backend", stream = kind.name(), error = %error, "Backend output stream failed");
                let _ = failures
                    .send(format!("{} stream failed: {error}", kind.name()))
                    .await;
                break;
            }
        }
    }
}
