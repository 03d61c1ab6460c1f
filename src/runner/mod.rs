//! One-shot program execution.
//!
//! [`start`] writes the code to an ephemeral script, spawns the interpreter
//! on it, and hands back a [`RunHandle`]. A supervisor task forwards stdout
//! and stderr chunks as they arrive, waits for the child or a stop request,
//! then deletes the script and emits a single [`SessionEvent::Finished`].
//!
//! Exit codes are reported as the child produced them. A process killed by
//! a signal reports `None`; callers that want to show "stopped by user"
//! can substitute [`crate::USER_STOPPED_EXIT_CODE`] themselves.

use std::path::{Path, PathBuf};
use std::pin::pin;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::TimeoutConfig;
use crate::models::event::emit;
use crate::models::SessionEvent;
use crate::process::decode;
use crate::process::env::ProcessEnv;
use crate::process::script::EphemeralScript;
use crate::process::spawn::spawn_with_deadline;
use crate::process::terminate::{join_bounded, kill_and_reap, terminate, StopMode, StopWaits};
use crate::{AppError, Result};

/// What to run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Source text of the program.
    pub code: String,
    /// Interpreter executable.
    pub interpreter: PathBuf,
    /// Working directory of the program.
    pub working_dir: PathBuf,
    /// Environment switches for the interpreter.
    pub env: ProcessEnv,
}

struct StopRequest {
    mode: StopMode,
    ack: oneshot::Sender<()>,
}

impl std::fmt::Debug for StopRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopRequest").field("mode", &self.mode).finish_non_exhaustive()
    }
}

/// Caller-side control of one run.
///
/// Dropping the handle does not stop the program; it runs to completion
/// and still cleans up after itself.
#[derive(Debug)]
pub struct RunHandle {
    session_id: String,
    script_path: PathBuf,
    pid: Option<u32>,
    running: Arc<AtomicBool>,
    stop_tx: mpsc::Sender<StopRequest>,
    task: JoinHandle<()>,
}

impl RunHandle {
    /// Session identifier used in logs.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Path of the ephemeral script being run.
    #[must_use]
    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// OS process id, if the platform reported one.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Whether the program is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the program.
    ///
    /// Graceful stops ask the child to exit and escalate to a kill after
    /// the grace period; forced stops kill immediately. Returns once the
    /// child is gone and the script is deleted. Stopping a finished run,
    /// or stopping twice, is a no-op.
    pub async fn stop(&self, forced: bool) {
        if !self.is_running() {
            return;
        }
        let mode = if forced {
            StopMode::Forced
        } else {
            StopMode::Graceful
        };
        let (ack, done) = oneshot::channel();
        if self.stop_tx.send(StopRequest { mode, ack }).await.is_err() {
            debug!(session_id = %self.session_id, "stop ignored; run already finished");
            return;
        }
        let _ = done.await;
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for the run to finish.
    pub async fn wait(self) {
        if let Err(err) = self.task.await {
            warn!(session_id = %self.session_id, %err, "run supervisor task failed");
        }
    }
}

/// Start running `request.code`.
///
/// Emits [`SessionEvent::Started`] before returning.
///
/// # Errors
///
/// - `AppError::Io` if the script cannot be written.
/// - `AppError::StartFailure` if the interpreter cannot be spawned within
///   the start window. The script is deleted before the error is returned.
pub async fn start(
    request: RunRequest,
    timeouts: &TimeoutConfig,
    event_tx: mpsc::Sender<SessionEvent>,
) -> Result<RunHandle> {
    let session_id = Uuid::new_v4().to_string();
    let script = EphemeralScript::create(&request.code, ".py")?;

    let mut cmd = Command::new(&request.interpreter);
    cmd.arg(script.path())
        .current_dir(&request.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    request.env.apply(&mut cmd);

    let mut child = match spawn_with_deadline(cmd, timeouts.start()).await {
        Ok(child) => child,
        Err(err) => {
            script.remove();
            return Err(err);
        }
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        kill_and_reap(&mut child, timeouts.kill()).await;
        script.remove();
        return Err(AppError::StartFailure(
            "failed to capture program output".into(),
        ));
    };

    let pid = child.id();
    let script_path = script.path().to_path_buf();
    info!(session_id, ?pid, script = %script_path.display(), "run started");
    emit(&event_tx, SessionEvent::Started).await;

    let running = Arc::new(AtomicBool::new(true));
    let (stop_tx, stop_rx) = mpsc::channel(4);

    let supervisor = Supervisor {
        session_id: session_id.clone(),
        child,
        script: Some(script),
        event_tx: event_tx.clone(),
        running: Arc::clone(&running),
        waits: StopWaits {
            graceful: timeouts.graceful_stop(),
            kill: timeouts.kill(),
        },
    };
    let stdout_task = tokio::spawn(forward(stdout, event_tx.clone(), SessionEvent::Output));
    let stderr_task = tokio::spawn(forward(stderr, event_tx, SessionEvent::Error));
    let task = tokio::spawn(supervisor.run(stdout_task, stderr_task, stop_rx));

    Ok(RunHandle {
        session_id,
        script_path,
        pid,
        running,
        stop_tx,
        task,
    })
}

// ── Supervisor ───────────────────────────────────────────────────────────────

enum Exit {
    Natural(std::io::Result<ExitStatus>),
    Stopped(StopRequest),
    Abandoned,
}

struct Supervisor {
    session_id: String,
    child: Child,
    script: Option<EphemeralScript>,
    event_tx: mpsc::Sender<SessionEvent>,
    running: Arc<AtomicBool>,
    waits: StopWaits,
}

impl Supervisor {
    async fn run(
        mut self,
        stdout_task: JoinHandle<()>,
        stderr_task: JoinHandle<()>,
        mut stop_rx: mpsc::Receiver<StopRequest>,
    ) {
        let exit = tokio::select! {
            status = self.child.wait() => Exit::Natural(status),
            request = stop_rx.recv() => request.map_or(Exit::Abandoned, Exit::Stopped),
        };

        let mut acks = Vec::new();
        let status = match exit {
            Exit::Natural(Ok(status)) => {
                info!(session_id = %self.session_id, ?status, "program exited");
                Some(status)
            }
            Exit::Natural(Err(err)) => {
                error!(session_id = %self.session_id, %err, "error waiting for program");
                emit(
                    &self.event_tx,
                    SessionEvent::Error(format!("process error: {err}")),
                )
                .await;
                kill_and_reap(&mut self.child, self.waits.kill).await
            }
            Exit::Stopped(request) => {
                info!(session_id = %self.session_id, mode = ?request.mode, "stop requested");
                acks.push(request.ack);
                terminate(&mut self.child, request.mode, self.waits).await
            }
            Exit::Abandoned => {
                debug!(session_id = %self.session_id, "handle dropped; waiting for program");
                self.child.wait().await.ok()
            }
        };
        self.running.store(false, Ordering::SeqCst);

        join_bounded(stdout_task, self.waits.kill, "program stdout").await;
        join_bounded(stderr_task, self.waits.kill, "program stderr").await;

        if let Some(script) = self.script.take() {
            script.remove();
        }
        let exit_code = status.and_then(|s| s.code());
        info!(session_id = %self.session_id, ?exit_code, "run finished");
        emit(&self.event_tx, SessionEvent::Finished { exit_code }).await;

        stop_rx.close();
        while let Ok(request) = stop_rx.try_recv() {
            acks.push(request.ack);
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }
}

async fn forward<R>(
    reader: R,
    event_tx: mpsc::Sender<SessionEvent>,
    wrap: fn(String) -> SessionEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut chunks = pin!(decode::chunks(reader));
    while let Some(next) = chunks.next().await {
        match next {
            Ok(chunk) => emit(&event_tx, wrap(chunk)).await,
            Err(err) => {
                warn!(%err, "program pipe read failed");
                break;
            }
        }
    }
}
