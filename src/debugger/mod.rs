//! Interactive debug sessions driven over the debugger's text protocol.
//!
//! [`start`] probes the interpreter version, picks a launch strategy from
//! the capability table, materializes the user's code (plus any bootstrap
//! wrapper) as ephemeral files, and spawns the debugger with all three
//! standard streams piped. A supervisor task then owns the child:
//!
//! - stdout chunks are forwarded verbatim as [`SessionEvent::Output`] and
//!   fed through [`protocol::PdbProtocol`], whose actions become commands
//!   on the writer channel or [`SessionEvent::LocationChanged`] events;
//! - stderr chunks pass through [`stderr::StderrFilter`] and surface as
//!   [`SessionEvent::Error`];
//! - commands reach stdin through [`writer::run_writer`], in order.
//!
//! The session ends when the child exits, when [`DebugHandle::stop`] is
//! called, or when an optional first-prompt deadline passes. In every case
//! the supervisor drains the pipes, deletes the ephemeral files, and then
//! emits exactly one [`SessionEvent::Finished`].

pub mod bootstrap;
pub mod codec;
pub mod protocol;
pub mod stderr;
pub mod writer;

use std::path::{Path, PathBuf};
use std::pin::pin;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use self::bootstrap::{
    plan_launch, select_strategy, BootstrapStrategy, CapabilityRule, Platform, CAPABILITY_TABLE,
};
use self::protocol::{DebugCommand, PdbProtocol, ProtocolAction, ProtocolPatterns};
use self::stderr::StderrFilter;
use crate::config::{GlobalConfig, TimeoutConfig};
use crate::discovery::probe_version;
use crate::models::event::emit;
use crate::models::{BreakpointSet, LocationEvent, SessionEvent};
use crate::process::decode;
use crate::process::env::ProcessEnv;
use crate::process::script::EphemeralScript;
use crate::process::spawn::spawn_with_deadline;
use crate::process::terminate::{join_bounded, kill_and_reap};
use crate::{AppError, Result};

// ── Request and options ──────────────────────────────────────────────────────

/// What to debug.
#[derive(Debug, Clone)]
pub struct DebugRequest {
    /// Source text of the program.
    pub code: String,
    /// Interpreter executable.
    pub interpreter: PathBuf,
    /// Working directory of the debugged program.
    pub working_dir: PathBuf,
    /// Lines to break at, installed before the program first runs.
    pub breakpoints: BreakpointSet,
    /// Environment switches for the interpreter.
    pub env: ProcessEnv,
}

/// How to debug it.
#[derive(Debug, Clone)]
pub struct DebugOptions {
    /// Bounded waits.
    pub timeouts: TimeoutConfig,
    /// Quit when the program ends instead of letting the debugger restart it.
    pub quit_on_program_end: bool,
    /// Platform used for capability lookup.
    pub platform: Platform,
    /// Launch quirks table.
    pub capabilities: &'static [CapabilityRule],
    /// Protocol recognizers.
    pub patterns: ProtocolPatterns,
}

impl DebugOptions {
    /// Options derived from the global configuration for this platform.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the protocol patterns fail to compile.
    pub fn from_config(config: &GlobalConfig) -> Result<Self> {
        Ok(Self {
            timeouts: config.timeouts.clone(),
            quit_on_program_end: config.debugger.quit_on_program_end,
            platform: Platform::current(),
            capabilities: CAPABILITY_TABLE,
            patterns: ProtocolPatterns::pdb()?,
        })
    }
}

/// Lifecycle of a debug session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Resolving the launch strategy and spawning.
    Starting,
    /// Spawned; breakpoints not yet installed.
    AwaitingFirstPrompt,
    /// Breakpoints installed; user commands are accepted.
    Running,
    /// The child exited and resources were released.
    Finished,
}

// ── Handle ───────────────────────────────────────────────────────────────────

/// Caller-side control of one debug session.
///
/// Stepping commands are fire-and-forget and return whether the command was
/// queued. They are ignored until the breakpoints have been installed and
/// after the debugger has exited. Dropping the handle stops the session.
#[derive(Debug)]
pub struct DebugHandle {
    session_id: String,
    strategy: BootstrapStrategy,
    script_path: PathBuf,
    bootstrap_path: Option<PathBuf>,
    alive: Arc<AtomicBool>,
    state_rx: watch::Receiver<SessionState>,
    location_rx: watch::Receiver<Option<LocationEvent>>,
    cmd_tx: mpsc::UnboundedSender<DebugCommand>,
    stop_tx: mpsc::Sender<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl DebugHandle {
    /// Session identifier used in logs.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Launch strategy chosen for this session.
    #[must_use]
    pub fn strategy(&self) -> BootstrapStrategy {
        self.strategy
    }

    /// Path of the ephemeral script being debugged.
    #[must_use]
    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// Path of the generated bootstrap wrapper, if the strategy uses one.
    #[must_use]
    pub fn bootstrap_path(&self) -> Option<&Path> {
        self.bootstrap_path.as_deref()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Whether user commands are currently accepted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && self.state() == SessionState::Running
    }

    /// Most recent suspension point inside the user's script.
    #[must_use]
    pub fn last_location(&self) -> Option<LocationEvent> {
        self.location_rx.borrow().clone()
    }

    /// Resume execution.
    pub fn cont(&self) -> bool {
        self.send(DebugCommand::Continue)
    }

    /// Execute the current line, stepping over calls.
    pub fn step_over(&self) -> bool {
        self.send(DebugCommand::Next)
    }

    /// Execute the current line, stepping into calls.
    pub fn step_into(&self) -> bool {
        self.send(DebugCommand::Step)
    }

    /// Run until the current function returns.
    pub fn step_out(&self) -> bool {
        self.send(DebugCommand::Return)
    }

    /// Forward `text` to the debugger as a command line.
    pub fn send_raw(&self, text: impl Into<String>) -> bool {
        self.send(DebugCommand::Raw(text.into()))
    }

    fn send(&self, cmd: DebugCommand) -> bool {
        if !self.is_active() {
            debug!(
                session_id = %self.session_id,
                command = %cmd,
                state = ?self.state(),
                "debug command ignored; session not active"
            );
            return false;
        }
        self.cmd_tx.send(cmd).is_ok()
    }

    /// End the session: ask the debugger to quit, then kill it.
    ///
    /// Returns once the child is gone and the ephemeral files are deleted.
    /// Calling it on a finished session, or more than once, is a no-op.
    pub async fn stop(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.stop_tx.send(ack_tx).await.is_err() {
            debug!(session_id = %self.session_id, "stop ignored; session already finished");
            return;
        }
        let _ = ack_rx.await;
    }

    /// Wait until the session has finished.
    pub async fn finished(&self) {
        let mut state = self.state_rx.clone();
        let _ = state.wait_for(|s| *s == SessionState::Finished).await;
    }

    /// Wait for the supervisor task to complete.
    pub async fn wait(self) {
        if let Err(err) = self.task.await {
            warn!(session_id = %self.session_id, %err, "debug supervisor task failed");
        }
    }
}

// ── Start ────────────────────────────────────────────────────────────────────

/// Launch a debug session.
///
/// Emits [`SessionEvent::Started`] before returning. An unknown interpreter
/// version is not an error; it selects the direct launch strategy.
///
/// # Errors
///
/// - `AppError::Io` if an ephemeral file cannot be written.
/// - `AppError::StartFailure` if the debugger cannot be spawned within the
///   start window. No file is left behind in either case.
pub async fn start(
    request: DebugRequest,
    options: DebugOptions,
    event_tx: mpsc::Sender<SessionEvent>,
) -> Result<DebugHandle> {
    let session_id = Uuid::new_v4().to_string();
    let (state_tx, state_rx) = watch::channel(SessionState::Starting);

    let version = probe_version(&request.interpreter, options.timeouts.version_probe()).await;
    if version.is_none() {
        warn!(
            session_id,
            interpreter = %request.interpreter.display(),
            "interpreter version unknown; launching directly"
        );
    }
    let strategy = select_strategy(options.capabilities, options.platform, version);

    let script = EphemeralScript::create(&request.code, ".py")?;
    let identity = script.identity().clone();
    let plan = match plan_launch(strategy, script.path()) {
        Ok(plan) => plan,
        Err(err) => {
            script.remove();
            return Err(err);
        }
    };
    let bootstrap_path = plan.bootstrap.as_ref().map(|b| b.path().to_path_buf());
    let mut files = SessionFiles {
        script: Some(script),
        bootstrap: plan.bootstrap,
    };

    let mut cmd = Command::new(&request.interpreter);
    cmd.args(&plan.args)
        .current_dir(&request.working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    request.env.apply(&mut cmd);

    let mut child = match spawn_with_deadline(cmd, options.timeouts.start()).await {
        Ok(child) => child,
        Err(err) => {
            files.remove();
            return Err(err);
        }
    };

    let (Some(stdin), Some(stdout), Some(stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        kill_and_reap(&mut child, options.timeouts.kill()).await;
        files.remove();
        return Err(AppError::StartFailure(
            "failed to capture debugger stdio".into(),
        ));
    };

    let script_path = identity.path().to_path_buf();

    info!(
        session_id,
        strategy = strategy.name(),
        script = %script_path.display(),
        breakpoints = request.breakpoints.len(),
        "debug session started"
    );
    state_tx.send_replace(SessionState::AwaitingFirstPrompt);
    emit(&event_tx, SessionEvent::Started).await;

    let protocol = PdbProtocol::new(
        options.patterns,
        identity,
        request.breakpoints,
        options.quit_on_program_end,
    );

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = mpsc::channel(4);
    let (location_tx, location_rx) = watch::channel(None);
    let alive = Arc::new(AtomicBool::new(true));

    let supervisor = Supervisor {
        session_id: session_id.clone(),
        child,
        files,
        event_tx,
        cmd_tx: cmd_tx.clone(),
        state_tx: Arc::new(state_tx),
        alive: Arc::clone(&alive),
        timeouts: options.timeouts,
    };
    let pipes = Pipes {
        stdin,
        stdout,
        stderr,
    };
    let task = tokio::spawn(supervisor.run(pipes, cmd_rx, stop_rx, protocol, location_tx));

    Ok(DebugHandle {
        session_id,
        strategy,
        script_path,
        bootstrap_path,
        alive,
        state_rx,
        location_rx,
        cmd_tx,
        stop_tx,
        task,
    })
}

// ── Supervisor ───────────────────────────────────────────────────────────────

/// Ephemeral files owned by one session.
struct SessionFiles {
    script: Option<EphemeralScript>,
    bootstrap: Option<EphemeralScript>,
}

impl SessionFiles {
    fn remove(&mut self) {
        for file in [self.script.take(), self.bootstrap.take()].into_iter().flatten() {
            file.remove();
        }
    }
}

struct Pipes {
    stdin: ChildStdin,
    stdout: ChildStdout,
    stderr: ChildStderr,
}

/// Why the supervisor stopped waiting on the child.
enum Exit {
    Natural(std::io::Result<ExitStatus>),
    Stopped(Option<oneshot::Sender<()>>),
    FirstPromptOverdue(Duration),
}

struct Supervisor {
    session_id: String,
    child: Child,
    files: SessionFiles,
    event_tx: mpsc::Sender<SessionEvent>,
    cmd_tx: mpsc::UnboundedSender<DebugCommand>,
    state_tx: Arc<watch::Sender<SessionState>>,
    alive: Arc<AtomicBool>,
    timeouts: TimeoutConfig,
}

impl Supervisor {
    async fn run(
        mut self,
        pipes: Pipes,
        cmd_rx: mpsc::UnboundedReceiver<DebugCommand>,
        mut stop_rx: mpsc::Receiver<oneshot::Sender<()>>,
        protocol: PdbProtocol,
        location_tx: watch::Sender<Option<LocationEvent>>,
    ) {
        let cancel = CancellationToken::new();
        let writer = tokio::spawn(writer::run_writer(
            self.session_id.clone(),
            pipes.stdin,
            cmd_rx,
            cancel.clone(),
        ));

        let sink = ActionSink {
            session_id: self.session_id.clone(),
            event_tx: self.event_tx.clone(),
            cmd_tx: self.cmd_tx.clone(),
            state_tx: Arc::clone(&self.state_tx),
            location_tx,
        };
        let stdout_task = tokio::spawn(forward_stdout(pipes.stdout, protocol, sink));
        let stderr_task = tokio::spawn(forward_stderr(pipes.stderr, self.event_tx.clone()));

        let mut overdue = pin!(first_prompt_overdue(
            self.state_tx.subscribe(),
            self.timeouts.first_prompt()
        ));

        let exit = tokio::select! {
            status = self.child.wait() => Exit::Natural(status),
            request = stop_rx.recv() => Exit::Stopped(request),
            limit = &mut overdue => Exit::FirstPromptOverdue(limit),
        };
        self.alive.store(false, Ordering::SeqCst);

        let mut acks = Vec::new();
        let status = match exit {
            Exit::Natural(Ok(status)) => {
                info!(session_id = %self.session_id, ?status, "debugger exited");
                Some(status)
            }
            Exit::Natural(Err(err)) => {
                error!(session_id = %self.session_id, %err, "error waiting for debugger");
                emit(
                    &self.event_tx,
                    SessionEvent::Error(format!("debugger process error: {err}")),
                )
                .await;
                self.shut_down().await
            }
            Exit::Stopped(ack) => {
                info!(session_id = %self.session_id, "debug session stop requested");
                acks.extend(ack);
                self.shut_down().await
            }
            Exit::FirstPromptOverdue(limit) => {
                warn!(
                    session_id = %self.session_id,
                    limit_ms = limit.as_millis(),
                    "debugger never prompted; stopping session"
                );
                emit(
                    &self.event_tx,
                    SessionEvent::Error(format!(
                        "debugger did not prompt within {}ms",
                        limit.as_millis()
                    )),
                )
                .await;
                self.shut_down().await
            }
        };

        cancel.cancel();
        let drain = self.timeouts.kill();
        join_bounded(stdout_task, drain, "debugger stdout").await;
        join_bounded(stderr_task, drain, "debugger stderr").await;
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                debug!(session_id = %self.session_id, %err, "debugger writer ended with error");
            }
            Err(err) => {
                warn!(session_id = %self.session_id, %err, "debugger writer task failed");
            }
        }

        self.files.remove();
        self.state_tx.send_replace(SessionState::Finished);
        let exit_code = status.and_then(|s| s.code());
        info!(session_id = %self.session_id, ?exit_code, "debug session finished");
        emit(&self.event_tx, SessionEvent::Finished { exit_code }).await;

        stop_rx.close();
        while let Ok(ack) = stop_rx.try_recv() {
            acks.push(ack);
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }

    /// Send `quit` if the debugger is still running, then kill it
    /// regardless of whether it listened.
    async fn shut_down(&mut self) -> Option<ExitStatus> {
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.cmd_tx.send(DebugCommand::Quit);
            tokio::task::yield_now().await;
        }
        kill_and_reap(&mut self.child, self.timeouts.kill()).await
    }
}

/// Resolves with the configured limit if the first prompt has not arrived
/// by then; otherwise never resolves.
async fn first_prompt_overdue(
    mut state: watch::Receiver<SessionState>,
    limit: Option<Duration>,
) -> Duration {
    let Some(limit) = limit else {
        return std::future::pending().await;
    };
    let prompted = tokio::time::timeout(
        limit,
        state.wait_for(|s| *s != SessionState::AwaitingFirstPrompt),
    )
    .await
    .is_ok();
    if prompted {
        return std::future::pending().await;
    }
    limit
}

/// Carries out protocol actions on behalf of the stdout task.
struct ActionSink {
    session_id: String,
    event_tx: mpsc::Sender<SessionEvent>,
    cmd_tx: mpsc::UnboundedSender<DebugCommand>,
    state_tx: Arc<watch::Sender<SessionState>>,
    location_tx: watch::Sender<Option<LocationEvent>>,
}

impl ActionSink {
    async fn apply(&self, action: ProtocolAction) {
        match action {
            ProtocolAction::Prompt { first: true } => {
                self.state_tx.send_if_modified(|state| {
                    let advance = *state == SessionState::AwaitingFirstPrompt;
                    if advance {
                        *state = SessionState::Running;
                    }
                    advance
                });
                info!(session_id = %self.session_id, "debugger ready");
            }
            ProtocolAction::Prompt { first: false } => {
                trace!(session_id = %self.session_id, "debugger prompt");
            }
            ProtocolAction::Send(cmd) => {
                if self.cmd_tx.send(cmd).is_err() {
                    debug!(session_id = %self.session_id, "writer gone; protocol command dropped");
                }
            }
            ProtocolAction::Location(location) => {
                debug!(session_id = %self.session_id, line = location.line, "location changed");
                self.location_tx.send_replace(Some(location.clone()));
                emit(&self.event_tx, SessionEvent::LocationChanged(location)).await;
            }
        }
    }
}

async fn forward_stdout(stdout: ChildStdout, mut protocol: PdbProtocol, sink: ActionSink) {
    let mut chunks = pin!(decode::chunks(stdout));
    while let Some(next) = chunks.next().await {
        let chunk = match next {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(session_id = %sink.session_id, %err, "debugger stdout read failed");
                break;
            }
        };
        let actions = protocol.feed(&chunk);
        emit(&sink.event_tx, SessionEvent::Output(chunk)).await;
        for action in actions {
            sink.apply(action).await;
        }
    }
    for action in protocol.finish() {
        sink.apply(action).await;
    }
}

async fn forward_stderr(stderr: ChildStderr, event_tx: mpsc::Sender<SessionEvent>) {
    let mut filter = StderrFilter::readline_noise();
    let mut chunks = pin!(decode::chunks(stderr));
    while let Some(next) = chunks.next().await {
        match next {
            Ok(chunk) => {
                if let Some(kept) = filter.filter(&chunk) {
                    emit(&event_tx, SessionEvent::Error(kept)).await;
                }
            }
            Err(err) => {
                warn!(%err, "debugger stderr read failed");
                break;
            }
        }
    }
}
