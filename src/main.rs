#![forbid(unsafe_code)]

//! `runpad`: run and debug Python scripts from the terminal.
//!
//! Loads configuration, resolves an interpreter, and drives one session of
//! the requested kind. Program output goes to stdout and stderr unchanged;
//! logs go to stderr through `tracing`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use runpad::debugger::{self, DebugHandle, DebugOptions, DebugRequest};
use runpad::discovery;
use runpad::models::{BreakpointSet, SessionEvent};
use runpad::runner::{self, RunHandle, RunRequest};
use runpad::{AppError, GlobalConfig, Result, USER_STOPPED_EXIT_CODE};

/// Capacity of the session event channel.
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "runpad", about = "Run and debug Python scripts", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Interpreter to use instead of the configured or discovered one.
    #[arg(long, global = true)]
    interpreter: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List installed interpreters, newest first.
    List {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Run a script once. Ctrl-C stops it.
    Run {
        /// Script to run.
        file: PathBuf,
    },
    /// Debug a script interactively.
    ///
    /// Commands read from stdin: `c` continue, `n` next, `s` step,
    /// `r` return, `q` quit. Anything else goes to the debugger verbatim.
    Debug {
        /// Script to debug.
        file: PathBuf,
        /// Line to break at; repeatable.
        #[arg(long = "break", short = 'b', value_name = "LINE")]
        breakpoints: Vec<u32>,
    },
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    info!(working_dir = %config.working_dir.display(), "configuration loaded");

    match args.command {
        Command::List { json } => list(&config, json).await,
        Command::Run { file } => run_file(&config, args.interpreter, &file).await,
        Command::Debug { file, breakpoints } => {
            debug_file(&config, args.interpreter, &file, breakpoints).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<GlobalConfig> {
    match path {
        Some(path) => GlobalConfig::load_from_path(path),
        None => {
            let mut config = GlobalConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

async fn resolve_interpreter(config: &GlobalConfig, flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = flag.or_else(|| config.interpreter.clone()) {
        return Ok(path);
    }
    let found = discovery::discover(&config.discovery).await;
    let best = found.into_iter().next().ok_or_else(|| {
        AppError::Discovery("no python interpreter found; pass --interpreter".into())
    })?;
    info!(
        interpreter = %best.path.display(),
        banner = %best.banner,
        "using discovered interpreter"
    );
    Ok(best.path)
}

fn read_source(file: &Path) -> Result<String> {
    std::fs::read_to_string(file)
        .map_err(|err| AppError::Io(format!("cannot read {}: {err}", file.display())))
}

// ── list ─────────────────────────────────────────────────────────────────────

async fn list(config: &GlobalConfig, json: bool) -> Result<ExitCode> {
    let found = discovery::discover(&config.discovery).await;
    let mut out = std::io::stdout().lock();

    if json {
        let text = serde_json::to_string_pretty(&found)
            .map_err(|err| AppError::Io(format!("failed to encode interpreter list: {err}")))?;
        writeln!(out, "{text}")?;
    } else if found.is_empty() {
        writeln!(out, "no interpreters found")?;
    } else {
        for interpreter in &found {
            writeln!(
                out,
                "{:<32} {}",
                interpreter.display_name(),
                interpreter.path.display()
            )?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

// ── run ──────────────────────────────────────────────────────────────────────

async fn run_file(
    config: &GlobalConfig,
    interpreter: Option<PathBuf>,
    file: &Path,
) -> Result<ExitCode> {
    let request = RunRequest {
        code: read_source(file)?,
        interpreter: resolve_interpreter(config, interpreter).await?,
        working_dir: config.working_dir.clone(),
        env: config.run_env,
    };

    let (event_tx, mut event_rx) = mpsc::channel(EVENT_BUFFER);
    let handle = Arc::new(runner::start(request, &config.timeouts, event_tx).await?);
    let mut stopped_by_user = false;

    let exit_code = loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(SessionEvent::Finished { exit_code }) => break exit_code,
                Some(event) => print_event(&event)?,
                None => break None,
            },
            result = tokio::signal::ctrl_c(), if !stopped_by_user => {
                if let Err(err) = result {
                    warn!(%err, "ctrl-c handler failed; stopping program");
                }
                info!("interrupt received; stopping program");
                stopped_by_user = true;
                spawn_run_stop(&handle);
            }
        }
    };

    Ok(report_exit(exit_code, stopped_by_user))
}

/// Stop from a separate task so this one keeps draining events.
fn spawn_run_stop(handle: &Arc<RunHandle>) {
    let handle = Arc::clone(handle);
    tokio::spawn(async move { handle.stop(false).await });
}

// ── debug ────────────────────────────────────────────────────────────────────

async fn debug_file(
    config: &GlobalConfig,
    interpreter: Option<PathBuf>,
    file: &Path,
    breakpoints: Vec<u32>,
) -> Result<ExitCode> {
    let request = DebugRequest {
        code: read_source(file)?,
        interpreter: resolve_interpreter(config, interpreter).await?,
        working_dir: config.working_dir.clone(),
        breakpoints: BreakpointSet::new(breakpoints),
        env: config.debug_env,
    };
    let options = DebugOptions::from_config(config)?;

    let (event_tx, mut event_rx) = mpsc::channel(EVENT_BUFFER);
    let handle = Arc::new(debugger::start(request, options, event_tx).await?);
    info!(
        session_id = handle.session_id(),
        strategy = handle.strategy().name(),
        "debugging; commands: c n s r q"
    );

    let mut input = spawn_stdin_reader();
    let mut input_open = true;
    let mut stopped_by_user = false;

    let exit_code = loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(SessionEvent::Finished { exit_code }) => break exit_code,
                Some(event) => print_event(&event)?,
                None => break None,
            },
            line = input.recv(), if input_open => match line {
                Some(line) => {
                    if dispatch(&handle, line.trim()) {
                        stopped_by_user = true;
                    }
                }
                None => {
                    info!("stdin closed; ending debug session");
                    input_open = false;
                    stopped_by_user = true;
                    spawn_debug_stop(&handle);
                }
            },
            result = tokio::signal::ctrl_c(), if !stopped_by_user => {
                if let Err(err) = result {
                    warn!(%err, "ctrl-c handler failed; stopping debugger");
                }
                stopped_by_user = true;
                spawn_debug_stop(&handle);
            }
        }
    };

    Ok(report_exit(exit_code, stopped_by_user))
}

/// Act on one line of user input. Returns `true` if it ended the session.
fn dispatch(handle: &Arc<DebugHandle>, line: &str) -> bool {
    let queued = match line {
        "" => return false,
        "q" | "quit" => {
            spawn_debug_stop(handle);
            return true;
        }
        "c" | "continue" => handle.cont(),
        "n" | "next" => handle.step_over(),
        "s" | "step" => handle.step_into(),
        "r" | "return" => handle.step_out(),
        raw => handle.send_raw(raw),
    };
    if !queued {
        warn!(command = line, state = ?handle.state(), "debugger not ready; command ignored");
    }
    false
}

fn spawn_debug_stop(handle: &Arc<DebugHandle>) {
    let handle = Arc::clone(handle);
    tokio::spawn(async move { handle.stop().await });
}

/// Read stdin lines on a dedicated thread; blocking reads would otherwise
/// hold up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

// ── output ───────────────────────────────────────────────────────────────────

fn print_event(event: &SessionEvent) -> Result<()> {
    match event {
        SessionEvent::Started => info!("session started"),
        SessionEvent::Output(text) => {
            let mut out = std::io::stdout().lock();
            out.write_all(text.as_bytes())?;
            out.flush()?;
        }
        SessionEvent::Error(text) => {
            let mut err = std::io::stderr().lock();
            err.write_all(text.as_bytes())?;
            err.flush()?;
        }
        SessionEvent::LocationChanged(location) => {
            info!(line = location.line, "stopped");
        }
        SessionEvent::Finished { .. } => {}
    }
    Ok(())
}

fn report_exit(exit_code: Option<i32>, stopped_by_user: bool) -> ExitCode {
    let shown = if stopped_by_user {
        Some(USER_STOPPED_EXIT_CODE)
    } else {
        exit_code
    };
    info!(exit_code = ?shown, "session finished");

    match exit_code {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from),
        None => ExitCode::FAILURE,
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
