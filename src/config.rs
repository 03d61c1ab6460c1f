//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::process::env::ProcessEnv;
use crate::{AppError, Result};

/// Bounded waits applied to every spawned interpreter (milliseconds).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Maximum wait for a spawned process to report "started".
    #[serde(default = "default_start_ms")]
    pub start_ms: u64,
    /// Wait after a graceful termination request before escalating to kill.
    #[serde(default = "default_graceful_stop_ms")]
    pub graceful_stop_ms: u64,
    /// Wait after a kill for the process to be reaped.
    #[serde(default = "default_kill_ms")]
    pub kill_ms: u64,
    /// Timeout for the debugger's interpreter version probe.
    #[serde(default = "default_version_probe_ms")]
    pub version_probe_ms: u64,
    /// Optional bound on the wait for the debugger's first prompt.
    ///
    /// Absent means wait forever.
    #[serde(default)]
    pub first_prompt_ms: Option<u64>,
}

fn default_start_ms() -> u64 {
    5_000
}

fn default_graceful_stop_ms() -> u64 {
    2_000
}

fn default_kill_ms() -> u64 {
    3_000
}

fn default_version_probe_ms() -> u64 {
    5_000
}

fn default_discovery_probe_ms() -> u64 {
    8_000
}

fn default_max_concurrent_probes() -> usize {
    8
}

fn default_true() -> bool {
    true
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            start_ms: default_start_ms(),
            graceful_stop_ms: default_graceful_stop_ms(),
            kill_ms: default_kill_ms(),
            version_probe_ms: default_version_probe_ms(),
            first_prompt_ms: None,
        }
    }
}

impl TimeoutConfig {
    /// Start wait as a [`Duration`].
    #[must_use]
    pub fn start(&self) -> Duration {
        Duration::from_millis(self.start_ms)
    }

    /// Graceful-stop wait as a [`Duration`].
    #[must_use]
    pub fn graceful_stop(&self) -> Duration {
        Duration::from_millis(self.graceful_stop_ms)
    }

    /// Kill wait as a [`Duration`].
    #[must_use]
    pub fn kill(&self) -> Duration {
        Duration::from_millis(self.kill_ms)
    }

    /// Version probe timeout as a [`Duration`].
    #[must_use]
    pub fn version_probe(&self) -> Duration {
        Duration::from_millis(self.version_probe_ms)
    }

    /// First-prompt bound, if configured.
    #[must_use]
    pub fn first_prompt(&self) -> Option<Duration> {
        self.first_prompt_ms.map(Duration::from_millis)
    }
}

/// Debug controller behaviour switches.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DebuggerConfig {
    /// Send `quit` when pdb announces that the script finished and will be
    /// restarted, so the session ends with the script.
    #[serde(default = "default_true")]
    pub quit_on_program_end: bool,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            quit_on_program_end: true,
        }
    }
}

/// Interpreter discovery settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DiscoveryConfig {
    /// Additional executable names or paths probed after the built-in list.
    #[serde(default)]
    pub extra_candidates: Vec<String>,
    /// Timeout applied to each individual probe query.
    #[serde(default = "default_discovery_probe_ms")]
    pub probe_timeout_ms: u64,
    /// Number of candidates probed concurrently.
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extra_candidates: Vec::new(),
            probe_timeout_ms: default_discovery_probe_ms(),
            max_concurrent_probes: default_max_concurrent_probes(),
        }
    }
}

impl DiscoveryConfig {
    /// Per-probe timeout as a [`Duration`].
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Global configuration parsed from `runpad.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Interpreter used when the caller does not pick one explicitly.
    #[serde(default)]
    pub interpreter: Option<PathBuf>,
    /// Working directory for spawned interpreters.
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    /// Bounded waits.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Environment options for one-shot execution.
    #[serde(default = "ProcessEnv::for_execution")]
    pub run_env: ProcessEnv,
    /// Environment options for debug sessions.
    #[serde(default = "ProcessEnv::for_debugging")]
    pub debug_env: ProcessEnv,
    /// Debug controller behaviour.
    #[serde(default)]
    pub debugger: DebuggerConfig,
    /// Interpreter discovery settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            interpreter: None,
            working_dir: default_working_dir(),
            timeouts: TimeoutConfig::default(),
            run_env: ProcessEnv::for_execution(),
            debug_env: ProcessEnv::for_debugging(),
            debugger: DebuggerConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and normalize paths.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate timeouts and canonicalize the working directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when a bound is zero or the working
    /// directory does not exist.
    pub fn validate(&mut self) -> Result<()> {
        let t = &self.timeouts;
        for (name, value) in [
            ("start_ms", t.start_ms),
            ("graceful_stop_ms", t.graceful_stop_ms),
            ("kill_ms", t.kill_ms),
            ("version_probe_ms", t.version_probe_ms),
            ("probe_timeout_ms", self.discovery.probe_timeout_ms),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        if t.first_prompt_ms == Some(0) {
            return Err(AppError::Config(
                "first_prompt_ms must be greater than zero when set".into(),
            ));
        }

        if self.discovery.max_concurrent_probes == 0 {
            return Err(AppError::Config(
                "max_concurrent_probes must be greater than zero".into(),
            ));
        }

        self.working_dir = self
            .working_dir
            .canonicalize()
            .map_err(|err| AppError::Config(format!("working_dir invalid: {err}")))?;

        Ok(())
    }
}
