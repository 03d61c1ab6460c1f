//! Interpreter environment options.
//!
//! Every spawned interpreter inherits the caller's environment plus the
//! variables selected here. The options are passed explicitly into each
//! session instead of being read from ambient state.

use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Forces `sys.stdout`/`sys.stderr` to be unbuffered.
pub const UNBUFFERED_VAR: &str = "PYTHONUNBUFFERED";
/// Selects the text encoding of the standard streams.
pub const IO_ENCODING_VAR: &str = "PYTHONIOENCODING";
/// Disables writing of `.pyc` files.
pub const DONT_WRITE_BYTECODE_VAR: &str = "PYTHONDONTWRITEBYTECODE";

/// Recognized environment switches for a spawned interpreter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProcessEnv {
    /// Set `PYTHONUNBUFFERED=1`.
    #[serde(default)]
    pub unbuffered: bool,
    /// Set `PYTHONIOENCODING=utf-8`.
    #[serde(default)]
    pub force_utf8: bool,
    /// Set `PYTHONDONTWRITEBYTECODE=1`.
    #[serde(default)]
    pub disable_bytecode_cache: bool,
}

impl ProcessEnv {
    /// Defaults for one-shot execution: unbuffered UTF-8 output.
    #[must_use]
    pub fn for_execution() -> Self {
        Self {
            unbuffered: true,
            force_utf8: true,
            disable_bytecode_cache: false,
        }
    }

    /// Defaults for debug sessions: UTF-8 output, no bytecode cache writes.
    #[must_use]
    pub fn for_debugging() -> Self {
        Self {
            unbuffered: false,
            force_utf8: true,
            disable_bytecode_cache: true,
        }
    }

    /// Environment variables implied by the enabled switches.
    #[must_use]
    pub fn vars(&self) -> Vec<(&'static str, &'static str)> {
        let mut vars = Vec::with_capacity(3);
        if self.unbuffered {
            vars.push((UNBUFFERED_VAR, "1"));
        }
        if self.force_utf8 {
            vars.push((IO_ENCODING_VAR, "utf-8"));
        }
        if self.disable_bytecode_cache {
            vars.push((DONT_WRITE_BYTECODE_VAR, "1"));
        }
        vars
    }

    /// Inject the selected variables into `cmd`.
    pub fn apply(&self, cmd: &mut Command) {
        for (key, value) in self.vars() {
            cmd.env(key, value);
        }
    }
}

impl Default for ProcessEnv {
    fn default() -> Self {
        Self::for_execution()
    }
}
