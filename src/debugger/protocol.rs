//! Debugger text protocol.
//!
//! [`ProtocolPatterns`] holds the regular expressions that recognize the
//! debugger's prompt, location reports, and end-of-program marker. They are
//! data, so a different line-oriented debugger can be driven by swapping
//! the patterns.
//!
//! [`PdbProtocol`] is the pure state machine fed with decoded stdout
//! chunks. It reassembles lines, classifies each one, and returns the
//! [`ProtocolAction`]s the session must carry out: commands to write and
//! locations to report. It performs no I/O and is fully unit-testable.
//!
//! Two quirks of the wire format drive the design:
//!
//! - The prompt is written without a trailing newline, so the unterminated
//!   tail of the buffer is checked for a complete prompt after every chunk.
//! - Output printed right after a prompt lands on the prompt's line, so a
//!   line may start with one or more prompt prefixes that are peeled off
//!   and handled before the remainder is classified.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use bytes::BytesMut;
use regex::Regex;
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use super::codec::PdbCodec;
use crate::models::{BreakpointSet, LocationEvent};
use crate::process::script::ScriptIdentity;
use crate::{AppError, Result};

/// Full-line prompt.
pub const PDB_PROMPT: &str = r"^\(Pdb\)\s*$";

/// Prompt glued to the start of a line.
pub const PDB_PROMPT_PREFIX: &str = r"^\(Pdb\) ";

/// Current-location report: `> /path/file.py(12)<module>()`.
/// The first `(<digits>)` ends the path; frame text after it may hold more.
pub const PDB_LOCATION: &str = r"^>\s*(?P<file>.+?)\((?P<line>\d+)\)";

/// Printed when the debugged program ends and `pdb` is about to rerun it.
pub const PDB_PROGRAM_RESTART: &str = r"^The program finished and will be restarted";

// ── Commands ─────────────────────────────────────────────────────────────────

/// A command written to the debugger's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugCommand {
    /// Set a breakpoint at `path:line`.
    Break {
        /// Script the breakpoint belongs to.
        path: PathBuf,
        /// 1-based line.
        line: u32,
    },
    /// Resume until the next breakpoint or program end.
    Continue,
    /// Step over the current line.
    Next,
    /// Step into the call on the current line.
    Step,
    /// Run until the current function returns.
    Return,
    /// Leave the debugger.
    Quit,
    /// Arbitrary text forwarded verbatim.
    Raw(String),
}

impl DebugCommand {
    /// Text written for this command, without the terminating newline.
    ///
    /// Trailing line breaks on [`DebugCommand::Raw`] are dropped: the codec
    /// appends exactly one, and an extra empty line would make the debugger
    /// repeat its previous command.
    #[must_use]
    pub fn wire(&self) -> String {
        match self {
            Self::Break { path, line } => format!("break {}:{line}", path.display()),
            Self::Continue => "continue".into(),
            Self::Next => "next".into(),
            Self::Step => "step".into(),
            Self::Return => "return".into(),
            Self::Quit => "quit".into(),
            Self::Raw(text) => text.trim_end_matches(['\r', '\n']).to_owned(),
        }
    }
}

impl Display for DebugCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.wire())
    }
}

// ── Classification ───────────────────────────────────────────────────────────

/// Compiled recognizers for one debugger backend.
#[derive(Debug, Clone)]
pub struct ProtocolPatterns {
    prompt: Regex,
    prompt_prefix: Regex,
    location: Regex,
    program_restart: Regex,
}

/// Classification of a single completed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// The debugger is waiting for a command.
    Prompt,
    /// The debugger stopped at `path` line `line`.
    Location {
        /// Path as the debugger reported it.
        path: String,
        /// 1-based line.
        line: u32,
    },
    /// The program ended and the debugger is about to restart it.
    ProgramRestart,
    /// Anything else: program output or debugger chatter.
    Plain,
}

impl ProtocolPatterns {
    /// Compile a pattern set.
    ///
    /// `location` must define the named groups `file` and `line`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when a pattern fails to compile or the
    /// location pattern lacks a required group.
    pub fn new(
        prompt: &str,
        prompt_prefix: &str,
        location: &str,
        program_restart: &str,
    ) -> Result<Self> {
        let location = compile(location)?;
        for group in ["file", "line"] {
            if !location.capture_names().flatten().any(|name| name == group) {
                return Err(AppError::Config(format!(
                    "location pattern is missing the `{group}` group"
                )));
            }
        }
        Ok(Self {
            prompt: compile(prompt)?,
            prompt_prefix: compile(prompt_prefix)?,
            location,
            program_restart: compile(program_restart)?,
        })
    }

    /// Patterns for CPython's `pdb`.
    ///
    /// # Errors
    ///
    /// Only fails if the built-in patterns are malformed.
    pub fn pdb() -> Result<Self> {
        Self::new(PDB_PROMPT, PDB_PROMPT_PREFIX, PDB_LOCATION, PDB_PROGRAM_RESTART)
    }

    /// Classify one completed line (terminator already removed).
    #[must_use]
    pub fn classify(&self, line: &str) -> LineKind {
        if self.prompt.is_match(line) {
            return LineKind::Prompt;
        }
        let trimmed = line.trim();
        if let Some(caps) = self.location.captures(trimmed) {
            let line_no = caps.name("line").and_then(|m| m.as_str().parse().ok());
            if let (Some(file), Some(line)) = (caps.name("file"), line_no) {
                return LineKind::Location {
                    path: file.as_str().trim().to_owned(),
                    line,
                };
            }
        }
        if self.program_restart.is_match(trimmed) {
            return LineKind::ProgramRestart;
        }
        LineKind::Plain
    }

    /// Whether `text` is exactly a prompt.
    #[must_use]
    pub fn is_prompt(&self, text: &str) -> bool {
        self.prompt.is_match(text)
    }

    /// The rest of `line` after a leading prompt, if it has one.
    #[must_use]
    pub fn strip_prompt_prefix<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.prompt_prefix.find(line).map(|m| &line[m.end()..])
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|err| AppError::Config(format!("invalid pattern {pattern:?}: {err}")))
}

// ── State machine ────────────────────────────────────────────────────────────

/// Something the session must do in response to debugger output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolAction {
    /// The debugger is waiting for input; `first` marks the initial prompt.
    ///
    /// For the first prompt this action follows the breakpoint and
    /// `continue` commands it triggers.
    Prompt {
        /// `true` exactly once, for the first prompt of the session.
        first: bool,
    },
    /// Write this command to the debugger.
    Send(DebugCommand),
    /// Execution stopped inside the user's script.
    Location(LocationEvent),
}

/// Line-reassembling protocol engine for one debug session.
#[derive(Debug)]
pub struct PdbProtocol {
    patterns: ProtocolPatterns,
    codec: PdbCodec,
    buffer: BytesMut,
    script: ScriptIdentity,
    breakpoints: BreakpointSet,
    quit_on_program_end: bool,
    first_prompt_seen: bool,
    quitting: bool,
    last_location: Option<LocationEvent>,
}

impl PdbProtocol {
    /// Engine for a session debugging `script`.
    #[must_use]
    pub fn new(
        patterns: ProtocolPatterns,
        script: ScriptIdentity,
        breakpoints: BreakpointSet,
        quit_on_program_end: bool,
    ) -> Self {
        Self {
            patterns,
            codec: PdbCodec::new(),
            buffer: BytesMut::new(),
            script,
            breakpoints,
            quit_on_program_end,
            first_prompt_seen: false,
            quitting: false,
            last_location: None,
        }
    }

    /// Whether the first prompt has been observed.
    #[must_use]
    pub fn first_prompt_seen(&self) -> bool {
        self.first_prompt_seen
    }

    /// Most recent location inside the user's script.
    #[must_use]
    pub fn last_location(&self) -> Option<&LocationEvent> {
        self.last_location.as_ref()
    }

    /// Feed the next decoded stdout chunk.
    pub fn feed(&mut self, chunk: &str) -> Vec<ProtocolAction> {
        self.buffer.extend_from_slice(chunk.as_bytes());
        let mut actions = Vec::new();

        while let Ok(Some(line)) = self.codec.decode(&mut self.buffer) {
            self.handle_line(&line, &mut actions);
        }

        // The prompt arrives without a newline.
        if !self.buffer.is_empty()
            && self
                .patterns
                .is_prompt(&String::from_utf8_lossy(&self.buffer))
        {
            self.buffer.clear();
            self.on_prompt(&mut actions);
        }

        actions
    }

    /// Flush the unterminated remainder at end of stream.
    pub fn finish(&mut self) -> Vec<ProtocolAction> {
        let mut actions = Vec::new();
        while let Ok(Some(line)) = self.codec.decode_eof(&mut self.buffer) {
            self.handle_line(&line, &mut actions);
        }
        actions
    }

    fn handle_line(&mut self, line: &str, actions: &mut Vec<ProtocolAction>) {
        let mut rest = line;
        while let Some(after) = self.patterns.strip_prompt_prefix(rest) {
            self.on_prompt(actions);
            rest = after;
        }
        if rest.trim().is_empty() {
            return;
        }

        match self.patterns.classify(rest) {
            LineKind::Prompt => self.on_prompt(actions),
            LineKind::Location { path, line } => self.on_location(&path, line, actions),
            LineKind::ProgramRestart => self.on_program_end(actions),
            LineKind::Plain => trace!(line = rest, "plain debugger output"),
        }
    }

    fn on_prompt(&mut self, actions: &mut Vec<ProtocolAction>) {
        if self.first_prompt_seen {
            actions.push(ProtocolAction::Prompt { first: false });
            return;
        }

        self.first_prompt_seen = true;
        debug!(
            breakpoints = self.breakpoints.len(),
            "first prompt seen; installing breakpoints"
        );
        for line in self.breakpoints.iter() {
            actions.push(ProtocolAction::Send(DebugCommand::Break {
                path: self.script.path().to_path_buf(),
                line,
            }));
        }
        actions.push(ProtocolAction::Send(DebugCommand::Continue));
        // Last, so user commands are admitted only once the setup is queued.
        actions.push(ProtocolAction::Prompt { first: true });
    }

    fn on_location(&mut self, reported: &str, line: u32, actions: &mut Vec<ProtocolAction>) {
        if self.quitting {
            return;
        }
        if !self.script.matches(reported) {
            trace!(reported, line, "location outside user script ignored");
            return;
        }
        let event = LocationEvent {
            path: self.script.path().to_path_buf(),
            line,
        };
        self.last_location = Some(event.clone());
        actions.push(ProtocolAction::Location(event));
    }

    fn on_program_end(&mut self, actions: &mut Vec<ProtocolAction>) {
        if !self.quit_on_program_end || self.quitting {
            return;
        }
        self.quitting = true;
        debug!("program finished under debugger; quitting instead of restarting");
        actions.push(ProtocolAction::Send(DebugCommand::Quit));
    }
}
