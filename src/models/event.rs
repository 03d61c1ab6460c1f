//! Events surfaced from a running session to its caller.

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;

/// Exit code reserved for callers to mean "stopped by the user".
///
/// The core never emits it; it only reports true child exit codes.
pub const USER_STOPPED_EXIT_CODE: i32 = -1;

/// The debugged process is suspended at `line` of its own script.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LocationEvent {
    /// Absolute path of the session's ephemeral script.
    pub path: PathBuf,
    /// 1-based line number.
    pub line: u32,
}

/// Notification delivered through a session's event channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The child process was spawned.
    Started,
    /// A decoded stdout chunk, exactly as read from the pipe.
    Output(String),
    /// A decoded stderr chunk, or a process-level error message.
    Error(String),
    /// The debugger reported a suspension point inside the session script.
    LocationChanged(LocationEvent),
    /// The child exited. Sent exactly once per session, after all output.
    Finished {
        /// Process exit code; `None` when terminated by a signal.
        exit_code: Option<i32>,
    },
}

impl SessionEvent {
    /// Whether this is the terminal event of a session.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

/// Deliver `event`, tolerating a receiver that has gone away.
///
/// Sessions keep draining their pipes after the caller stops listening, so
/// a closed channel is logged and otherwise ignored.
pub async fn emit(tx: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    if tx.send(event).await.is_err() {
        trace!("session event receiver dropped; event discarded");
    }
}
