//! Debugger writer task.
//!
//! Receives [`DebugCommand`]s from an unbounded [`mpsc`] channel and writes
//! each one, newline-terminated, to the debugger's `stdin` through a
//! [`FramedWrite`] over [`PdbCodec`]. Every send is flushed so the debugger
//! sees the command immediately.

use futures_util::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::codec::PdbCodec;
use super::protocol::DebugCommand;
use crate::{AppError, Result};

/// Writer task: forwards queued commands to `stdin` in order.
///
/// Exits cleanly when `cancel` fires or every sender has been dropped.
///
/// # Errors
///
/// Returns `AppError::Process("write failed: …")` if writing to `stdin`
/// fails, typically because the debugger has exited. Commands still queued
/// at that point are discarded.
pub async fn run_writer<W>(
    session_id: String,
    stdin: W,
    mut cmd_rx: mpsc::UnboundedReceiver<DebugCommand>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(stdin, PdbCodec::new());

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(session_id, "debugger writer: cancellation received, stopping");
                break;
            }

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    debug!(session_id, "debugger writer: command channel closed, stopping");
                    break;
                };
                debug!(session_id, command = %cmd, "debugger writer: sending command");
                sink.send(cmd).await.map_err(|e| {
                    warn!(session_id, error = %e, "debugger writer: write to stdin failed");
                    AppError::Process(format!("write failed: {e}"))
                })?;
            }
        }
    }

    Ok(())
}
