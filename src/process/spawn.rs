//! Child spawning with a bounded start window.
//!
//! The OS spawn call runs on the blocking pool and reports back through a
//! oneshot. If the caller stops waiting first, the late child is dropped,
//! and `kill_on_drop(true)` on the command kills it.

use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::{AppError, Result};

/// Spawn `cmd`, giving up after `deadline`.
///
/// The command must have `kill_on_drop(true)` set so that a child spawned
/// after the deadline does not outlive this call.
///
/// # Errors
///
/// - `AppError::StartFailure("failed to spawn …")` when the OS rejects the
///   launch (missing executable, permissions, bad working directory).
/// - `AppError::StartFailure("… did not start within …")` when the spawn
///   does not complete inside the window.
pub async fn spawn_with_deadline(mut cmd: Command, deadline: Duration) -> Result<Child> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let (ready_tx, ready_rx) = oneshot::channel();

    tokio::task::spawn_blocking(move || {
        let spawned = cmd.spawn();
        if let Err(Ok(late)) = ready_tx.send(spawned) {
            debug!(pid = late.id(), "caller gave up before spawn completed; dropping child");
        }
    });

    match tokio::time::timeout(deadline, ready_rx).await {
        Ok(Ok(Ok(child))) => {
            info!(program, pid = child.id(), "child process started");
            Ok(child)
        }
        Ok(Ok(Err(err))) => Err(AppError::StartFailure(format!(
            "failed to spawn {program}: {err}"
        ))),
        Ok(Err(_)) => Err(AppError::StartFailure(format!(
            "spawn of {program} ended without reporting"
        ))),
        Err(_) => Err(AppError::StartFailure(format!(
            "{program} did not start within {}ms",
            deadline.as_millis()
        ))),
    }
}
