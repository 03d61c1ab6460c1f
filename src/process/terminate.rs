//! Graceful and forced termination of a supervised child.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How a stop request should treat the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Ask the child to exit, escalating to a kill after the grace period.
    Graceful,
    /// Kill immediately.
    Forced,
}

/// Bounded waits used by [`terminate`].
#[derive(Debug, Clone, Copy)]
pub struct StopWaits {
    /// Wait after a graceful request before escalating.
    pub graceful: Duration,
    /// Wait after a kill for the child to be reaped.
    pub kill: Duration,
}

/// Stop `child` according to `mode`.
///
/// Returns the exit status if the child was reaped within the bounded
/// windows, `None` otherwise. Never waits longer than
/// `waits.graceful + waits.kill`.
pub async fn terminate(child: &mut Child, mode: StopMode, waits: StopWaits) -> Option<ExitStatus> {
    if let Ok(Some(status)) = child.try_wait() {
        debug!(?status, "child already exited before stop request");
        return Some(status);
    }

    if mode == StopMode::Graceful && request_graceful_exit(child) {
        match tokio::time::timeout(waits.graceful, child.wait()).await {
            Ok(Ok(status)) => {
                info!(?status, "child exited after graceful stop request");
                return Some(status);
            }
            Ok(Err(err)) => warn!(%err, "error waiting for child after graceful stop"),
            Err(_) => warn!(
                grace_ms = waits.graceful.as_millis(),
                "child ignored graceful stop request, forcing kill"
            ),
        }
    }

    kill_and_reap(child, waits.kill).await
}

/// Kill `child` and wait at most `wait` for it to be reaped.
pub async fn kill_and_reap(child: &mut Child, wait: Duration) -> Option<ExitStatus> {
    if let Err(err) = child.start_kill() {
        debug!(%err, "kill request failed; child may already be gone");
    }

    match tokio::time::timeout(wait, child.wait()).await {
        Ok(Ok(status)) => {
            info!(?status, "child killed");
            Some(status)
        }
        Ok(Err(err)) => {
            warn!(%err, "error waiting for killed child");
            None
        }
        Err(_) => {
            warn!(kill_ms = wait.as_millis(), "child not reaped within kill window");
            None
        }
    }
}

/// Await a pipe-draining task for at most `wait`, aborting it afterwards.
///
/// Pipes normally close when the child exits; a grandchild that inherited
/// them can keep them open indefinitely.
pub async fn join_bounded(task: JoinHandle<()>, wait: Duration, what: &'static str) {
    let abort = task.abort_handle();
    match tokio::time::timeout(wait, task).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(what, %err, "drain task failed"),
        Err(_) => {
            warn!(what, wait_ms = wait.as_millis(), "drain task still running; abandoning");
            abort.abort();
        }
    }
}

/// Send `SIGTERM`. Returns `false` when no request could be delivered.
#[cfg(unix)]
fn request_graceful_exit(child: &Child) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return false;
    };

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => {
            debug!(pid, "sent SIGTERM to child");
            true
        }
        Err(err) => {
            warn!(pid, %err, "failed to send SIGTERM");
            false
        }
    }
}

/// Console interpreters have no graceful termination request on this
/// platform, so the caller escalates straight to a kill.
#[cfg(not(unix))]
fn request_graceful_exit(_child: &Child) -> bool {
    false
}
