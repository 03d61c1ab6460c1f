//! One-shot interpreter queries with bounded timeouts.
//!
//! Every query spawns the candidate with `kill_on_drop(true)`; when the
//! timeout elapses the pending output future is dropped, which kills the
//! child, so a hung or nonexistent interpreter never stalls the caller.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use semver::Version;
use tokio::process::Command;
use tracing::debug;

/// Arguments printing the `--version` banner.
pub const VERSION_ARGS: &[&str] = &["--version"];

/// Arguments printing the interpreter's own executable path.
pub const SELF_LOCATION_ARGS: &[&str] = &["-c", "import sys; print(sys.executable)"];

/// Arguments printing `major.minor.micro`, pointer width, and prefix.
pub const INFO_ARGS: &[&str] = &[
    "-c",
    "import sys, platform; print('%d.%d.%d' % sys.version_info[:3]); \
     print(platform.architecture()[0]); print(sys.prefix)",
];

/// Arguments printing `major.minor` only.
pub const MAJOR_MINOR_ARGS: &[&str] = &["-c", "import sys; print('%d.%d' % sys.version_info[:2])"];

/// Marker that a `--version` banner must contain.
pub const BANNER_MARKER: &str = "Python";

/// Run `program prefix_args.. args..` and return its trimmed output.
///
/// stdout is preferred; stderr is used when stdout is empty (older
/// interpreters print `--version` there). Returns `None` on spawn failure,
/// non-zero exit, timeout, or empty output.
pub async fn run_query(
    program: &str,
    prefix_args: &[String],
    args: &[&str],
    timeout: Duration,
) -> Option<String> {
    let mut cmd = Command::new(program);
    cmd.args(prefix_args)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            debug!(program, %err, "interpreter query failed to run");
            return None;
        }
        Err(_) => {
            debug!(program, timeout_ms = timeout.as_millis(), "interpreter query timed out");
            return None;
        }
    };

    if !output.status.success() {
        debug!(program, status = ?output.status, "interpreter query exited unsuccessfully");
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    let text = if stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).trim().to_owned()
    } else {
        stdout
    };

    (!text.is_empty()).then_some(text)
}

/// Query `interpreter` for its `(major, minor)` version.
///
/// Returns `None` ("unknown version") on any failure; callers treat that as
/// non-fatal.
pub async fn probe_version(interpreter: &Path, timeout: Duration) -> Option<(u64, u64)> {
    let program = interpreter.to_string_lossy();
    let out = run_query(&program, &[], MAJOR_MINOR_ARGS, timeout).await?;
    parse_major_minor(&out)
}

/// Resolve the interpreter's self-reported executable to a canonical path.
///
/// Falls back to the raw report when the path cannot be canonicalized, and
/// to `None` when the query fails.
pub async fn self_location(
    program: &str,
    prefix_args: &[String],
    timeout: Duration,
) -> Option<PathBuf> {
    let reported = run_query(program, prefix_args, SELF_LOCATION_ARGS, timeout).await?;
    let raw = PathBuf::from(reported.lines().next()?.trim());
    Some(std::fs::canonicalize(&raw).unwrap_or(raw))
}

/// Parse `"3.12"` into `(3, 12)`.
#[must_use]
pub fn parse_major_minor(text: &str) -> Option<(u64, u64)> {
    let mut parts = text.trim().split('.');
    let major = parts.next()?.trim().parse().ok()?;
    let minor = parts.next()?.trim().parse().ok()?;
    Some((major, minor))
}

/// Parse a `major.minor[.micro]` string, ignoring any pre-release suffix on
/// the last numeric component (`3.13.0rc1` → `3.13.0`).
#[must_use]
pub fn parse_version(text: &str) -> Option<Version> {
    let mut nums = text.trim().split('.').map(leading_number);
    let major = nums.next()??;
    let minor = nums.next()??;
    let patch = nums.next().flatten().unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

/// Extract the version from a banner such as `Python 3.11.7`.
#[must_use]
pub fn parse_banner(banner: &str) -> Option<Version> {
    banner
        .split_whitespace()
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
        .and_then(parse_version)
}

fn leading_number(part: &str) -> Option<u64> {
    let end = part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(part.len());
    part[..end].parse().ok()
}
