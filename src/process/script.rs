//! Ephemeral script files.
//!
//! Each session materializes its source text into a fresh temporary file
//! that it owns exclusively. The file is removed by [`EphemeralScript::remove`]
//! on every exit path; if the owner is dropped without an explicit removal the
//! underlying [`TempPath`] still deletes it.

use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::{AppError, Result};

/// File name prefix shared by every ephemeral file this crate creates.
pub const FILE_PREFIX: &str = "runpad-";

/// A temporary UTF-8 source file scoped to a single session.
#[derive(Debug)]
pub struct EphemeralScript {
    temp: TempPath,
    identity: ScriptIdentity,
}

/// How a script is named on the wire and recognized in debugger reports.
///
/// Cheap to clone and free of file ownership, so protocol state can hold one
/// while the session keeps the file itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptIdentity {
    /// Path handed to the interpreter and used in protocol commands.
    path: PathBuf,
    /// Lexically normalized, case-folded forms of every spelling of `path`.
    match_keys: Vec<String>,
}

impl ScriptIdentity {
    /// Identity for `path` alone.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            match_keys: vec![normalize_path(&path)],
            path,
        }
    }

    /// Also accept `alias` as a spelling of this script.
    #[must_use]
    pub fn with_alias(mut self, alias: &Path) -> Self {
        let key = normalize_path(alias);
        if !self.match_keys.contains(&key) {
            self.match_keys.push(key);
        }
        self
    }

    /// Path used in protocol commands.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `reported` names this script once both are normalized.
    #[must_use]
    pub fn matches(&self, reported: &str) -> bool {
        let key = normalize_path(Path::new(reported.trim()));
        self.match_keys.iter().any(|k| *k == key)
    }
}

impl EphemeralScript {
    /// Write `contents` to a new temporary file ending in `suffix`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file cannot be created or written.
    pub fn create(contents: &str, suffix: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(suffix)
            .tempfile()
            .map_err(|err| AppError::Io(format!("failed to create script file: {err}")))?;

        file.write_all(contents.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|err| AppError::Io(format!("failed to write script file: {err}")))?;

        let temp = file.into_temp_path();
        let identity = ScriptIdentity::new(resolve(&temp)).with_alias(&temp);

        debug!(
            script = %identity.path().display(),
            bytes = contents.len(),
            "ephemeral script created"
        );

        Ok(Self { temp, identity })
    }

    /// Absolute path of the script.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.identity.path()
    }

    /// Protocol identity of the script.
    #[must_use]
    pub fn identity(&self) -> &ScriptIdentity {
        &self.identity
    }

    /// Whether `reported` names this script once both are normalized.
    #[must_use]
    pub fn matches(&self, reported: &str) -> bool {
        self.identity.matches(reported)
    }

    /// Delete the file. Failures are logged and swallowed.
    pub fn remove(self) {
        let path = self.identity.path;
        match self.temp.close() {
            Ok(()) => debug!(script = %path.display(), "ephemeral script removed"),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(script = %path.display(), "ephemeral script already removed");
            }
            Err(err) => {
                warn!(script = %path.display(), %err, "failed to remove ephemeral script");
            }
        }
    }
}

/// Resolve symlinked temp roots (`/var` → `/private/var` on macOS) so that
/// the path we hand out matches what the interpreter reports back.
#[cfg(unix)]
fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(not(unix))]
fn resolve(path: &Path) -> PathBuf {
    path.to_path_buf()
}

/// Lexically normalize `path` and fold case for comparison.
///
/// `.` components are dropped, `..` pops the previous component, separators
/// are unified to `/`, and the result is lower-cased. No file-system access
/// is performed.
#[must_use]
pub fn normalize_path(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut prefix = String::new();
    let mut absolute = false;

    for component in path.components() {
        match component {
            Component::Prefix(p) => prefix = p.as_os_str().to_string_lossy().into_owned(),
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.last().is_some_and(|last| last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..".to_owned());
                }
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }

    let mut out = prefix;
    if absolute {
        out.push('/');
    }
    out.push_str(&parts.join("/"));
    out.replace('\\', "/").to_lowercase()
}
