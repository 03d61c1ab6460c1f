//! Discovered interpreter metadata.

use std::cmp::Ordering;
use std::path::PathBuf;

use semver::Version;
use serde::Serialize;

/// Placeholder used when a metadata query produced no value.
pub const UNKNOWN: &str = "Unknown";

/// One installed interpreter, deduplicated by canonical executable path.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InterpreterDescriptor {
    /// Candidate name or path the interpreter was found through.
    pub name: String,
    /// Canonical executable path; the dedup key.
    pub path: PathBuf,
    /// Raw `--version` banner, e.g. `Python 3.12.1`.
    pub banner: String,
    /// Parsed `major.minor.micro`, `None` when unparsable.
    pub version: Option<Version>,
    /// Pointer width as reported by the interpreter, e.g. `64bit`.
    pub architecture: String,
    /// Installation prefix (`sys.prefix`).
    pub prefix: String,
}

impl InterpreterDescriptor {
    /// Human-readable label for pickers and listings.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.banner, self.architecture)
    }

    /// Ordering used for ranked lists: newest version first, unparsable
    /// versions last.
    #[must_use]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        match (&self.version, &other.version) {
            (Some(a), Some(b)) => b.cmp(a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}
