//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error enumeration covering every failure a session can surface.
///
/// Protocol lines that match no known pattern are not errors (they are
/// forwarded as ordinary output), and temp-file cleanup failures are logged
/// and swallowed, so neither has a variant here.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The interpreter could not be spawned or did not report readiness in time.
    StartFailure(String),
    /// The child crashed or the OS reported an error while supervising it.
    Process(String),
    /// Interpreter discovery or probing failure.
    Discovery(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::StartFailure(msg) => write!(f, "start failure: {msg}"),
            Self::Process(msg) => write!(f, "process: {msg}"),
            Self::Discovery(msg) => write!(f, "discovery: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
