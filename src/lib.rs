#![forbid(unsafe_code)]

//! Out-of-process Python execution and `pdb` debugging for editor front ends.
//!
//! - [`runner`] runs a source buffer once and streams its output.
//! - [`debugger`] drives an interactive `pdb` session over its text protocol.
//! - [`discovery`] finds installed interpreters.
//!
//! Every session owns its ephemeral files and reports through a
//! [`models::SessionEvent`] channel supplied by the caller.

pub mod config;
pub mod debugger;
pub mod discovery;
pub mod errors;
pub mod models;
pub mod process;
pub mod runner;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
pub use models::event::USER_STOPPED_EXIT_CODE;
