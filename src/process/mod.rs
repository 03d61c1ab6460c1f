//! Process plumbing shared by the supervisor and the debug controller.
//!
//! - `env`: explicit interpreter environment options.
//! - `script`: ephemeral script files owned by one session.
//! - `decode`: incremental UTF-8 decoding of pipe reads.
//! - `spawn`: spawning with a bounded start window.
//! - `terminate`: graceful-then-forced child termination.

pub mod decode;
pub mod env;
pub mod script;
pub mod spawn;
pub mod terminate;
