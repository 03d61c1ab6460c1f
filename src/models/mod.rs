//! Domain model module declarations.

pub mod breakpoint;
pub mod event;
pub mod interpreter;

pub use breakpoint::BreakpointSet;
pub use event::{LocationEvent, SessionEvent};
pub use interpreter::InterpreterDescriptor;
