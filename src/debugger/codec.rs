//! Line codec for the debugger's stdio.
//!
//! Inbound, [`PdbCodec`] frames stdout into `\n`-terminated lines with any
//! trailing `\r` removed. Unlike [`tokio_util::codec::LinesCodec`] it keeps
//! no scan cursor between calls, so the owner may inspect and clear the
//! unterminated remainder of the buffer (the prompt never ends in a
//! newline) without desynchronizing the decoder.
//!
//! Outbound, each [`DebugCommand`] is written as its wire form plus `\n`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedWrite;
//! use runpad::debugger::codec::PdbCodec;
//!
//! let writer = FramedWrite::new(child_stdin, PdbCodec::new());
//! ```

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::protocol::DebugCommand;
use crate::AppError;

/// Longest line held back waiting for a terminator: 1 MiB.
///
/// A longer unterminated run is released as a line of its own. Debugger
/// output that long is program output, never a protocol line, so splitting
/// it loses nothing.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Line framing for debugger stdout and command encoding for stdin.
#[derive(Debug, Clone)]
pub struct PdbCodec {
    max_line: usize,
}

impl PdbCodec {
    /// Codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }

    /// Codec releasing unterminated runs longer than `max_line` bytes.
    #[must_use]
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            max_line: max_line.max(1),
        }
    }
}

impl Default for PdbCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PdbCodec {
    type Item = String;
    type Error = AppError;

    /// Take the next complete line out of `src`.
    ///
    /// Returns `Ok(None)` while `src` holds only an unterminated fragment
    /// shorter than the line limit.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(pos) = src.iter().position(|b| *b == b'\n') {
            let line = src.split_to(pos + 1);
            return Ok(Some(to_text(&line[..pos])));
        }
        if src.len() > self.max_line {
            let run = src.split_to(self.max_line);
            return Ok(Some(to_text(&run)));
        }
        Ok(None)
    }

    /// Release whatever is left when the stream ends.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split();
        Ok(Some(to_text(&rest)))
    }
}

impl Encoder<DebugCommand> for PdbCodec {
    type Error = AppError;

    fn encode(&mut self, item: DebugCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let wire = item.wire();
        dst.reserve(wire.len() + 1);
        dst.put(wire.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

fn to_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
