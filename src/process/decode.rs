//! Incremental UTF-8 decoding of pipe reads.
//!
//! A read from a child pipe can end in the middle of a multi-byte sequence.
//! [`ChunkDecoder`] holds the incomplete tail back until the next read so
//! that forwarded chunks never contain spurious replacement characters.
//! Genuinely invalid bytes are still replaced with `U+FFFD`.

use futures_util::stream::{self, Stream};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of a single pipe read.
pub const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Stateful UTF-8 decoder for a byte stream delivered in arbitrary pieces.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending: Vec<u8>,
}

impl ChunkDecoder {
    /// Create a decoder with no buffered bytes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, returning all text that is complete so far.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let keep = incomplete_tail_len(&self.pending);
        let split = self.pending.len() - keep;
        let tail = self.pending.split_off(split);
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending = tail;
        text
    }

    /// Flush whatever is buffered at end of stream.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}

/// Number of trailing bytes that form the start of a multi-byte sequence
/// whose continuation bytes have not arrived yet.
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let needed = match byte {
            b if b & 0b1110_0000 == 0b1100_0000 => 2,
            b if b & 0b1111_0000 == 0b1110_0000 => 3,
            b if b & 0b1111_1000 == 0b1111_0000 => 4,
            _ => return 0,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

/// Stream the decoded, non-empty text pieces of `reader` in arrival order.
///
/// An I/O error is yielded once and ends the stream; text decoded before
/// the error has already been delivered. The stream is not `Unpin`, so pin
/// it before polling.
pub fn chunks<R>(reader: R) -> impl Stream<Item = std::io::Result<String>>
where
    R: AsyncRead + Unpin,
{
    let state = ChunkState {
        reader,
        decoder: ChunkDecoder::new(),
        buf: vec![0_u8; READ_CHUNK_BYTES],
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            match state.reader.read(&mut state.buf).await {
                Ok(0) => {
                    state.done = true;
                    let rest = state.decoder.finish();
                    return (!rest.is_empty()).then_some((Ok(rest), state));
                }
                Ok(n) => {
                    let text = state.decoder.decode(&state.buf[..n]);
                    if !text.is_empty() {
                        return Some((Ok(text), state));
                    }
                }
                Err(err) => {
                    state.done = true;
                    return Some((Err(err), state));
                }
            }
        }
    })
}

struct ChunkState<R> {
    reader: R,
    decoder: ChunkDecoder,
    buf: Vec<u8>,
    done: bool,
}
