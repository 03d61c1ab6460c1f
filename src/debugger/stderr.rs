//! Suppression of known-harmless interpreter noise on debugger stderr.
//!
//! A line containing one of the configured markers is dropped, together
//! with the frame lines (`File "…"`) that directly follow it. Any other
//! line ends the suppression and is passed through. That includes a fresh
//! `Traceback` header, so a genuine error printed right after the noise
//! reaches the user whole.

/// Markers of the missing-`readline.backend` failure seen on some
/// interpreter builds.
pub const READLINE_NOISE_MARKERS: &[&str] =
    &["readline.backend", "AttributeError: module 'readline'"];

/// Stateful line filter for debugger stderr.
#[derive(Debug, Clone)]
pub struct StderrFilter {
    markers: Vec<String>,
    skipping: bool,
}

impl StderrFilter {
    /// Filter dropping lines that contain any of `markers`.
    #[must_use]
    pub fn new<S: AsRef<str>>(markers: &[S]) -> Self {
        Self {
            markers: markers.iter().map(|m| m.as_ref().to_owned()).collect(),
            skipping: false,
        }
    }

    /// Filter for the known `readline` noise.
    #[must_use]
    pub fn readline_noise() -> Self {
        Self::new(READLINE_NOISE_MARKERS)
    }

    /// Filter one stderr chunk, keeping line terminators intact.
    ///
    /// Returns `None` when nothing in the chunk survives.
    pub fn filter(&mut self, chunk: &str) -> Option<String> {
        let mut kept = String::with_capacity(chunk.len());
        for line in chunk.split_inclusive('\n') {
            if self.keep(line) {
                kept.push_str(line);
            }
        }
        (!kept.is_empty()).then_some(kept)
    }

    fn keep(&mut self, line: &str) -> bool {
        if self.markers.iter().any(|marker| line.contains(marker.as_str())) {
            self.skipping = true;
            return false;
        }
        if self.skipping && is_frame_line(line) {
            return false;
        }
        self.skipping = false;
        true
    }
}

impl Default for StderrFilter {
    fn default() -> Self {
        Self::readline_noise()
    }
}

fn is_frame_line(line: &str) -> bool {
    line.trim_start().starts_with("File \"")
}
