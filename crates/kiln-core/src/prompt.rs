//! Best-effort detection of a program blocked on interactive input.
//!
//! The detector looks for chunks that end with a colon or question mark
//! (modulo trailing whitespace) or mention a read-input call. Programs can
//! legitimately print colons without reading anything, so both false
//! positives and false negatives are tolerated by design: the signal drives
//! client-side UX only and never gates output delivery or input acceptance.

/// Substring that strongly suggests the program is reading input.
const READ_MARKER: &str = "input(";

/// Sliding-window prompt detector.
///
/// Keeps at most `cap` bytes of recent output so chatty programs cannot grow
/// the buffer without bound; a prompt split across chunk boundaries is still
/// seen because only the window's tail matters.
pub(crate) struct PromptDetector {
    window: Vec<u8>,
    cap: usize,
}

impl PromptDetector {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            window: Vec::with_capacity(cap.min(4096)),
            cap: cap.max(1),
        }
    }

    /// Append a chunk and report whether the output now looks like a prompt.
    pub(crate) fn push_chunk(&mut self, chunk: &[u8]) -> bool {
        self.window.extend_from_slice(chunk);
        if self.window.len() > self.cap {
            let excess = self.window.len() - self.cap;
            self.window.drain(..excess);
        }

        if String::from_utf8_lossy(chunk).contains(READ_MARKER) {
            return true;
        }

        let tail = String::from_utf8_lossy(&self.window);
        let trimmed = tail.trim_end();
        trimmed.ends_with(':') || trimmed.ends_with('?')
    }
}
