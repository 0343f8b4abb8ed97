// Tag buffer - accumulates raw deltas and releases only text whose tags are
// fully resolved. Anything that could still turn into a tag stays behind.

use crate::message::RegionKind;
use crate::tags::{floor_boundary, scan_open, OpenScan};

/// Accumulator for one turn's model output.
///
/// `text[..cursor]` has already been scanned. Scanning resumes from the
/// cursor on every drain instead of re-reading the whole buffer.
#[derive(Debug, Default)]
pub struct TagBuffer {
    text: String,
    cursor: usize,
    /// Region whose opening tag was seen but whose closing tag was not.
    open: Option<(RegionKind, usize)>,
}

impl TagBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    /// Remove and return the longest resolved prefix, along with a view of
    /// what is still held back.
    ///
    /// The resolved prefix never contains an opening tag without its close,
    /// nor a trailing `<...` that could still grow into an opening tag.
    pub fn drain_complete(&mut self) -> (String, String) {
        let end = self.advance();
        let resolved: String = self.text.drain(..end).collect();
        self.cursor -= end;
        if let Some((_, start)) = self.open.as_mut() {
            *start -= end;
        }
        (resolved, self.text.clone())
    }

    /// Unresolved text still held in the buffer.
    pub fn pending(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Consume the buffer, returning whatever never resolved.
    pub fn into_remainder(self) -> String {
        self.text
    }

    // Moves the cursor as far as the current text allows and returns the
    // end of the resolved prefix.
    fn advance(&mut self) -> usize {
        loop {
            match self.open {
                Some((kind, start)) => {
                    let close = kind.close_tag();
                    match self.text[self.cursor..].find(close) {
                        Some(offset) => {
                            self.cursor += offset + close.len();
                            self.open = None;
                        }
                        None => {
                            // Re-check the tail next time: it may be the start
                            // of the closing tag.
                            let resume = self
                                .text
                                .len()
                                .saturating_sub(close.len() - 1)
                                .max(self.cursor);
                            self.cursor = floor_boundary(&self.text, resume);
                            return start;
                        }
                    }
                }
                None => match scan_open(&self.text, self.cursor) {
                    OpenScan::Tag { kind, at } => {
                        self.cursor = at + kind.open_tag().len();
                        self.open = Some((kind, at));
                    }
                    OpenScan::Dangling { at } => {
                        self.cursor = at;
                        return at;
                    }
                    OpenScan::Clear => {
                        self.cursor = self.text.len();
                        return self.text.len();
                    }
                },
            }
        }
    }
}
