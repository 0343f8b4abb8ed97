// Streaming interceptor - one turn's view of the model stream. Feeds deltas
// through the tag buffer and hands back regions as soon as they close.

use tracing::{debug, warn};

use crate::buffer::TagBuffer;
use crate::classifier::extract_regions;
use crate::message::Region;

#[derive(Debug, Default)]
pub struct StreamingInterceptor {
    buffer: TagBuffer,
    /// Every byte the model produced this turn, tags included.
    raw: String,
}

impl StreamingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one delta and return the regions it completed, in order.
    pub fn push(&mut self, delta: &str) -> Vec<Region> {
        self.raw.push_str(delta);
        self.buffer.append(delta);

        let (resolved, pending) = self.buffer.drain_complete();
        if resolved.is_empty() {
            return Vec::new();
        }

        let (regions, leftover) = extract_regions(&resolved);
        if !leftover.is_empty() {
            // Resolved text never ends inside a tag.
            warn!("Classifier left {} unresolved bytes", leftover.len());
        }
        debug!(
            "Resolved {} bytes into {} regions, {} bytes pending",
            resolved.len(),
            regions.len(),
            pending.len()
        );
        regions
    }

    /// End of turn: returns the raw output and whatever never resolved.
    pub fn finish(self) -> (String, String) {
        (self.raw, self.buffer.into_remainder())
    }
}
