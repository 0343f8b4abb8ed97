// Region classifier - turns resolved text into thinking/tool/answer regions.
// Untagged text between regions is dropped; the model is expected to wrap
// everything meaningful.

use tracing::debug;

use crate::message::Region;
use crate::tags::{scan_open, OpenScan};

/// Extract every complete region from `text` in the order they close.
///
/// Returns the regions plus the leftover suffix starting at the first
/// unclosed opening tag or dangling tag prefix. For text drained from a
/// [`TagBuffer`](crate::buffer::TagBuffer) the leftover is always empty.
pub fn extract_regions(text: &str) -> (Vec<Region>, String) {
    let mut regions = Vec::new();
    let mut pos = 0;

    loop {
        match scan_open(text, pos) {
            OpenScan::Tag { kind, at } => {
                skip_stray(&text[pos..at]);
                let body_start = at + kind.open_tag().len();
                match text[body_start..].find(kind.close_tag()) {
                    Some(offset) => {
                        let body_end = body_start + offset;
                        regions.push(Region::new(kind, &text[body_start..body_end]));
                        pos = body_end + kind.close_tag().len();
                    }
                    None => return (regions, text[at..].to_string()),
                }
            }
            OpenScan::Dangling { at } => {
                skip_stray(&text[pos..at]);
                return (regions, text[at..].to_string());
            }
            OpenScan::Clear => {
                skip_stray(&text[pos..]);
                return (regions, String::new());
            }
        }
    }
}

fn skip_stray(fragment: &str) {
    if !fragment.trim().is_empty() {
        debug!("Dropping {} bytes of untagged model output", fragment.len());
    }
}
