// Tag vocabulary of the model wire format and the low-level scanner shared by
// the tag buffer and the region classifier.

use crate::message::RegionKind;

pub const KNOWN_KINDS: [RegionKind; 3] =
    [RegionKind::Thinking, RegionKind::Tool, RegionKind::Answer];

impl RegionKind {
    pub fn open_tag(self) -> &'static str {
        match self {
            RegionKind::Thinking => "<thinking>",
            RegionKind::Tool => "<tool>",
            RegionKind::Answer => "<answer>",
        }
    }

    pub fn close_tag(self) -> &'static str {
        match self {
            RegionKind::Thinking => "</thinking>",
            RegionKind::Tool => "</tool>",
            RegionKind::Answer => "</answer>",
        }
    }
}

/// What the scanner found at the next `<` worth looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenScan {
    /// A complete opening tag starts at `at`.
    Tag { kind: RegionKind, at: usize },
    /// Text from `at` to the end is a proper prefix of an opening tag and
    /// may still become one once more text arrives.
    Dangling { at: usize },
    /// No opening tag or tag prefix from the scan position onward.
    Clear,
}

/// Scan `text[from..]` for the next opening tag.
///
/// A `<` that cannot begin any known opening tag is plain text and skipped.
pub fn scan_open(text: &str, from: usize) -> OpenScan {
    let mut pos = from;
    while let Some(offset) = text[pos..].find('<') {
        let at = pos + offset;
        let rest = &text[at..];
        for kind in KNOWN_KINDS {
            if rest.starts_with(kind.open_tag()) {
                return OpenScan::Tag { kind, at };
            }
        }
        if is_open_tag_prefix(rest) {
            return OpenScan::Dangling { at };
        }
        pos = at + 1;
    }
    OpenScan::Clear
}

/// True if `fragment` is a strict prefix of one of the opening tags.
pub fn is_open_tag_prefix(fragment: &str) -> bool {
    KNOWN_KINDS.iter().any(|kind| {
        let tag = kind.open_tag();
        fragment.len() < tag.len() && tag.starts_with(fragment)
    })
}

/// True if `text` contains any complete opening tag.
pub fn contains_open_tag(text: &str) -> bool {
    KNOWN_KINDS.iter().any(|kind| text.contains(kind.open_tag()))
}

/// Largest char boundary `<= index`.
pub fn floor_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
