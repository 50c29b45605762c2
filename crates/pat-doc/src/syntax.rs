//! The syntax seam. The editor core never parses anything; a highlighter is
//! handed the whole buffer after every change and answers with capture-named
//! byte spans that the drawing code resolves through the theme.

use pat_text::{Buffer, Slice};

/// A highlighted byte range. `capture` is a dotted scope name such as
/// `"keyword"` or `"string.special"`; the theme decides what it looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    pub range: Slice,
    pub capture: String,
}

/// Full-reparse-on-change highlighting contract.
pub trait Highlighter: Send {
    fn highlight(&mut self, buffer: &Buffer, language: &str) -> Vec<HighlightSpan>;
}

/// The default: no styling at all.
pub struct NoHighlight;

impl Highlighter for NoHighlight {
    fn highlight(&mut self, _buffer: &Buffer, _language: &str) -> Vec<HighlightSpan> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_highlight_is_empty() {
        let buffer = Buffer::from_str("fn main() {}");
        let mut h = NoHighlight;
        assert!(h.highlight(&buffer, "rust").is_empty());
    }
}
