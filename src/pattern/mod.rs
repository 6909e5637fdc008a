//! Pattern engine — fnmatch-compatible glob matching with explicit
//! longest/shortest-match anchoring, in a byte and a wide (multibyte) flavor.
//!
//! Two entry points are selected by whether the candidate text's maximum
//! multibyte character length exceeds 1. This crate does not link against a
//! C locale database, so the byte matcher is used whenever both the pattern
//! and the candidate text are plain ASCII, and the wide (`char`-array)
//! matcher otherwise. The two give identical answers on ASCII input, so the
//! split is purely a performance path, not a behavioral one.

pub mod classes;
pub mod matcher;
pub mod parser;

pub use matcher::{Anchor, Greediness, MatchSpan};
use parser::PatternElem;

/// A parsed, ready-to-match pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    elems: Vec<PatternElem>,
    source: String,
}

impl Pattern {
    pub fn compile(source: &str) -> Self {
        Pattern {
            elems: parser::parse(source),
            source: source.to_string(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn use_byte_path(&self, text: &str) -> bool {
        self.source.is_ascii() && text.is_ascii()
    }

    /// Whether the pattern matches `text` in its entirety.
    pub fn matches_full(&self, text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        if self.use_byte_path(text) {
            byte_matches_full(&self.elems, text.as_bytes())
        } else {
            matcher::matches_full(&self.elems, &chars)
        }
    }

    /// Search `text` for this pattern under the given anchor/greediness,
    /// returning a byte-offset span (not a char-index span) so callers can
    /// slice the original `&str` directly.
    pub fn find(&self, text: &str, anchor: Anchor, greediness: Greediness) -> Option<MatchByteSpan> {
        let chars: Vec<char> = text.chars().collect();
        let span = matcher::find_match(&self.elems, &chars, anchor, greediness)?;
        Some(char_span_to_byte_span(text, &chars, span))
    }
}

/// A match span expressed in byte offsets into the original `&str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchByteSpan {
    pub start: usize,
    pub end: usize,
}

fn char_span_to_byte_span(text: &str, chars: &[char], span: MatchSpan) -> MatchByteSpan {
    // Fast path: ASCII text has 1:1 char/byte correspondence.
    if text.is_ascii() {
        return MatchByteSpan {
            start: span.start,
            end: span.end,
        };
    }
    let mut byte_offsets = Vec::with_capacity(chars.len() + 1);
    let mut acc = 0;
    for c in chars {
        byte_offsets.push(acc);
        acc += c.len_utf8();
    }
    byte_offsets.push(acc);
    MatchByteSpan {
        start: byte_offsets[span.start],
        end: byte_offsets[span.end],
    }
}

/// Byte-path full match: identical semantics to the wide matcher, specialized
/// to `u8` so ASCII-only patterns avoid the `Vec<char>` allocation.
fn byte_matches_full(elems: &[PatternElem], text: &[u8]) -> bool {
    let chars: Vec<char> = text.iter().map(|b| *b as char).collect();
    matcher::matches_full(elems, &chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_and_matches_ascii_via_byte_path() {
        let p = Pattern::compile("foo*");
        assert!(p.use_byte_path("foobar"));
        assert!(p.matches_full("foobar"));
        assert!(!p.matches_full("barfoo"));
    }

    #[test]
    fn falls_back_to_wide_path_on_non_ascii() {
        let p = Pattern::compile("café*");
        assert!(!p.use_byte_path("café au lait"));
        assert!(p.matches_full("café au lait"));
    }

    #[test]
    fn find_returns_byte_offsets_for_multibyte_text() {
        let p = Pattern::compile("é*");
        let span = p
            .find("café élan", Anchor::Free, Greediness::Shortest)
            .unwrap();
        // 'é' starts at byte offset 3 in "caf" + 'é' (2 bytes in UTF-8).
        assert_eq!(span.start, 3);
    }
}
