//! Single-pass "find matches, replace with the handler's output" primitive.
//!
//! This is the operational core every keyword feature and the full-text
//! assembler are built on. One scan walks the input left to right; each
//! leftmost non-overlapping match of the pattern is handed to a callback
//! which decides what the match contributes to the output:
//!
//! ```text
//! input:  "intitle:foo some words"
//!          └──┬────────┘└───┬────┘
//!         match -> handler   unmatched -> Raw, preserved verbatim
//! ```
//!
//! Guarantees:
//!
//! - The scan always makes forward progress, even for zero-width or
//!   rejected matches, so extraction terminates on any input.
//! - Matches are visited strictly left to right; for a given input and
//!   pattern the output is deterministic.
//!
//! [`Replacement::Reject`] exists because the `regex` crate has no
//! lookbehind: a handler can veto a match based on what precedes it (see
//! [`MatchView::at_word_start`]) and the engine resumes one character past
//! the rejected start, which is equivalent to a zero-width lookbehind over
//! the original text.

use regex::{Captures, Regex};

/// What a handler wants done with one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// The match contributes nothing to the remaining text.
    Drop,
    /// Re-inserted as ordinary text, eligible for further pattern matching
    /// by later passes.
    Raw(String),
    /// Already-finalized text; later passes must not rescan it.
    Escaped(String),
    /// Finalized text plus a separate variant restricted to individually
    /// weighted fields, used by the highlight query.
    EscapedNonAll { escaped: String, non_all: String },
    /// Decline this match; the engine rescans one character further right.
    Reject,
}

/// One piece of a partially compiled query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Unprocessed text, still subject to later extraction passes.
    Raw(String),
    /// Finalized text. `non_all` carries the per-field variant when the
    /// escaped form relies on the combined field.
    Escaped { escaped: String, non_all: Option<String> },
}

/// A single pattern match plus enough context to inspect its surroundings.
pub struct MatchView<'t> {
    text: &'t str,
    caps: Captures<'t>,
}

impl<'t> MatchView<'t> {
    /// The full matched text.
    pub fn whole(&self) -> &'t str {
        self.caps.get(0).map_or("", |m| m.as_str())
    }

    /// Byte offset of the match start in the original input.
    pub fn start(&self) -> usize {
        self.caps.get(0).map_or(0, |m| m.start())
    }

    /// A named capture group, if it participated in the match.
    pub fn group(&self, name: &str) -> Option<&'t str> {
        self.caps.name(name).map(|m| m.as_str())
    }

    /// True when the match starts the input or follows whitespace. This is
    /// the keyword boundary guard: it keeps `barincategory:x` from matching
    /// `incategory:`.
    pub fn at_word_start(&self) -> bool {
        let start = self.start();
        start == 0 || self.text[..start].ends_with(|c: char| c.is_whitespace())
    }

    /// True when the character immediately before the match is `c`.
    pub fn preceded_by(&self, c: char) -> bool {
        self.text[..self.start()].ends_with(c)
    }
}

/// Scan `text` for non-overlapping matches of `pattern`, calling `handler`
/// for each. Unmatched spans are preserved verbatim as [`Segment::Raw`].
pub fn extract<F>(text: &str, pattern: &Regex, mut handler: F) -> Vec<Segment>
where
    F: FnMut(&MatchView<'_>) -> Replacement,
{
    let mut out: Vec<Segment> = Vec::new();
    // Everything before `consumed` has been pushed; the next scan starts at
    // `search_at`, which can run ahead of `consumed` after a rejection.
    let mut consumed = 0;
    let mut search_at = 0;

    while search_at <= text.len() {
        let Some(caps) = pattern.captures_at(text, search_at) else {
            break;
        };
        let (m_start, m_end) = {
            let m = caps.get(0).expect("group 0 always participates");
            (m.start(), m.end())
        };
        let view = MatchView { text, caps };
        match handler(&view) {
            Replacement::Reject => {
                search_at = next_char_boundary(text, m_start);
                continue;
            }
            replacement => {
                if m_start > consumed {
                    push_raw(&mut out, &text[consumed..m_start]);
                }
                match replacement {
                    Replacement::Drop => {}
                    Replacement::Raw(s) => push_raw(&mut out, &s),
                    Replacement::Escaped(escaped) => {
                        out.push(Segment::Escaped { escaped, non_all: None });
                    }
                    Replacement::EscapedNonAll { escaped, non_all } => {
                        out.push(Segment::Escaped { escaped, non_all: Some(non_all) });
                    }
                    Replacement::Reject => unreachable!(),
                }
                consumed = m_end;
                // forward progress even on a zero-width match
                search_at = if m_end > m_start { m_end } else { next_char_boundary(text, m_end) };
            }
        }
    }

    if consumed < text.len() {
        push_raw(&mut out, &text[consumed..]);
    }
    out
}

/// Like [`extract`], but collapse the segments back into a single string.
/// Used by the keyword matchers, whose output is rescanned by later
/// features as plain text.
pub fn extract_to_string<F>(text: &str, pattern: &Regex, handler: F) -> String
where
    F: FnMut(&MatchView<'_>) -> Replacement,
{
    let segments = extract(text, pattern, handler);
    let mut out = String::with_capacity(text.len());
    for segment in segments {
        match segment {
            Segment::Raw(s) => out.push_str(&s),
            Segment::Escaped { escaped, .. } => out.push_str(&escaped),
        }
    }
    out
}

/// Re-scan only the [`Segment::Raw`] pieces of an already-split query,
/// leaving finalized segments untouched. One raw piece may split into
/// several segments.
pub fn rescan_raw<F>(segments: Vec<Segment>, pattern: &Regex, mut handler: F) -> Vec<Segment>
where
    F: FnMut(&MatchView<'_>) -> Replacement,
{
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Raw(raw) => out.extend(extract(&raw, pattern, &mut handler)),
            finalized => out.push(finalized),
        }
    }
    out
}

fn push_raw(out: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    // adjacent raw spans behave like one contiguous string for later passes
    if let Some(Segment::Raw(prev)) = out.last_mut() {
        prev.push_str(text);
    } else {
        out.push(Segment::Raw(text.to_string()));
    }
}

fn next_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        // past the end; returning len + 1 terminates the scan loop
        return text.len() + 1;
    }
    let mut next = pos + 1;
    while next < text.len() && !text.is_char_boundary(next) {
        next += 1;
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_unmatched_text() {
        let segments = extract("a foo b", crate::regex!("foo"), |_| Replacement::Drop);
        // the raw spans around the dropped match merge into one
        assert_eq!(segments, vec![Segment::Raw("a  b".into())]);
    }

    #[test]
    fn adjacent_raw_segments_merge() {
        let out = extract_to_string("a foo b", crate::regex!("foo"), |_| Replacement::Drop);
        assert_eq!(out, "a  b");
    }

    #[test]
    fn raw_replacement_survives_in_remaining_text() {
        let out =
            extract_to_string("x keep:me y", crate::regex!(r"keep:(\S+)"), |_| Replacement::Raw("me ".into()));
        assert_eq!(out, "x me  y");
    }

    #[test]
    fn escaped_segments_are_not_rescanned() {
        let first = extract("foo bar foo", crate::regex!("foo"), |_| Replacement::Escaped("X".into()));
        // a second pass over raw pieces cannot see inside escaped segments
        let second = rescan_raw(first, crate::regex!("X"), |_| Replacement::Drop);
        assert_eq!(
            second,
            vec![
                Segment::Escaped { escaped: "X".into(), non_all: None },
                Segment::Raw(" bar ".into()),
                Segment::Escaped { escaped: "X".into(), non_all: None },
            ]
        );
    }

    #[test]
    fn reject_resumes_after_match_start() {
        // only matches at word start are accepted
        let out = extract_to_string("afoo foo", crate::regex!("foo"), |m| {
            if m.at_word_start() { Replacement::Drop } else { Replacement::Reject }
        });
        assert_eq!(out, "afoo ");
    }

    #[test]
    fn zero_width_matches_make_progress() {
        // a pattern that can match the empty string must still terminate
        let segments = extract("ab", crate::regex!("x*"), |_| Replacement::Drop);
        assert_eq!(segments, vec![Segment::Raw("ab".into())]);
    }

    #[test]
    fn deterministic_left_to_right_order() {
        let mut seen = Vec::new();
        extract("one two three", crate::regex!(r"\w+"), |m| {
            seen.push(m.whole().to_string());
            Replacement::Drop
        });
        assert_eq!(seen, ["one", "two", "three"]);
    }
}
