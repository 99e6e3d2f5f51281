//! Text helpers for the reading engines

use serde::Serialize;
use std::ops::Range;

/// Character index emphasized in each displayed word
pub const FOCAL_INDEX: usize = 2;

/// Split text into words on any whitespace, discarding empty tokens
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(String::from).collect()
}

/// Byte ranges of the whitespace-separated words in `text`
pub fn word_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = None;

    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                ranges.push(s..i);
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        ranges.push(s..text.len());
    }

    ranges
}

/// Approximate word count used for session statistics
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// A word as shown by the speed reader.
///
/// Words longer than two characters have their third character marked as
/// the focal letter. This only affects rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayWord {
    pub text: String,
    /// Character (not byte) index of the focal letter
    pub focus: Option<usize>,
}

impl DisplayWord {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let focus = (text.chars().count() > FOCAL_INDEX).then_some(FOCAL_INDEX);
        Self { text, focus }
    }

    /// Split into (before, focal letter, after) for rendering
    pub fn parts(&self) -> (&str, Option<&str>, &str) {
        let Some(focus) = self.focus else {
            return (&self.text, None, "");
        };

        let mut indices = self.text.char_indices().skip(focus);
        match indices.next() {
            Some((start, c)) => {
                let end = start + c.len_utf8();
                (&self.text[..start], Some(&self.text[start..end]), &self.text[end..])
            }
            None => (&self.text, None, ""),
        }
    }
}

impl std::fmt::Display for DisplayWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}
