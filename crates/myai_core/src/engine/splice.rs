//! Text splicing against a captured context.

use std::fmt::{Display, Formatter};

/// Why a span cannot be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceError {
    Inverted { start: usize, end: usize },
    OutOfBounds { end: usize, len: usize },
    NotCharBoundary { offset: usize },
}

impl Display for SpliceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inverted { start, end } => write!(f, "span start {start} is after end {end}"),
            Self::OutOfBounds { end, len } => {
                write!(f, "span end {end} exceeds text length {len}")
            }
            Self::NotCharBoundary { offset } => {
                write!(f, "offset {offset} is not on a character boundary")
            }
        }
    }
}

impl std::error::Error for SpliceError {}

/// Validates that `start..end` is a well-formed byte span of `text`.
pub fn check_span(text: &str, start: usize, end: usize) -> Result<(), SpliceError> {
    if start > end {
        return Err(SpliceError::Inverted { start, end });
    }
    if end > text.len() {
        return Err(SpliceError::OutOfBounds {
            end,
            len: text.len(),
        });
    }
    for offset in [start, end] {
        if !text.is_char_boundary(offset) {
            return Err(SpliceError::NotCharBoundary { offset });
        }
    }
    Ok(())
}

/// Returns `text[..start] + replacement + text[end..]`.
pub fn splice(text: &str, start: usize, end: usize, replacement: &str) -> Result<String, SpliceError> {
    check_span(text, start, end)?;
    let mut out = String::with_capacity(text.len() - (end - start) + replacement.len());
    out.push_str(&text[..start]);
    out.push_str(replacement);
    out.push_str(&text[end..]);
    Ok(out)
}
