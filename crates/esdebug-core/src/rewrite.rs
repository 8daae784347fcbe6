//! Range-based source rewriting.
//!
//! Every replacement is expressed in the coordinates of the *original*
//! source. Replacements are sorted once by descending start offset and
//! spliced back-to-front, so an edit never moves the text a pending edit
//! points at.

use thiserror::Error;

/// Half-open byte range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub from: usize,
    pub to: usize,
}

impl TextRange {
    #[must_use]
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }
}

/// Substitute `range` of the original source with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub replacement: String,
    pub range: TextRange,
}

impl Replacement {
    #[must_use]
    pub fn new(replacement: impl Into<String>, range: TextRange) -> Self {
        Self {
            replacement: replacement.into(),
            range,
        }
    }
}

/// A replacement set that cannot be applied to the given source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewriteError {
    #[error("range {from}..{to} is reversed")]
    Reversed { from: usize, to: usize },

    #[error("range {from}..{to} is out of bounds for {len} bytes of source")]
    OutOfBounds { from: usize, to: usize, len: usize },

    #[error("range {from}..{to} does not fall on character boundaries")]
    NotCharBoundary { from: usize, to: usize },

    #[error("ranges {first:?} and {second:?} overlap")]
    Overlap { first: TextRange, second: TextRange },
}

fn check_range(code: &str, range: TextRange) -> Result<(), RewriteError> {
    let TextRange { from, to } = range;
    if from > to {
        return Err(RewriteError::Reversed { from, to });
    }
    if to > code.len() {
        return Err(RewriteError::OutOfBounds {
            from,
            to,
            len: code.len(),
        });
    }
    if !code.is_char_boundary(from) || !code.is_char_boundary(to) {
        return Err(RewriteError::NotCharBoundary { from, to });
    }
    Ok(())
}

/// Apply all `replacements` to `code` in one pass over the original text.
///
/// The result does not depend on the order of `replacements`. Ranges must
/// not overlap; two empty insertions at the same offset count as
/// overlapping since their order would be ambiguous.
pub fn rewrite_code(code: &str, replacements: &[Replacement]) -> Result<String, RewriteError> {
    if replacements.is_empty() {
        return Ok(code.to_string());
    }

    let mut last_to_first: Vec<&Replacement> = replacements.iter().collect();
    last_to_first.sort_by(|a, b| b.range.from.cmp(&a.range.from));

    for replacement in &last_to_first {
        check_range(code, replacement.range)?;
    }

    for pair in last_to_first.windows(2) {
        let (later, earlier) = (pair[0].range, pair[1].range);
        if earlier.to > later.from || earlier.from == later.from {
            return Err(RewriteError::Overlap {
                first: earlier,
                second: later,
            });
        }
    }

    let mut result = code.to_string();
    for replacement in last_to_first {
        let TextRange { from, to } = replacement.range;
        result.replace_range(from..to, &replacement.replacement);
    }

    Ok(result)
}
