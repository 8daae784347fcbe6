//! Import discovery for ES module source.
//!
//! The analyzer is pluggable: anything implementing [`CodeAnalyzer`] can
//! stand in for the built-in [`ScanAnalyzer`], including plain closures.

mod scan;

pub use scan::{scan_imports, ScanAnalyzer};

use crate::rewrite::TextRange;
use thiserror::Error;

/// Which kind of declaration a specifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x from "..."` or `import "..."`.
    Import,
    /// `export { x } from "..."` or `export * from "..."`.
    ExportFrom,
}

/// One module specifier literal found in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    /// Specifier exactly as written, without quotes.
    pub value: String,
    /// Byte range of the string literal, quotes included, in the analyzed source.
    pub range: TextRange,
    /// Declaration the specifier belongs to.
    pub kind: ImportKind,
}

impl ImportStatement {
    /// Create an `import` declaration entry.
    #[must_use]
    pub fn new(value: impl Into<String>, range: TextRange) -> Self {
        Self {
            value: value.into(),
            range,
            kind: ImportKind::Import,
        }
    }

    /// Set the declaration kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ImportKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Source could not be analyzed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}{}", format_offset(.offset))]
pub struct AnalyzeError {
    /// What went wrong.
    pub message: String,
    /// Byte offset in the source, when known.
    pub offset: Option<usize>,
}

impl AnalyzeError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
        }
    }

    #[must_use]
    pub fn at(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset: Some(offset),
        }
    }
}

fn format_offset(offset: &Option<usize>) -> String {
    offset.map(|o| format!(" at byte {o}")).unwrap_or_default()
}

/// Finds the import specifiers of a piece of source code.
///
/// Implementations must report accurate, non-overlapping byte ranges into
/// the code they were given.
pub trait CodeAnalyzer: Send + Sync {
    fn analyze(&self, code: &str) -> Result<Vec<ImportStatement>, AnalyzeError>;
}

impl<F> CodeAnalyzer for F
where
    F: Fn(&str) -> Result<Vec<ImportStatement>, AnalyzeError> + Send + Sync,
{
    fn analyze(&self, code: &str) -> Result<Vec<ImportStatement>, AnalyzeError> {
        self(code)
    }
}
