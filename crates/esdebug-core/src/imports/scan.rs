//! Import declaration scanner.
//!
//! Finds the specifier literals of static `import` declarations and
//! `export … from` re-exports without building an AST. Comments, strings,
//! template literals and regex literals are skipped so that import-looking
//! text inside them is never reported. Dynamic `import()`, `import.meta` and `require`
//! calls are not declarations and are left alone.
//!
//! All syntax the scanner cares about is ASCII, so it walks bytes and every
//! offset it reports is a valid `str` boundary.
//!
//! Whether a `/` opens a regex or divides is decided from the previous
//! significant token, the usual heuristic for tokenizing JS without a parser.

use super::{AnalyzeError, CodeAnalyzer, ImportKind, ImportStatement};
use crate::rewrite::TextRange;

/// The built-in analyzer, backed by [`scan_imports`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanAnalyzer;

impl CodeAnalyzer for ScanAnalyzer {
    fn analyze(&self, code: &str) -> Result<Vec<ImportStatement>, AnalyzeError> {
        scan_imports(code)
    }
}

/// Scan source code for import and re-export specifiers.
///
/// Returns every occurrence in source order, duplicates included, each with
/// the byte range of its string literal (quotes included).
pub fn scan_imports(source: &str) -> Result<Vec<ImportStatement>, AnalyzeError> {
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut results = Vec::new();
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i)?,
            b'/' if starts_regex(bytes, i) => i = skip_regex(bytes, i),
            b'"' | b'\'' => i = string_literal(bytes, i)?.to,
            b'`' => i = skip_template(bytes, i)?,
            _ if matches_keyword(bytes, i, b"import") => {
                if let Some(range) = scan_import_declaration(bytes, i + 6)? {
                    results.push(statement(source, range, ImportKind::Import));
                    i = range.to;
                } else {
                    i += 6;
                }
            }
            _ if matches_keyword(bytes, i, b"export") => {
                if let Some(range) = scan_export_from(bytes, i + 6)? {
                    results.push(statement(source, range, ImportKind::ExportFrom));
                    i = range.to;
                } else {
                    i += 6;
                }
            }
            _ => i += 1,
        }
    }

    Ok(results)
}

fn statement(source: &str, range: TextRange, kind: ImportKind) -> ImportStatement {
    let value = &source[range.from + 1..range.to - 1];
    ImportStatement::new(value, range).with_kind(kind)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_quote(b: u8) -> bool {
    b == b'"' || b == b'\''
}

/// Check if bytes at `pos` are `keyword` with word boundaries on both sides.
///
/// A preceding `.` also disqualifies the match (`obj.import`).
fn matches_keyword(bytes: &[u8], pos: usize, keyword: &[u8]) -> bool {
    let end = pos + keyword.len();
    if end > bytes.len() || &bytes[pos..end] != keyword {
        return false;
    }

    if pos > 0 && (is_ident_byte(bytes[pos - 1]) || bytes[pos - 1] == b'.') {
        return false;
    }

    !(end < bytes.len() && is_ident_byte(bytes[end]))
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset)
}

fn skip_block_comment(bytes: &[u8], start: usize) -> Result<usize, AnalyzeError> {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return Ok(i + 2);
        }
        i += 1;
    }
    Err(AnalyzeError::at("unterminated block comment", start))
}

/// Keywords after which a `/` starts a regex rather than a division.
const REGEX_PREFIX_KEYWORDS: &[&[u8]] = &[
    b"return",
    b"typeof",
    b"instanceof",
    b"in",
    b"of",
    b"new",
    b"delete",
    b"void",
    b"throw",
    b"case",
    b"do",
    b"else",
    b"yield",
    b"await",
];

/// Whether the `/` at `pos` opens a regex literal.
fn starts_regex(bytes: &[u8], pos: usize) -> bool {
    let mut end = pos;
    while end > 0 && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    let Some(&prev) = end.checked_sub(1).and_then(|p| bytes.get(p)) else {
        return true;
    };

    if is_ident_byte(prev) {
        let mut start = end;
        while start > 0 && is_ident_byte(bytes[start - 1]) {
            start -= 1;
        }
        if start > 0 && bytes[start - 1] == b'.' {
            return false;
        }
        return REGEX_PREFIX_KEYWORDS.contains(&&bytes[start..end]);
    }

    matches!(
        prev,
        b'(' | b','
            | b'='
            | b':'
            | b'['
            | b'!'
            | b'&'
            | b'|'
            | b'?'
            | b'{'
            | b'}'
            | b';'
            | b'+'
            | b'-'
            | b'*'
            | b'%'
            | b'<'
            | b'>'
            | b'~'
            | b'^'
    )
}

/// Skip the regex literal opening at `start`, flags included.
///
/// A `/` with no closing `/` on the same line is treated as a lone operator.
fn skip_regex(bytes: &[u8], start: usize) -> usize {
    let mut in_class = false;
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' | b'\r' => break,
            b'[' => {
                in_class = true;
                i += 1;
            }
            b']' => {
                in_class = false;
                i += 1;
            }
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
                return i;
            }
            _ => i += 1,
        }
    }
    start + 1
}

/// Skip whitespace and comments.
fn skip_trivia(bytes: &[u8], start: usize) -> Result<usize, AnalyzeError> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b if b.is_ascii_whitespace() => i += 1,
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i)?,
            _ => break,
        }
    }
    Ok(i)
}

/// Range of the quoted string literal starting at `start`.
fn string_literal(bytes: &[u8], start: usize) -> Result<TextRange, AnalyzeError> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => break,
            b if b == quote => return Ok(TextRange::new(start, i + 1)),
            _ => i += 1,
        }
    }
    Err(AnalyzeError::at("unterminated string literal", start))
}

fn skip_template(bytes: &[u8], start: usize) -> Result<usize, AnalyzeError> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Ok(i + 1),
            b'$' if bytes.get(i + 1) == Some(&b'{') => i = skip_braces(bytes, i + 1)?,
            _ => i += 1,
        }
    }
    Err(AnalyzeError::at("unterminated template literal", start))
}

/// Skip a balanced `{ … }` block starting at the opening brace.
fn skip_braces(bytes: &[u8], start: usize) -> Result<usize, AnalyzeError> {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            b'"' | b'\'' => i = string_literal(bytes, i)?.to,
            b'`' => i = skip_template(bytes, i)?,
            b'/' if matches!(bytes.get(i + 1), Some(b'/' | b'*')) => i = skip_trivia(bytes, i)?,
            b'/' if starts_regex(bytes, i) => i = skip_regex(bytes, i),
            _ => i += 1,
        }
    }
    Err(AnalyzeError::at("unbalanced braces", start))
}

/// Scan what follows an `import` keyword.
///
/// Returns `None` when the keyword does not start a declaration
/// (`import(…)`, `import.meta`, an object key named `import`).
fn scan_import_declaration(bytes: &[u8], pos: usize) -> Result<Option<TextRange>, AnalyzeError> {
    let i = skip_trivia(bytes, pos)?;
    match bytes.get(i) {
        Some(&b) if is_quote(b) => string_literal(bytes, i).map(Some),
        Some(&b) if b == b'{' || b == b'*' || is_ident_byte(b) => scan_clause_source(bytes, i, pos),
        _ => Ok(None),
    }
}

/// Scan what follows an `export` keyword for a `from` clause.
fn scan_export_from(bytes: &[u8], pos: usize) -> Result<Option<TextRange>, AnalyzeError> {
    let i = skip_trivia(bytes, pos)?;
    match bytes.get(i) {
        Some(b'*') => scan_clause_source(bytes, i + 1, pos),
        Some(b'{') => {
            let after = skip_trivia(bytes, skip_braces(bytes, i)?)?;
            if !matches_keyword(bytes, after, b"from") {
                // Local `export { a, b };`
                return Ok(None);
            }
            let literal = skip_trivia(bytes, after + 4)?;
            match bytes.get(literal) {
                Some(&b) if is_quote(b) => string_literal(bytes, literal).map(Some),
                _ => Err(AnalyzeError::at("expected module specifier after from", literal)),
            }
        }
        _ => Ok(None),
    }
}

/// Walk an import/export clause up to `from "<specifier>"`.
///
/// `decl_start` is only used for error reporting.
fn scan_clause_source(
    bytes: &[u8],
    start: usize,
    decl_start: usize,
) -> Result<Option<TextRange>, AnalyzeError> {
    let mut i = start;
    loop {
        i = skip_trivia(bytes, i)?;
        let Some(&b) = bytes.get(i) else {
            return Err(AnalyzeError::at("unterminated import declaration", decl_start));
        };

        match b {
            b'{' => i = skip_braces(bytes, i)?,
            b';' => return Err(AnalyzeError::at("missing from clause", i)),
            // TypeScript `import x = require("…")`
            b'=' => return Ok(None),
            _ if is_quote(b) => return Err(AnalyzeError::at("unexpected string literal", i)),
            _ if matches_keyword(bytes, i, b"from") => {
                let literal = skip_trivia(bytes, i + 4)?;
                if bytes.get(literal).copied().is_some_and(is_quote) {
                    return string_literal(bytes, literal).map(Some);
                }
                // `from` used as a binding name
                i += 4;
            }
            _ if is_ident_byte(b) => {
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
}
