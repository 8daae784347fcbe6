//! Virtual path handling.
//!
//! All paths here are `/`-separated strings in the server's virtual
//! namespace, not OS paths, so nothing in this module touches `std::path`.

use crate::error::ContractError;

/// Separator used by every virtual path.
pub const SEPARATOR: char = '/';

/// Which structural rules a validated path must satisfy.
#[derive(Debug, Clone, Copy)]
struct PathRules {
    reject_dot_segments: bool,
    reject_trailing_separator: bool,
}

const ROOT_FOLDER_RULES: PathRules = PathRules {
    reject_dot_segments: true,
    reject_trailing_separator: true,
};

const URI_RULES: PathRules = PathRules {
    reject_dot_segments: false,
    reject_trailing_separator: false,
};

fn check(label: &'static str, path: &str, rules: PathRules) -> Result<(), ContractError> {
    if !path.starts_with(SEPARATOR) {
        return Err(ContractError::NotAbsolute { label });
    }

    if path.contains("//") {
        return Err(ContractError::DoubleSeparator { label });
    }

    if rules.reject_dot_segments && path.split(SEPARATOR).any(|part| part == ".") {
        return Err(ContractError::DotSegment { label });
    }

    if path.split(SEPARATOR).any(|part| part == "..") {
        return Err(ContractError::DotDotSegment { label });
    }

    if rules.reject_trailing_separator && path.ends_with(SEPARATOR) {
        return Err(ContractError::TrailingSeparator { label });
    }

    Ok(())
}

/// Check that `path` is absolute, has no empty, `.` or `..` segments and no
/// trailing separator.
///
/// Rules are checked in a fixed order and the first violation is returned:
/// leading separator, doubled separator, `.` segment, `..` segment, trailing
/// separator.
pub fn assert_nice_absolute_path(label: &'static str, path: &str) -> Result<(), ContractError> {
    check(label, path, ROOT_FOLDER_RULES)
}

/// Check the shape of an incoming request URI.
///
/// URIs may end with a separator and may contain `.` segments, but must be
/// absolute and must not contain `//` or any `..` segment.
pub fn assert_valid_uri(uri: &str) -> Result<(), ContractError> {
    check("uri", uri, URI_RULES)
}

/// Check that the virtual root folder is one usable path segment.
pub fn assert_virtual_root(name: &str) -> Result<(), ContractError> {
    if name.is_empty() || name.contains(SEPARATOR) || name == "." || name == ".." {
        return Err(ContractError::InvalidVirtualRoot(name.to_string()));
    }
    Ok(())
}

/// Whether a specifier is written relative to its importer.
#[must_use]
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Directory part of a virtual path.
///
/// `/a/b/c.js` → `/a/b`, `/c.js` → `/`, `c.js` → `.`.
#[must_use]
pub fn dirname(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => ".",
    }
}

/// Collapse `.` and `..` segments and empty segments.
///
/// Absolute paths never climb above `/`; relative paths keep leading `..`.
#[must_use]
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with(SEPARATOR);
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split(SEPARATOR) {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Join `rel` onto `base` and normalize the result.
#[must_use]
pub fn join(base: &str, rel: &str) -> String {
    if rel.starts_with(SEPARATOR) {
        return normalize(rel);
    }
    normalize(&format!("{base}/{rel}"))
}

/// Path from directory `from` to `to`, both absolute.
///
/// Returns an empty string when both point at the same location.
#[must_use]
pub fn relative(from: &str, to: &str) -> String {
    let from = normalize(from);
    let to = normalize(to);

    let from_parts: Vec<&str> = from.split(SEPARATOR).filter(|p| !p.is_empty()).collect();
    let to_parts: Vec<&str> = to.split(SEPARATOR).filter(|p| !p.is_empty()).collect();

    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from_parts.len() - common];
    parts.extend_from_slice(&to_parts[common..]);
    parts.join("/")
}

/// Relative path usable as an ES module specifier.
///
/// Unlike [`relative`], the result always starts with `./` or `../` so the
/// browser never mistakes it for a bare specifier.
#[must_use]
pub fn relative_specifier(from_dir: &str, to: &str) -> String {
    let rel = relative(from_dir, to);
    if rel.starts_with("../") || rel == ".." {
        rel
    } else if rel.is_empty() {
        "./".to_string()
    } else {
        format!("./{rel}")
    }
}
