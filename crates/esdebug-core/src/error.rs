use std::path::PathBuf;
use thiserror::Error;

use crate::imports::AnalyzeError;
use crate::reader::ReadError;
use crate::resolve::ResolveError;
use crate::rewrite::RewriteError;

/// Failure loading `esdebug.json`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A host programming error: a root folder or request URI with the wrong shape.
///
/// These are returned synchronously by the call that introduced the bad value
/// and never travel through a request's responder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("{label} must start with /")]
    NotAbsolute { label: &'static str },

    #[error("{label} must not contain //")]
    DoubleSeparator { label: &'static str },

    #[error("{label} must not contain .")]
    DotSegment { label: &'static str },

    #[error("{label} must not contain ..")]
    DotDotSegment { label: &'static str },

    #[error("{label} must not end with /")]
    TrailingSeparator { label: &'static str },

    #[error("virtualRootFolder must be a single path segment, got {0:?}")]
    InvalidVirtualRoot(String),
}

/// Failure delivered through [`ScriptResponse::InternalError`](crate::server::ScriptResponse).
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("failed to read file \"{file_path}\" resolved from \"{uri}\"")]
    Read {
        file_path: String,
        uri: String,
        #[source]
        source: ReadError,
    },

    #[error("failed to analyze \"{file_path}\"")]
    Analyze {
        file_path: String,
        #[source]
        source: AnalyzeError,
    },

    #[error("failed to resolve imports of \"{importer}\"")]
    Resolve {
        importer: String,
        #[source]
        source: ResolveError,
    },

    #[error("failed to rewrite imports of \"{file_path}\"")]
    Rewrite {
        file_path: String,
        #[source]
        source: RewriteError,
    },

    #[error("request for \"{uri}\" ended without a response")]
    Aborted { uri: String },
}

impl ServeError {
    /// Render the error and its whole `source()` chain on one line.
    #[must_use]
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            current = cause.source();
        }
        out
    }
}
