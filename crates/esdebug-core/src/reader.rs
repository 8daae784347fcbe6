//! Script reading capability.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use thiserror::Error;

/// Why a script could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadErrorKind {
    /// Nothing exists at the requested path.
    FileNotFound,
    /// Anything else.
    Io,
}

impl ReadErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::Io => "IO_ERROR",
        }
    }
}

/// Failure reported by a [`ScriptReader`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ReadError {
    pub kind: ReadErrorKind,
    pub message: String,
    #[source]
    pub source: Option<std::io::Error>,
}

impl ReadError {
    #[must_use]
    pub fn new(kind: ReadErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ReadErrorKind::FileNotFound, message)
    }

    /// Classify an I/O error; `NotFound` maps to [`ReadErrorKind::FileNotFound`].
    #[must_use]
    pub fn from_io(file_path: &str, source: std::io::Error) -> Self {
        let kind = if source.kind() == std::io::ErrorKind::NotFound {
            ReadErrorKind::FileNotFound
        } else {
            ReadErrorKind::Io
        };
        Self {
            kind,
            message: format!("{}: cannot read \"{file_path}\"", kind.as_str()),
            source: Some(source),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ReadErrorKind::FileNotFound
    }
}

/// Loads script source by absolute virtual path.
///
/// Must be safe to call concurrently from many requests.
pub trait ScriptReader: Send + Sync {
    fn read(&self, file_path: &str) -> BoxFuture<'static, Result<String, ReadError>>;
}

impl<F, Fut> ScriptReader for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, ReadError>> + Send + 'static,
{
    fn read(&self, file_path: &str) -> BoxFuture<'static, Result<String, ReadError>> {
        self(file_path.to_string()).boxed()
    }
}

/// Reads scripts straight from the local file system with `tokio::fs`.
///
/// Virtual paths are used as OS paths unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsScriptReader;

impl ScriptReader for FsScriptReader {
    fn read(&self, file_path: &str) -> BoxFuture<'static, Result<String, ReadError>> {
        let file_path = file_path.to_string();
        async move {
            tokio::fs::read_to_string(&file_path)
                .await
                .map_err(|e| ReadError::from_io(&file_path, e))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_reader_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.js");
        std::fs::write(&path, "export default 1;").unwrap();

        let content = FsScriptReader
            .read(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(content, "export default 1;");
    }

    #[tokio::test]
    async fn test_fs_reader_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.js");

        let err = FsScriptReader
            .read(path.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.source.is_some());
    }

    #[tokio::test]
    async fn test_fs_reader_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();

        let err = FsScriptReader
            .read(dir.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ReadErrorKind::Io);
    }

    #[tokio::test]
    async fn test_closure_is_a_reader() {
        let reader = |file_path: String| async move { Ok::<_, ReadError>(format!("// {file_path}")) };
        let content = reader.read("/a/b.js").await.unwrap();
        assert_eq!(content, "// /a/b.js");
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(ReadErrorKind::FileNotFound.as_str(), "FILE_NOT_FOUND");
        assert_eq!(ReadErrorKind::Io.as_str(), "IO_ERROR");
    }
}
