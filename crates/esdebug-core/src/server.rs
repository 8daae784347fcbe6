//! Request handling engine.
//!
//! A [`ScriptServer`] maps request URIs onto the virtual namespace. URIs
//! outside `/<virtualRootFolder>/` are redirected into it; URIs inside are
//! read, analyzed, have their bare imports resolved and rewritten, and are
//! served as JavaScript.
//!
//! ```text
//! GET /ui/index.js
//!   → 307 /$root/my/script/root/ui/index.js
//! GET /$root/my/script/root/ui/index.js
//!   → read /my/script/root/ui/index.js
//!   → analyze imports
//!   → resolve bare specifiers (deduped, concurrent)
//!   → rewrite specifier literals
//!   → text/javascript
//! ```

use crate::error::{ContractError, ServeError};
use crate::imports::{CodeAnalyzer, ImportStatement, ScanAnalyzer};
use crate::paths::{
    assert_nice_absolute_path, assert_valid_uri, assert_virtual_root, dirname,
    is_relative_specifier, relative_specifier,
};
use crate::reader::ScriptReader;
use crate::resolve::{resolve_all_imports, ImportResolver, RelativeImportResolver};
use crate::rewrite::{rewrite_code, Replacement};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, info_span, warn, Instrument};

/// Content type of every served script.
pub const CONTENT_TYPE_JAVASCRIPT: &str = "text/javascript";

/// Virtual root folder used when none is configured.
pub const DEFAULT_VIRTUAL_ROOT_FOLDER: &str = "$root";

/// The single outcome of a request.
#[derive(Debug)]
pub enum ScriptResponse {
    /// Rewritten script source.
    Content {
        content_type: &'static str,
        content: String,
    },
    /// The request was outside the virtual root; fetch `uri` instead.
    Redirect { uri: String },
    /// The reader reported that the file does not exist.
    NotFound,
    /// Reading, analyzing, resolving or rewriting failed.
    InternalError(ServeError),
}

/// Receives the outcome of a request. Consumed by exactly one response.
pub trait Responder: Send + 'static {
    fn respond(self, response: ScriptResponse);
}

impl<F> Responder for F
where
    F: FnOnce(ScriptResponse) + Send + 'static,
{
    fn respond(self, response: ScriptResponse) {
        self(response);
    }
}

impl Responder for oneshot::Sender<ScriptResponse> {
    fn respond(self, response: ScriptResponse) {
        // The receiver may have given up on the request.
        let _ = self.send(response);
    }
}

/// Handle to an in-flight request.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    id: u64,
    canceled: Arc<AtomicBool>,
}

impl RequestHandle {
    fn new(id: u64) -> Self {
        Self {
            id,
            canceled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request id, unique per server.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Suppress the response if it has not been delivered yet.
    ///
    /// In-flight reader and resolver work is not aborted. The flag is checked
    /// after reading, after resolving and once more just before delivery; a
    /// cancel racing with the responder call itself can still lose. Calling
    /// this after the response was delivered has no effect.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

/// Construction options for a [`ScriptServer`].
pub struct ServerOptions {
    virtual_root_folder: String,
    script_root_folder: String,
    reader: Arc<dyn ScriptReader>,
    analyzer: Arc<dyn CodeAnalyzer>,
    resolver: Arc<dyn ImportResolver>,
}

impl ServerOptions {
    /// Options serving `script_root_folder` through `reader`, with the
    /// built-in analyzer and the relative-only resolver.
    pub fn new(script_root_folder: impl Into<String>, reader: impl ScriptReader + 'static) -> Self {
        Self {
            virtual_root_folder: DEFAULT_VIRTUAL_ROOT_FOLDER.to_string(),
            script_root_folder: script_root_folder.into(),
            reader: Arc::new(reader),
            analyzer: Arc::new(ScanAnalyzer),
            resolver: Arc::new(RelativeImportResolver),
        }
    }

    pub fn with_virtual_root_folder(mut self, virtual_root_folder: impl Into<String>) -> Self {
        self.virtual_root_folder = virtual_root_folder.into();
        self
    }

    pub fn with_analyzer(mut self, analyzer: impl CodeAnalyzer + 'static) -> Self {
        self.analyzer = Arc::new(analyzer);
        self
    }

    pub fn with_resolver(mut self, resolver: impl ImportResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field("virtual_root_folder", &self.virtual_root_folder)
            .field("script_root_folder", &self.script_root_folder)
            .finish_non_exhaustive()
    }
}

struct ServerInner {
    virtual_root_folder: String,
    script_root_folder: String,
    /// `/<virtual_root_folder>/`
    root_prefix: String,
    reader: Arc<dyn ScriptReader>,
    analyzer: Arc<dyn CodeAnalyzer>,
    resolver: Arc<dyn ImportResolver>,
    next_request_id: AtomicU64,
}

/// Dev-time ES module server. Cheap to clone; clones share request ids.
#[derive(Clone)]
pub struct ScriptServer {
    inner: Arc<ServerInner>,
}

impl fmt::Debug for ScriptServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptServer")
            .field("virtual_root_folder", &self.inner.virtual_root_folder)
            .field("script_root_folder", &self.inner.script_root_folder)
            .finish_non_exhaustive()
    }
}

impl ScriptServer {
    /// Validate `options` and build a server.
    pub fn new(options: ServerOptions) -> Result<Self, ContractError> {
        assert_nice_absolute_path("scriptRootFolder", &options.script_root_folder)?;
        assert_virtual_root(&options.virtual_root_folder)?;

        let root_prefix = format!("/{}/", options.virtual_root_folder);
        Ok(Self {
            inner: Arc::new(ServerInner {
                virtual_root_folder: options.virtual_root_folder,
                script_root_folder: options.script_root_folder,
                root_prefix,
                reader: options.reader,
                analyzer: options.analyzer,
                resolver: options.resolver,
                next_request_id: AtomicU64::new(0),
            }),
        })
    }

    #[must_use]
    pub fn virtual_root_folder(&self) -> &str {
        &self.inner.virtual_root_folder
    }

    #[must_use]
    pub fn script_root_folder(&self) -> &str {
        &self.inner.script_root_folder
    }

    /// Where a URI outside the virtual root is sent.
    #[must_use]
    pub fn redirect_target(&self, uri: &str) -> String {
        format!(
            "/{}{}/{}",
            self.inner.virtual_root_folder,
            self.inner.script_root_folder,
            uri.strip_prefix('/').unwrap_or(uri)
        )
    }

    /// Start handling `uri`; the outcome is delivered to `responder`.
    ///
    /// A malformed URI is rejected here and `responder` is dropped unused.
    /// Redirects are delivered before this returns. Everything else runs on
    /// a spawned task, so this must be called from within a Tokio runtime.
    pub fn handle_request(
        &self,
        uri: &str,
        responder: impl Responder,
    ) -> Result<RequestHandle, ContractError> {
        assert_valid_uri(uri)?;

        let id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        let handle = RequestHandle::new(id);
        let span = info_span!(target: "esdebug::request", "request", id, uri);

        let Some(relative_path) = uri.strip_prefix(self.inner.root_prefix.as_str()) else {
            let location = self.redirect_target(uri);
            span.in_scope(|| {
                info!(target: "esdebug::request", location = %location, "redirecting");
            });
            responder.respond(ScriptResponse::Redirect { uri: location });
            return Ok(handle);
        };

        let file_path = format!("/{relative_path}");
        let inner = Arc::clone(&self.inner);
        let canceled = Arc::clone(&handle.canceled);
        let uri = uri.to_string();

        tokio::spawn(
            async move {
                if let Some(response) = inner.process(&uri, &file_path, &canceled).await {
                    deliver(response, &canceled, responder);
                }
            }
            .instrument(span),
        );

        Ok(handle)
    }

    /// Handle `uri` and wait for its response.
    pub async fn serve(&self, uri: &str) -> Result<ScriptResponse, ContractError> {
        let (tx, rx) = oneshot::channel();
        self.handle_request(uri, tx)?;
        // Nothing holds the handle, so the sender is only dropped if the task died.
        Ok(rx.await.unwrap_or_else(|_| {
            ScriptResponse::InternalError(ServeError::Aborted {
                uri: uri.to_string(),
            })
        }))
    }
}

fn checkpoint(canceled: &AtomicBool, stage: &str) -> bool {
    let canceled = canceled.load(Ordering::SeqCst);
    if canceled {
        debug!(target: "esdebug::request", stage, "request canceled");
    }
    canceled
}

/// Hand `response` to `responder` unless the request was canceled meanwhile.
fn deliver(response: ScriptResponse, canceled: &AtomicBool, responder: impl Responder) {
    if !checkpoint(canceled, "respond") {
        responder.respond(response);
    }
}

/// Replacement text for a resolved specifier: a double-quoted JS string.
fn specifier_literal(importer_dir: &str, resolved: &str) -> String {
    let target = if resolved.starts_with('/') {
        relative_specifier(importer_dir, resolved)
    } else {
        resolved.to_string()
    };
    serde_json::Value::String(target).to_string()
}

impl ServerInner {
    /// Run the load pipeline. `None` means the request was canceled.
    async fn process(
        &self,
        uri: &str,
        file_path: &str,
        canceled: &AtomicBool,
    ) -> Option<ScriptResponse> {
        debug!(target: "esdebug::load", file_path, "loading script");
        let read = self.reader.read(file_path).await;
        if checkpoint(canceled, "read") {
            return None;
        }

        let code = match read {
            Ok(code) => code,
            Err(e) if e.is_not_found() => {
                info!(target: "esdebug::load", file_path, "script not found");
                return Some(ScriptResponse::NotFound);
            }
            Err(source) => {
                return Some(fail(ServeError::Read {
                    file_path: file_path.to_string(),
                    uri: uri.to_string(),
                    source,
                }));
            }
        };
        debug!(target: "esdebug::load", file_path, bytes = code.len(), "loaded script");

        let imports = match self.analyzer.analyze(&code) {
            Ok(imports) => imports,
            Err(source) => {
                return Some(fail(ServeError::Analyze {
                    file_path: file_path.to_string(),
                    source,
                }));
            }
        };

        let bare: Vec<&ImportStatement> = imports
            .iter()
            .filter(|import| !is_relative_specifier(&import.value))
            .collect();
        let specifiers: Vec<String> = bare.iter().map(|import| import.value.clone()).collect();

        let resolved = resolve_all_imports(self.resolver.as_ref(), file_path, &specifiers).await;
        if checkpoint(canceled, "resolve") {
            return None;
        }

        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(source) => {
                return Some(fail(ServeError::Resolve {
                    importer: file_path.to_string(),
                    source,
                }));
            }
        };

        let importer_dir = dirname(file_path);
        let replacements: Vec<Replacement> = bare
            .iter()
            .zip(&resolved)
            .map(|(import, path)| {
                Replacement::new(specifier_literal(importer_dir, path), import.range)
            })
            .collect();

        match rewrite_code(&code, &replacements) {
            Ok(content) => {
                info!(
                    target: "esdebug::request",
                    rewritten = replacements.len(),
                    bytes = content.len(),
                    "serving script"
                );
                Some(ScriptResponse::Content {
                    content_type: CONTENT_TYPE_JAVASCRIPT,
                    content,
                })
            }
            Err(source) => Some(fail(ServeError::Rewrite {
                file_path: file_path.to_string(),
                source,
            })),
        }
    }
}

fn fail(error: ServeError) -> ScriptResponse {
    warn!(target: "esdebug::request", error = %error.chain(), "request failed");
    ScriptResponse::InternalError(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specifier_literal() {
        assert_eq!(
            specifier_literal("/my/script/root/ui", "/my/script/root/vendor/lodash.js"),
            r#""../vendor/lodash.js""#
        );
        assert_eq!(
            specifier_literal("/my/script/root", "/my/script/root/vendor/lodash.js"),
            r#""./vendor/lodash.js""#
        );
        assert_eq!(
            specifier_literal("/app", "https://cdn.example.com/react.js"),
            r#""https://cdn.example.com/react.js""#
        );
        assert_eq!(specifier_literal("/app", r#"we"ird"#), r#""we\"ird""#);
    }

    #[test]
    fn test_new_validates_roots() {
        let reader = |_: String| async { Ok::<_, crate::reader::ReadError>(String::new()) };
        let err = ScriptServer::new(ServerOptions::new("/my/./script/root", reader)).unwrap_err();
        assert_eq!(err.to_string(), "scriptRootFolder must not contain .");

        let reader = |_: String| async { Ok::<_, crate::reader::ReadError>(String::new()) };
        let err = ScriptServer::new(
            ServerOptions::new("/my/script/root", reader).with_virtual_root_folder("a/b"),
        )
        .unwrap_err();
        assert_eq!(err, ContractError::InvalidVirtualRoot("a/b".to_string()));
    }

    #[test]
    fn test_redirect_target() {
        let reader = |_: String| async { Ok::<_, crate::reader::ReadError>(String::new()) };
        let server = ScriptServer::new(ServerOptions::new("/my/script/root", reader)).unwrap();
        assert_eq!(
            server.redirect_target("/ui/index.js"),
            "/$root/my/script/root/ui/index.js"
        );
        assert_eq!(server.redirect_target("/"), "/$root/my/script/root/");
    }

    #[test]
    fn test_deliver_drops_response_canceled_after_pipeline() {
        let handle = RequestHandle::new(0);
        let delivered = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&delivered);
        deliver(ScriptResponse::NotFound, &handle.canceled, move |_: ScriptResponse| {
            flag.store(true, Ordering::SeqCst);
        });
        assert!(delivered.load(Ordering::SeqCst));

        delivered.store(false, Ordering::SeqCst);
        handle.cancel();
        let flag = Arc::clone(&delivered);
        deliver(ScriptResponse::NotFound, &handle.canceled, move |_: ScriptResponse| {
            flag.store(true, Ordering::SeqCst);
        });
        assert!(!delivered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancel_is_sticky() {
        let handle = RequestHandle::new(7);
        assert!(!handle.is_canceled());
        handle.cancel();
        handle.cancel();
        assert!(handle.is_canceled());
        assert_eq!(handle.id(), 7);
    }
}
