//! `esdebug serve` command implementation.
//!
//! Mounts a [`ScriptServer`] behind axum:
//!
//! ```text
//! GET /ui/index.js                    → 307 Location: /$root/<root>/ui/index.js
//! GET /$root/<root>/ui/index.js       → 200 text/javascript (bare imports rewritten)
//! GET /$root/<root>/missing.js        → 404
//! read / analyze / resolve failure    → 500, error chain as plain text
//! malformed path (`//`, `..`)         → 400
//! ```
//!
//! Request paths are percent-decoded before they reach the engine, and
//! redirect targets are percent-encoded, so roots with spaces or non-ASCII
//! names round-trip.
//!
//! If the client disconnects before the response is ready, the in-flight
//! request is canceled.

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use esdebug_core::{
    FsScriptReader, NodeModulesResolver, RequestHandle, ScriptResponse, ScriptServer, ServeConfig,
    ServerOptions,
};
use miette::{miette, IntoDiagnostic, Result};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Bytes escaped in a redirect `Location` path. `/` and `$` stay literal.
const PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Command-line overrides for `serve`. `None` keeps the config file value.
#[derive(Debug, Clone, Default)]
pub struct ServeFlags {
    pub root: Option<PathBuf>,
    pub virtual_root: Option<String>,
    pub port: Option<u16>,
    pub host: Option<String>,
    pub node_modules: bool,
}

/// Fully resolved serve settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeAction {
    /// Absolute script root folder, `/`-separated.
    pub script_root_folder: String,
    pub virtual_root_folder: String,
    pub host: String,
    pub port: u16,
    pub node_modules: bool,
}

impl ServeAction {
    /// Merge `esdebug.json` values with command-line flags. Flags win.
    ///
    /// A relative root is taken relative to `cwd`; no root at all serves `cwd`.
    pub fn new(cwd: &Path, config: ServeConfig, flags: ServeFlags) -> Result<Self> {
        let root = flags
            .root
            .or_else(|| config.script_root_folder.map(PathBuf::from))
            .map_or_else(|| cwd.to_path_buf(), |root| cwd.join(root));

        let script_root_folder = root
            .to_str()
            .ok_or_else(|| miette!("script root {} is not valid UTF-8", root.display()))?
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            script_root_folder,
            virtual_root_folder: flags.virtual_root.unwrap_or(config.virtual_root_folder),
            host: flags.host.unwrap_or(config.host),
            port: flags.port.unwrap_or(config.port),
            node_modules: flags.node_modules || config.node_modules,
        })
    }

    /// Socket address to bind.
    pub fn addr(&self) -> Result<SocketAddr> {
        let host = if self.host == "localhost" {
            "127.0.0.1"
        } else {
            self.host.as_str()
        };
        format!("{host}:{}", self.port).parse().into_diagnostic()
    }
}

/// Build the engine for `action`, reading scripts straight from disk.
pub fn build_server(action: &ServeAction) -> Result<ScriptServer> {
    let mut options = ServerOptions::new(action.script_root_folder.clone(), FsScriptReader)
        .with_virtual_root_folder(action.virtual_root_folder.clone());

    if action.node_modules {
        options = options.with_resolver(NodeModulesResolver::new(action.script_root_folder.clone()));
    }

    ScriptServer::new(options).into_diagnostic()
}

/// HTTP routes for `server`.
pub fn router(server: ScriptServer) -> Router {
    Router::new()
        .route("/", get(serve_script))
        .route("/*path", get(serve_script))
        .with_state(server)
        .layer(CorsLayer::permissive())
}

pub async fn run(action: ServeAction) -> Result<()> {
    let server = build_server(&action)?;
    let addr = action.addr()?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    let local_addr = listener.local_addr().into_diagnostic()?;

    info!(
        root = %action.script_root_folder,
        virtual_root = %action.virtual_root_folder,
        node_modules = action.node_modules,
        %local_addr,
        "serving scripts"
    );

    println!();
    println!(
        "  Serving {} at http://{local_addr}/{}{}/",
        action.script_root_folder, action.virtual_root_folder, action.script_root_folder
    );
    if action.node_modules {
        println!("  Bare imports resolve through node_modules");
    }
    println!();
    println!("  Press Ctrl+C to stop");
    println!();

    axum::serve(listener, router(server))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .into_diagnostic()?;

    Ok(())
}

/// Cancels the wrapped request when the handler future is dropped.
struct CancelOnDrop(RequestHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

async fn serve_script(State(server): State<ScriptServer>, uri: Uri) -> Response {
    let Ok(path) = percent_decode_str(uri.path()).decode_utf8() else {
        return (StatusCode::BAD_REQUEST, "request path is not valid UTF-8").into_response();
    };

    let (tx, rx) = oneshot::channel();
    let handle = match server.handle_request(&path, tx) {
        Ok(handle) => handle,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let _cancel = CancelOnDrop(handle);

    match rx.await {
        Ok(response) => script_response(response),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "request ended without a response")
            .into_response(),
    }
}

fn script_response(response: ScriptResponse) -> Response {
    match response {
        ScriptResponse::Content {
            content_type,
            content,
        } => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            content,
        )
            .into_response(),
        ScriptResponse::Redirect { uri } => {
            let location = utf8_percent_encode(&uri, PATH_ENCODE_SET).to_string();
            Redirect::temporary(&location).into_response()
        }
        ScriptResponse::NotFound => (StatusCode::NOT_FOUND, "not found").into_response(),
        ScriptResponse::InternalError(e) => {
            (StatusCode::INTERNAL_SERVER_ERROR, e.chain()).into_response()
        }
    }
}
