#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod error;
pub mod imports;
pub mod paths;
pub mod reader;
pub mod resolve;
pub mod rewrite;
pub mod server;
pub mod version;

pub use config::{Config, ServeConfig};
pub use error::{ContractError, Error, ServeError};
pub use imports::{scan_imports, AnalyzeError, CodeAnalyzer, ImportKind, ImportStatement, ScanAnalyzer};
pub use reader::{FsScriptReader, ReadError, ReadErrorKind, ScriptReader};
pub use resolve::{
    dedupe_specifiers, resolve_all_imports, ImportResolver, NodeModulesResolver,
    RelativeImportResolver, ResolveError,
};
pub use rewrite::{rewrite_code, Replacement, RewriteError, TextRange};
pub use server::{
    RequestHandle, Responder, ScriptResponse, ScriptServer, ServerOptions,
    CONTENT_TYPE_JAVASCRIPT, DEFAULT_VIRTUAL_ROOT_FOLDER,
};
pub use version::VERSION;
