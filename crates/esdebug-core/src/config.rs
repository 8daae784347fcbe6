//! Runtime and serve configuration.
//!
//! `esdebug.json` in the working directory ([`Config::serve_config_path`])
//! supplies defaults for `serve`:
//!
//! ```json
//! {
//!   "virtualRootFolder": "$root",
//!   "scriptRootFolder": "/home/me/app/src",
//!   "port": 8080,
//!   "host": "127.0.0.1",
//!   "nodeModules": true
//! }
//! ```
//!
//! Every key is optional; command-line flags win over file values.

use crate::error::Error;
use crate::server::DEFAULT_VIRTUAL_ROOT_FOLDER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the serve config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "esdebug.json";

/// Runtime configuration for the esdebug CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Path of the serve config file for this working directory.
    #[must_use]
    pub fn serve_config_path(&self) -> PathBuf {
        self.cwd.join(CONFIG_FILE_NAME)
    }
}

/// Settings for `esdebug serve`, as read from `esdebug.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ServeConfig {
    pub virtual_root_folder: String,
    /// Absolute script root. `None` means the working directory.
    pub script_root_folder: Option<String>,
    pub port: u16,
    pub host: String,
    /// Resolve bare specifiers through `node_modules`.
    pub node_modules: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            virtual_root_folder: DEFAULT_VIRTUAL_ROOT_FOLDER.to_string(),
            script_root_folder: None,
            port: 8080,
            host: "127.0.0.1".to_string(),
            node_modules: false,
        }
    }
}

impl ServeConfig {
    /// Load the config file at `path`, falling back to defaults when absent.
    pub fn load(path: &Path) -> Result<Self, Error> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(path, &text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(Error::ConfigRead {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn parse(path: &Path, text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
