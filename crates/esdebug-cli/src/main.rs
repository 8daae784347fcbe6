#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use esdebug_core::{Config, ServeConfig};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "esdebug")]
#[command(author, version, about = "Serve ES modules to the browser with bare imports rewritten", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (logs and `version`)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Serve a script root over HTTP, rewriting bare imports
    Serve {
        /// Script root folder (default: scriptRootFolder from esdebug.json, else the working directory)
        #[arg(long, value_name = "PATH")]
        root: Option<PathBuf>,

        /// Virtual root folder the scripts are exposed under (default: $root)
        #[arg(long, value_name = "NAME")]
        virtual_root: Option<String>,

        /// Port to listen on (default: 8080)
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Host to bind to (default: 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Resolve bare imports through node_modules
        #[arg(long)]
        node_modules: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine working directory
    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd.clone())
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(cli.json),
        Some(Commands::Serve {
            root,
            virtual_root,
            port,
            host,
            node_modules,
        }) => {
            logging::init(config.verbosity, config.json_logs);

            let file_config = ServeConfig::load(&config.serve_config_path()).into_diagnostic()?;
            let flags = commands::serve::ServeFlags {
                root,
                virtual_root,
                port,
                host,
                node_modules,
            };
            let action = commands::serve::ServeAction::new(&config.cwd, file_config, flags)?;

            let span = tracing::info_span!("serve", cmd = "serve", cwd = %cwd.display());
            let _guard = span.enter();

            let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
            rt.block_on(commands::serve::run(action))
        }
    }
}
