#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod commands;
mod logging;
mod project;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "esresolve")]
#[command(author, version, about = "Resolve ES module specifiers over a virtual project", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Fetch http(s) modules instead of treating them as external
    #[arg(long, global = true)]
    http: bool,

    /// Project manifest
    #[arg(long, global = true, value_name = "FILE", default_value = "esresolve.json")]
    project: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Resolve one specifier
    Resolve {
        /// Specifier as written in an import
        specifier: String,

        /// Importing module (omit to resolve as an entry point)
        #[arg(long, value_name = "PATH")]
        from: Option<String>,
    },

    /// Walk the module graph from the entry points
    Build {
        /// Entry points (defaults to the manifest's entries)
        entries: Vec<String>,

        /// Include transformed code in JSON output
        #[arg(long)]
        emit_code: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json);

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    match cli.command {
        Commands::Resolve { specifier, from } => {
            let action = commands::resolve::ResolveAction {
                specifier,
                from,
                project: cli.project,
                http: cli.http,
            };
            runtime.block_on(commands::resolve::run(action, cli.json))
        }
        Commands::Build { entries, emit_code } => {
            let action = commands::build::BuildAction {
                project: cli.project,
                entries,
                http: cli.http,
                emit_code,
            };
            runtime.block_on(commands::build::run(action, cli.json))
        }
    }
}
