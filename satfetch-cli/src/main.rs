//! satfetch CLI - search catalogs and download Sentinel-2 / Landsat-8 products.
//!
//! Exit codes follow the batch outcome: 0 ok, 1 empty product, 2 download
//! error, 3 fatal.

mod commands;
mod error;
mod logging;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use satfetch::ReturnCode;
use tracing::error;

use commands::config::ConfigCommands;
use commands::download::DownloadArgs;
use commands::search::SearchArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "satfetch", version, about, long_about = None)]
struct Cli {
    /// Debug-level logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also write logs to a daily file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search catalogs for products
    Search(SearchArgs),

    /// Download products by name, or everything a search finds
    Download(DownloadArgs),

    /// View or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = logging::init(cli.verbose, cli.log_dir.as_deref());

    let result = match cli.command {
        Commands::Search(args) => commands::search::run(args).map(|()| ReturnCode::Ok),
        Commands::Download(args) => commands::download::run(args),
        Commands::Config { command } => commands::config::run(command).map(|()| ReturnCode::Ok),
    };

    match result {
        Ok(code) => exit(code.exit_code()),
        Err(e) => report(e),
    }
}

fn report(e: CliError) -> ExitCode {
    error!("{}", e);
    eprintln!("Error: {}", e);
    exit(e.exit_code())
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}
