//! confsync CLI
//!
//! Synchronizes a project directory with a remote project.
//!
//! # Commands
//!
//! - `pull` - Overwrite the project directory with the remote state
//! - `push` - Overwrite the remote state with the project directory
//! - `persist` - Register new directories and forget deleted ones
//! - `fix-paths` - Rename directories to match the naming templates
//! - `encrypt` - Encrypt plaintext secrets
//! - `diff` - Show differences between the two sides

mod commands;
mod error;
mod http_client;

use clap::{Parser, Subcommand};
use commands::Context;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Configuration as code for a remote project.
#[derive(Parser)]
#[command(name = "confsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory, found by walking up from the current directory
    /// if not set
    #[arg(global = true, long)]
    project_dir: Option<PathBuf>,

    /// Storage API host, defaults to the host in the manifest
    #[arg(global = true, long, env = "CONFSYNC_STORAGE_API_HOST")]
    storage_api_host: Option<String>,

    /// Storage API token
    #[arg(
        global = true,
        long,
        env = "CONFSYNC_STORAGE_API_TOKEN",
        hide_env_values = true
    )]
    storage_api_token: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overwrite the project directory with the remote state
    Pull {
        /// Pull even if the project directory contains invalid objects
        #[arg(long)]
        force: bool,

        /// Print the plan without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Overwrite the remote state with the project directory
    Push {
        /// Also delete remote objects missing in the project directory
        #[arg(long)]
        force: bool,

        /// Print the plan without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Encrypt plaintext secrets before pushing
        #[arg(long)]
        encrypt: bool,
    },

    /// Register new directories and forget deleted ones
    Persist {
        /// Print the plan without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Rename directories to match the naming templates
    FixPaths {
        /// Print the plan without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Encrypt plaintext secrets in the project directory
    Encrypt {
        /// Print the plan without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show differences between the project directory and the remote state
    Diff {
        /// Show changed paths of every field
        #[arg(long)]
        details: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, waiting for running jobs");
            on_signal.cancel();
        }
    });

    let ctx = Context {
        project_dir: cli.project_dir,
        api_host: cli.storage_api_host,
        api_token: cli.storage_api_token,
        cancel,
    };

    let result = match cli.command {
        Commands::Pull { force, dry_run } => commands::pull::run(&ctx, force, dry_run).await,
        Commands::Push {
            force,
            dry_run,
            encrypt,
        } => commands::push::run(&ctx, force, dry_run, encrypt).await,
        Commands::Persist { dry_run } => commands::persist::run(&ctx, dry_run).await,
        Commands::FixPaths { dry_run } => commands::fix_paths::run(&ctx, dry_run).await,
        Commands::Encrypt { dry_run } => commands::encrypt::run(&ctx, dry_run).await,
        Commands::Diff { details } => commands::diff::run(&ctx, details).await,
        Commands::Version => {
            println!("confsync v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
