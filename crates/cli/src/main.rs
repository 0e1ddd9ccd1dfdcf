//! Rewind CLI - rewind command

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use rewind_cli::cmd;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Rewind - point-in-time versioning for a directory tree
#[derive(Parser)]
#[command(name = "rewind")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create (or verify) a metadata store
    Init {
        /// Metadata store path
        db: PathBuf,
    },
    /// Watch a directory and capture every change until interrupted
    Start {
        /// Directory to watch
        dir: PathBuf,
        /// Metadata store path
        db: PathBuf,
        /// Directory holding snapshot files
        snapshot_dir: PathBuf,
    },
    /// Stop the watcher running against a metadata store
    Stop {
        /// Metadata store path
        db: Option<PathBuf>,
    },
    /// Show timeline events, newest first
    Timeline {
        /// Metadata store path
        db: PathBuf,
        /// Branch (default: active branch)
        branch: Option<String>,
    },
    /// Show the tracked files as of a timestamp
    Goto {
        /// Metadata store path
        db: PathBuf,
        /// Timestamp (YYYY-MM-DD-HH:MM:SS)
        timestamp: String,
        /// Branch (default: active branch)
        branch: Option<String>,
    },
    /// Rewrite live files to their state at a timestamp
    Restore {
        /// Metadata store path
        db: PathBuf,
        /// Timestamp (YYYY-MM-DD-HH:MM:SS)
        timestamp: String,
        /// Directory holding snapshot files
        snapshot_dir: PathBuf,
        /// Branch (default: active branch)
        branch: Option<String>,
    },
    /// Show files added, deleted or modified between two timestamps
    Diff {
        /// Metadata store path
        db: PathBuf,
        /// Earlier timestamp
        t1: String,
        /// Later timestamp
        t2: String,
        /// Branch (default: active branch)
        branch: Option<String>,
    },
    /// Create a branch
    Branch {
        /// Metadata store path
        db: PathBuf,
        /// Branch name
        name: String,
    },
    /// Make a branch the active one
    Switch {
        /// Metadata store path
        db: PathBuf,
        /// Branch name
        name: String,
    },
    /// List branches
    Branches {
        /// Metadata store path
        db: PathBuf,
    },
    /// Show the recorded history of one file
    Log {
        /// Metadata store path
        db: PathBuf,
        /// File path
        path: PathBuf,
        /// Branch (default: active branch)
        branch: Option<String>,
    },
    /// Show system configuration
    Config {
        /// Print the effective configuration
        #[arg(long, conflicts_with = "get")]
        list: bool,
        /// Print one value (e.g. capture.workers)
        #[arg(long, value_name = "KEY")]
        get: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Help and version are not errors
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let result = match cli.command {
        Commands::Init { db } => cmd::init::run(&db).await,
        Commands::Start { dir, db, snapshot_dir } => {
            cmd::start::run(&dir, &db, &snapshot_dir).await
        }
        Commands::Stop { db } => cmd::stop::run(db.as_deref()).await,
        Commands::Timeline { db, branch } => cmd::timeline::run(&db, branch).await,
        Commands::Goto { db, timestamp, branch } => cmd::goto::run(&db, &timestamp, branch).await,
        Commands::Restore { db, timestamp, snapshot_dir, branch } => {
            cmd::restore::run(&db, &timestamp, &snapshot_dir, branch).await
        }
        Commands::Diff { db, t1, t2, branch } => cmd::diff::run(&db, &t1, &t2, branch).await,
        Commands::Branch { db, name } => cmd::branch::create(&db, &name).await,
        Commands::Switch { db, name } => cmd::branch::switch(&db, &name).await,
        Commands::Branches { db } => cmd::branch::list(&db).await,
        Commands::Log { db, path, branch } => cmd::log::run(&db, &path, branch).await,
        Commands::Config { list, get } => cmd::config::run(list, get).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
