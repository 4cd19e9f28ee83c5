//! dialogdump CLI - incremental, resumable dialog backups
//!
//! Subcommands:
//! - `backup`: export new messages of every dialog through a dumper
//! - `status`: show stored per-dialog progress
//! - `reset`: forget one dialog's progress so it is exported again
//! - `dumpers`: list built-in dumpers

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

mod commands;
mod error;
mod tracing_setup;
mod ui;

use error::AppError;
use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "dialogdump",
    author,
    version,
    about = "Incremental, resumable backups of dialog archives",
    long_about = "Walks every dialog of an archive and exports only the messages that are new \
                  since the last successful run, through a pluggable dumper."
)]
struct Cli {
    /// Suppress progress spinners and informational logs
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "DIALOGDUMP_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Backup directory (progress state and default output)
    #[arg(long = "backup-dir", global = true, value_name = "DIR")]
    backup_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export new messages of every dialog
    Backup(BackupArgs),
    /// Show stored progress for every dialog
    Status(StatusArgs),
    /// Forget a dialog's progress so its messages are exported again
    Reset(ResetArgs),
    /// List the built-in dumpers
    Dumpers,
}

#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Archive directory containing dialogs.json and messages/
    #[arg(long, value_name = "DIR")]
    pub archive: Option<PathBuf>,

    /// Dumper to use (see `dialogdump dumpers`)
    #[arg(long)]
    pub dumper: Option<String>,

    /// Dumper option as key=value (repeatable)
    #[arg(long = "option", short = 'o', value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// Only back up dialogs matching these id/name patterns (`*` wildcard)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Skip dialogs matching these id/name patterns
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Dialog id whose progress should be removed
    pub dialog_id: String,
}

/// Options shared by every subcommand
#[derive(Debug, Clone)]
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = tracing_setup::init(&TracingConfig {
        debug: cli.debug,
        quiet: cli.quiet,
    }) {
        eprintln!("failed to initialise logging: {err}");
    }
    ui::init_quiet_mode(cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let global = GlobalOpts {
        config: cli.config,
        backup_dir: cli.backup_dir,
    };

    match cli.command {
        Commands::Backup(args) => commands::backup::run(&global, args).await,
        Commands::Status(args) => commands::status::run_status(&global, args),
        Commands::Reset(args) => commands::status::run_reset(&global, args),
        Commands::Dumpers => {
            commands::list_dumpers();
            Ok(ExitCode::SUCCESS)
        }
    }
}
