//! Auditflow command-line front end.
//!
//! Stages uploaded documents into batches, inspects analyzer runs and their
//! artifacts, lists case-manager partitions, and launches analyses either one
//! module at a time or every configured module in order.

use anyhow::{Context, Result};
use auditflow::AppContext;
use auditflow_logging::{init_logging, LogConfig};
use auditflow_protocol::paths::auditflow_home;
use auditflow_protocol::RunScope;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "auditflow", version, about = "Document intake and analysis runs for case audits")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Auditflow home directory (default: ~/.auditflow)
    #[arg(long, global = true, env = "AUDITFLOW_HOME")]
    home: Option<PathBuf>,

    /// Config file (default: <home>/config.toml)
    #[arg(long, global = true, env = "AUDITFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stage files as a new upload batch
    Stage {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the reconciled state of a run
    Status {
        run_id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a run's log
    Log {
        run_id: String,

        /// Only the last N lines
        #[arg(short = 'n', long)]
        tail: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a run's output artifact
    Artifact {
        run_id: String,

        /// spreadsheet, document, external-sheet or external-form
        #[arg(short, long, default_value = "spreadsheet")]
        format: String,

        /// Preferred file name when several match
        #[arg(long)]
        file: Option<String>,

        /// Copy the artifact to this file or directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List selectable case managers
    CaseManagers {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start one analysis module
    Run {
        /// Module name passed to the analyzer
        #[arg(short, long)]
        module: String,

        /// Batch id (default: most recently staged batch)
        #[arg(short, long)]
        batch: Option<String>,

        /// all or case_manager
        #[arg(short, long)]
        scope: Option<RunScope>,

        /// Case manager key (implies --scope case_manager)
        #[arg(long)]
        case_manager: Option<String>,

        /// Wait for the analyzer to exit
        #[arg(long)]
        wait: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run every configured module over a batch, one after another
    RunAll {
        /// Batch id (default: most recently staged batch)
        #[arg(short, long)]
        batch: Option<String>,

        /// all or case_manager
        #[arg(short, long)]
        scope: Option<RunScope>,

        /// Case manager key (implies --scope case_manager)
        #[arg(long)]
        case_manager: Option<String>,

        /// Restrict to these modules (repeatable)
        #[arg(short, long = "module")]
        modules: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List runs, newest first
    Runs {
        /// Maximum number of runs to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show resolved paths and settings
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Stage { json, .. }
        | Commands::Status { json, .. }
        | Commands::Log { json, .. }
        | Commands::Artifact { json, .. }
        | Commands::CaseManagers { json }
        | Commands::Run { json, .. }
        | Commands::RunAll { json, .. }
        | Commands::Runs { json, .. }
        | Commands::Config { json } => *json,
    }
}

async fn run_command(ctx: AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Stage { files, json } => {
            cli::stage::run(&ctx, cli::stage::StageArgs { files, json }).await
        }
        Commands::Status { run_id, json } => {
            blocking(ctx, move |ctx| cli::runs::status(ctx, &run_id, json)).await
        }
        Commands::Log { run_id, tail, json } => {
            blocking(ctx, move |ctx| cli::runs::log(ctx, &run_id, tail, json)).await
        }
        Commands::Artifact {
            run_id,
            format,
            file,
            out,
            json,
        } => {
            cli::artifact::run(
                &ctx,
                cli::artifact::ArtifactArgs {
                    run_id,
                    format,
                    file,
                    out,
                    json,
                },
            )
            .await
        }
        Commands::CaseManagers { json } => cli::case_managers::run(&ctx, json).await,
        Commands::Run {
            module,
            batch,
            scope,
            case_manager,
            wait,
            json,
        } => {
            cli::run::run_one(
                &ctx,
                cli::run::RunArgs {
                    module,
                    batch,
                    scope,
                    case_manager,
                    wait,
                    json,
                },
            )
            .await
        }
        Commands::RunAll {
            batch,
            scope,
            case_manager,
            modules,
            json,
        } => {
            cli::run::run_all(
                &ctx,
                cli::run::RunAllArgs {
                    batch,
                    scope,
                    case_manager,
                    modules,
                    json,
                },
            )
            .await
        }
        Commands::Runs { limit, json } => {
            blocking(ctx, move |ctx| cli::runs::list(ctx, limit, json)).await
        }
        Commands::Config { json } => cli::config::run(&ctx, json),
    }
}

/// Commands that only read files run on the blocking pool.
async fn blocking<F>(ctx: AppContext, command: F) -> Result<()>
where
    F: FnOnce(&AppContext) -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(move || command(&ctx)).await?
}

fn run(args: Cli) -> Result<()> {
    let home = args.home.unwrap_or_else(auditflow_home);
    let ctx = AppContext::load(home, args.config).map_err(cli::error::HelpfulError::from_config)?;
    debug!(home = %ctx.home.display(), config = %ctx.config_path.display(), "Loaded context");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(run_command(ctx, args.command))
}

fn main() -> ExitCode {
    let args = Cli::parse();
    let json_mode = command_wants_json(&args.command);

    let log_dir = args
        .home
        .clone()
        .unwrap_or_else(auditflow_home)
        .join("logs");
    if let Err(err) = init_logging(LogConfig {
        app_name: "auditflow",
        verbose: args.verbose,
        log_dir: Some(log_dir),
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else if let Some(helpful) = err.downcast_ref::<cli::error::HelpfulError>() {
                eprint!("{}", helpful);
            } else {
                eprintln!("ERROR: {:#}", err);
            }
            ExitCode::from(1)
        }
    }
}
