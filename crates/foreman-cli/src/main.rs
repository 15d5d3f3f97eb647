mod config;
mod exec_cmd;
mod next_cmd;
mod run_cmd;
mod scan_cmd;
mod status_cmd;
mod sync_cmd;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use foreman_core::logging;
use foreman_store::StoreError;

#[derive(Parser)]
#[command(
    name = "foreman",
    about = "Multi-project task orchestrator for LLM coding workers"
)]
struct Cli {
    /// Workspace root containing projects.json
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a foreman config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Read all task files and report diagnostics
    Scan {
        /// Fail on any error or warning
        #[arg(long)]
        strict: bool,
    },
    /// Show the scored backlog, best first
    Next {
        /// How many tasks to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Label granted the scoring preference bonus
        #[arg(long)]
        focus_label: Option<String>,
    },
    /// Run the orchestrator loop
    Run {
        /// Run a single iteration and stop
        #[arg(long)]
        once: bool,
        /// Stop after this many iterations
        #[arg(long, conflicts_with = "once")]
        max_iterations: Option<usize>,
        /// Label granted the scoring preference bonus
        #[arg(long)]
        focus_label: Option<String>,
        /// Dispatch without spawning workers
        #[arg(long)]
        dry_run: bool,
    },
    /// Dispatch and execute a single task by id
    Exec {
        /// Task id, `<project>/<slug>`
        task_id: String,
        /// Dispatch without spawning the worker
        #[arg(long)]
        dry_run: bool,
    },
    /// Show a task's status and history
    Status {
        /// Task id, `<project>/<slug>`
        task_id: String,
    },
    /// Sync tasks with the external issue tracker
    Sync {
        #[command(subcommand)]
        direction: SyncDirection,
    },
}

#[derive(Subcommand)]
pub enum SyncDirection {
    /// Push local task state to the tracker
    Push {
        /// Report intent without remote side-effects
        #[arg(long)]
        dry_run: bool,
        /// owner/repo override for the tracker CLI
        #[arg(long)]
        repo: Option<String>,
    },
    /// Pull tracker state into task files
    Pull {
        /// Report intent without applying anything
        #[arg(long)]
        dry_run: bool,
        /// owner/repo override for the tracker CLI
        #[arg(long)]
        repo: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            if is_config_error(&e) {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

/// Registry and configuration problems exit with code 2; everything else
/// that escapes a command exits 1.
fn is_config_error(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<StoreError>(),
        Some(StoreError::RegistryNotFound { .. } | StoreError::RegistryMalformed { .. })
    )
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Init { force } => {
            cmd_init(force)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Scan { strict } => scan_cmd::run(&cli.workspace, strict),
        Commands::Next { limit, focus_label } => {
            next_cmd::run(&cli.workspace, limit, focus_label.as_deref())
        }
        Commands::Run {
            once,
            max_iterations,
            focus_label,
            dry_run,
        } => {
            let max_iterations = if once { Some(1) } else { max_iterations };
            run_cmd::run(&cli.workspace, max_iterations, focus_label, dry_run).await
        }
        Commands::Exec { task_id, dry_run } => {
            exec_cmd::run(&cli.workspace, &task_id, dry_run).await
        }
        Commands::Status { task_id } => status_cmd::run(&cli.workspace, &task_id).await,
        Commands::Sync { direction } => sync_cmd::run(&cli.workspace, direction).await,
    }
}

/// Execute `foreman init`: write the config file.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let path = config::config_path();
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile::default();
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  worker.binary defaults to \"claude\"");
    println!("  worker.ollama_base_url defaults to {}", foreman_core::dispatch::DEFAULT_OLLAMA_BASE_URL);
    println!("  tracker.repo defaults to the current repository");
    Ok(())
}
