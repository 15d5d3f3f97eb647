//! `foreman run`: the orchestrator loop, with Ctrl-C as the cooperative
//! cancellation signal.

use std::path::Path;
use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use foreman_core::dispatch::DispatchConfig;
use foreman_core::orchestrator::{OrchestratorConfig, OrchestratorOutcome, run_orchestrator};
use foreman_store::registry::load_registry;

use crate::config::ResolvedConfig;

pub async fn run(
    workspace: &Path,
    max_iterations: Option<usize>,
    focus_label: Option<String>,
    dry_run: bool,
) -> anyhow::Result<ExitCode> {
    let registry = load_registry(workspace)?;
    let resolved = ResolvedConfig::resolve(None)?;

    let config = OrchestratorConfig {
        focus_label,
        max_iterations,
        dry_run,
        worker_binary: resolved.worker_binary,
        dispatch: DispatchConfig {
            ollama_base_url: resolved.ollama_base_url,
        },
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current worker");
            signal_cancel.cancel();
        }
    });

    let outcome = run_orchestrator(workspace, &registry, &config, cancel).await?;

    match outcome {
        OrchestratorOutcome::Completed { succeeded, failed } => {
            println!("Run complete: {succeeded} succeeded, {failed} failed.");
        }
        OrchestratorOutcome::Interrupted { succeeded, failed } => {
            println!("Run interrupted: {succeeded} succeeded, {failed} failed.");
        }
    }

    if outcome.failed_count() > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
