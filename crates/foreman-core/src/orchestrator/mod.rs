//! Orchestrator loop: scan, score, dispatch the top-ranked task, supervise
//! it, repeat.
//!
//! Exactly one worker runs at a time. Cancellation is cooperative: a signal
//! lets the current iteration finish and stops before the next one; running
//! workers are never killed here.

use std::path::Path;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use foreman_store::journal::StatusJournal;
use foreman_store::models::{Registry, TaskStatus};

use crate::dispatch::{DispatchConfig, DispatchOptions, build_dispatch};
use crate::executor::{ExecutorOptions, execute_worker};
use crate::scanner::{ScanOptions, scan};
use crate::score::{ScoreOptions, score_tasks};

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Label granted the scoring preference bonus.
    pub focus_label: Option<String>,
    /// Stop after this many dispatches; `None` runs until no work remains.
    pub max_iterations: Option<usize>,
    /// Dispatch (and journal `in_progress`) but never spawn a worker.
    pub dry_run: bool,
    /// Worker binary; `"claude"` by default.
    pub worker_binary: String,
    pub dispatch: DispatchConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            focus_label: None,
            max_iterations: None,
            dry_run: false,
            worker_binary: "claude".to_owned(),
            dispatch: DispatchConfig::default(),
        }
    }
}

/// How an orchestrator run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorOutcome {
    /// No dispatchable task remains (or the iteration bound was reached).
    Completed { succeeded: usize, failed: usize },
    /// A cancellation signal stopped the loop between iterations.
    Interrupted { succeeded: usize, failed: usize },
}

impl OrchestratorOutcome {
    pub fn failed_count(&self) -> usize {
        match self {
            Self::Completed { failed, .. } | Self::Interrupted { failed, .. } => *failed,
        }
    }
}

/// Run iterations until no dispatchable work remains or cancellation is
/// signalled.
pub async fn run_orchestrator(
    workspace_root: &Path,
    registry: &Registry,
    config: &OrchestratorConfig,
    cancel: CancellationToken,
) -> Result<OrchestratorOutcome> {
    let journal = StatusJournal::new(workspace_root, registry.clone());
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut iterations = 0usize;

    loop {
        if cancel.is_cancelled() {
            info!(succeeded, failed, "orchestrator cancelled");
            return Ok(OrchestratorOutcome::Interrupted { succeeded, failed });
        }
        if config.max_iterations.is_some_and(|max| iterations >= max) {
            info!(iterations, "iteration bound reached");
            return Ok(OrchestratorOutcome::Completed { succeeded, failed });
        }

        let scan_result = scan(workspace_root, registry, &ScanOptions::default())
            .context("workspace scan failed")?;
        for diag in &scan_result.errors {
            warn!(
                project = %diag.project,
                path = %diag.diagnostic.path.display(),
                message = %diag.diagnostic.message,
                "skipping unreadable task data"
            );
        }

        let score_opts = ScoreOptions {
            focus_label: config.focus_label.clone(),
            ..ScoreOptions::default()
        };
        let scored = score_tasks(&scan_result.tasks, &score_opts);

        // Dispatchable: pending, and not gated by its dependencies.
        let Some(pick) = scored
            .into_iter()
            .find(|s| s.task.task.status == TaskStatus::Pending && s.breakdown.dependency != 0.0)
        else {
            info!(succeeded, failed, "no dispatchable tasks remain");
            return Ok(OrchestratorOutcome::Completed { succeeded, failed });
        };

        iterations += 1;
        let task_id = pick.task.id().to_owned();
        info!(task_id = %task_id, score = pick.score(), "dispatching top-ranked task");

        let descriptor = build_dispatch(
            &journal,
            &pick.task,
            &config.dispatch,
            &DispatchOptions {
                dry_run: config.dry_run,
                quiet: false,
            },
        )
        .await
        .with_context(|| format!("dispatch failed for task {task_id}"))?;

        if config.dry_run {
            info!(task_id = %task_id, "dry-run: worker spawn skipped");
            continue;
        }

        let exec_opts = ExecutorOptions::with_binary(&config.worker_binary);
        match execute_worker(&journal, &task_id, &descriptor, &exec_opts).await {
            Ok(record) if record.succeeded() => {
                succeeded += 1;
            }
            Ok(record) => {
                failed += 1;
                warn!(task_id = %task_id, exit_code = record.exit_code, "worker run failed");
            }
            Err(e) => {
                // The executor already journaled the failure where it could;
                // the loop moves on to the next iteration.
                failed += 1;
                error!(task_id = %task_id, error = %e, "worker could not be started");
            }
        }
    }
}
