//! `foreman exec`: dispatch and execute a single task by id.

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::bail;

use foreman_core::dispatch::{DispatchConfig, DispatchOptions, build_dispatch};
use foreman_core::executor::{ExecutorOptions, execute_worker};
use foreman_core::scanner::{ScanOptions, scan};
use foreman_store::journal::StatusJournal;
use foreman_store::registry::load_registry;

use crate::config::ResolvedConfig;

pub async fn run(workspace: &Path, task_id: &str, dry_run: bool) -> anyhow::Result<ExitCode> {
    let registry = load_registry(workspace)?;
    let resolved = ResolvedConfig::resolve(None)?;
    let journal = StatusJournal::new(workspace, registry.clone());

    let result = scan(workspace, &registry, &ScanOptions::default())?;
    let Some(scanned) = result.tasks.into_iter().find(|t| t.id() == task_id) else {
        bail!("task {task_id} not found in any project's task file");
    };

    let descriptor = build_dispatch(
        &journal,
        &scanned,
        &DispatchConfig {
            ollama_base_url: resolved.ollama_base_url,
        },
        &DispatchOptions {
            dry_run,
            quiet: false,
        },
    )
    .await?;

    println!(
        "Dispatched {task_id}: ~{} tokens, {} file(s) included, {} trimmed.",
        descriptor.meta.token_estimate,
        descriptor.meta.files_included,
        descriptor.meta.files_trimmed
    );

    if dry_run {
        println!("Dry run: worker spawn skipped.");
        return Ok(ExitCode::SUCCESS);
    }

    let opts = ExecutorOptions {
        worker_binary: resolved.worker_binary,
        on_stdout: Some(Box::new(|line| println!("{line}"))),
        on_stderr: Some(Box::new(|line| {
            let _ = writeln!(std::io::stderr(), "{line}");
        })),
    };
    let record = execute_worker(&journal, task_id, &descriptor, &opts).await?;

    if record.succeeded() {
        println!("Worker completed.");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("Worker failed with exit code {}.", record.exit_code);
        Ok(ExitCode::from(1))
    }
}
