//! `foreman scan`: read every task file and report what was found.

use std::path::Path;
use std::process::ExitCode;

use foreman_core::scanner::{ScanOptions, scan};
use foreman_store::registry::load_registry;

pub fn run(workspace: &Path, strict: bool) -> anyhow::Result<ExitCode> {
    let registry = load_registry(workspace)?;
    let result = scan(workspace, &registry, &ScanOptions { strict })?;

    println!(
        "{} task(s) across {} project(s)",
        result.tasks.len(),
        registry.projects.len()
    );
    for scanned in &result.tasks {
        println!(
            "  {}  [{}]  {}",
            scanned.task.id, scanned.task.status, scanned.task.title
        );
    }

    if !result.errors.is_empty() {
        println!("\n{} error(s):", result.errors.len());
        for diag in &result.errors {
            println!(
                "  {} ({}): {}",
                diag.project,
                diag.diagnostic.path.display(),
                diag.diagnostic.message
            );
        }
    }
    if !result.warnings.is_empty() {
        println!("\n{} warning(s):", result.warnings.len());
        for diag in &result.warnings {
            println!("  {}: {}", diag.project, diag.diagnostic.message);
        }
    }

    Ok(ExitCode::SUCCESS)
}
