//! `foreman sync`: bidirectional tracker sync.

use std::path::Path;
use std::process::ExitCode;

use foreman_core::bridge::gh::GhTracker;
use foreman_core::bridge::{Bridge, SyncReport};
use foreman_core::scanner::{ScanOptions, scan};
use foreman_store::journal::StatusJournal;
use foreman_store::registry::load_registry;

use crate::SyncDirection;
use crate::config::ResolvedConfig;

pub async fn run(workspace: &Path, direction: SyncDirection) -> anyhow::Result<ExitCode> {
    let registry = load_registry(workspace)?;
    let journal = StatusJournal::new(workspace, registry.clone());

    let (dry_run, repo) = match &direction {
        SyncDirection::Push { dry_run, repo } | SyncDirection::Pull { dry_run, repo } => {
            (*dry_run, repo.clone())
        }
    };
    let resolved = ResolvedConfig::resolve(repo.as_deref())?;

    let mut tracker = GhTracker::new();
    if let Some(repo) = resolved.repo {
        tracker = tracker.with_repo(repo);
    }
    let bridge = Bridge::new(&tracker, &journal, dry_run);

    let report = match direction {
        SyncDirection::Push { .. } => {
            let result = scan(workspace, &registry, &ScanOptions::default())?;
            bridge.push(&result.tasks).await?
        }
        SyncDirection::Pull { .. } => bridge.pull().await?,
    };

    print_report(&report);
    if report.errors.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

fn print_report(report: &SyncReport) {
    for (task_id, number) in &report.created {
        println!("created issue #{number} for {task_id}");
    }
    for number in &report.updated {
        println!("updated issue #{number}");
    }
    for number in &report.closed {
        println!("closed issue #{number}");
    }
    for task_id in &report.applied {
        println!("applied tracker status to {task_id}");
    }
    for note in &report.planned {
        println!("dry-run: {note}");
    }
    for note in &report.skipped {
        println!("skipped: {note}");
    }
    for error in &report.errors {
        let context = match (&error.task_id, &error.issue) {
            (Some(task), Some(issue)) => format!("{task} / issue #{issue}"),
            (Some(task), None) => task.clone(),
            (None, Some(issue)) => format!("issue #{issue}"),
            (None, None) => "batch".to_owned(),
        };
        eprintln!("sync error ({context}): {}", error.message);
    }

    if report.created.is_empty()
        && report.updated.is_empty()
        && report.closed.is_empty()
        && report.applied.is_empty()
        && report.planned.is_empty()
        && report.errors.is_empty()
    {
        println!("Nothing to sync.");
    }
}
