//! `foreman next`: the scored backlog, best first.

use std::path::Path;
use std::process::ExitCode;

use foreman_core::scanner::{ScanOptions, scan};
use foreman_core::score::{ScoreOptions, score_tasks};
use foreman_store::registry::load_registry;

pub fn run(workspace: &Path, limit: usize, focus_label: Option<&str>) -> anyhow::Result<ExitCode> {
    let registry = load_registry(workspace)?;
    let result = scan(workspace, &registry, &ScanOptions::default())?;
    let scored = score_tasks(
        &result.tasks,
        &ScoreOptions {
            focus_label: focus_label.map(str::to_owned),
            ..ScoreOptions::default()
        },
    );

    if scored.is_empty() {
        println!("No open tasks.");
        return Ok(ExitCode::SUCCESS);
    }

    for entry in scored.iter().take(limit) {
        let gated = if entry.breakdown.dependency == 0.0 {
            "  (gated)"
        } else {
            ""
        };
        println!(
            "{:>6.2}  {}  [{}]  {}{}",
            entry.score(),
            entry.task.id(),
            entry.task.task.status,
            entry.task.task.title,
            gated
        );
    }

    Ok(ExitCode::SUCCESS)
}
