//! `foreman status`: one task's status and transition history.

use std::path::Path;
use std::process::ExitCode;

use foreman_store::journal::StatusJournal;
use foreman_store::registry::load_registry;

pub async fn run(workspace: &Path, task_id: &str) -> anyhow::Result<ExitCode> {
    let registry = load_registry(workspace)?;
    let journal = StatusJournal::new(workspace, registry);
    let task = journal.get_task(task_id).await?;

    println!("{}  [{}]  {}", task.id, task.status, task.title);
    if let Some(updated_at) = task.updated_at {
        println!("updated: {}", updated_at.to_rfc3339());
    }
    if !task.blocked_by.is_empty() {
        println!("blocked by: {}", task.blocked_by.join(", "));
    }

    if task.history.is_empty() {
        println!("no recorded transitions");
    } else {
        println!("history:");
        for entry in &task.history {
            let summary = entry
                .agent_summary
                .as_deref()
                .map(|s| format!("  ({s})"))
                .unwrap_or_default();
            println!(
                "  {}  {} -> {}{}",
                entry.timestamp.to_rfc3339(),
                entry.from_status,
                entry.to_status,
                summary
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}
