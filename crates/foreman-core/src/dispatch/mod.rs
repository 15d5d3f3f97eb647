//! Dispatcher: assemble a token-budgeted worker prompt and the subprocess
//! invocation descriptor for a chosen task.
//!
//! The `in_progress` transition is journaled before this returns, so it is
//! durable on disk before any worker spawns — dry-run included (dry-run only
//! suppresses the spawn itself).

use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use foreman_store::journal::{StatusJournal, UpdateOptions};
use foreman_store::models::{ModelTier, TaskStatus};

use crate::scanner::ScannedTask;
use crate::token::{TOKEN_BUDGET, estimate_tokens};

/// Turn limit passed to the worker.
pub const MAX_TURNS: u32 = 25;

/// Model name used for tasks routed to the local tier.
pub const LOCAL_MODEL: &str = "qwen3-coder";

/// Default endpoint for the local model tier.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

const WORKER_PREAMBLE: &str = "You are an autonomous coding worker. Complete the task below \
inside the project directory you are started in. Make the smallest change that satisfies the \
acceptance criteria, keep the test suite green, and commit nothing yourself.";

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Base URL for the local model endpoint.
    pub ollama_base_url: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_owned(),
        }
    }
}

impl DispatchConfig {
    /// Read the endpoint from `OLLAMA_BASE_URL`, falling back to the
    /// default.
    pub fn from_env() -> Self {
        Self {
            ollama_base_url: std::env::var("OLLAMA_BASE_URL")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// The executor will not spawn a worker for this dispatch. The status
    /// transition still happens.
    pub dry_run: bool,
    /// Suppress per-dispatch info logging.
    pub quiet: bool,
}

/// What the prompt assembly did, for callers that report on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchMeta {
    pub token_estimate: usize,
    pub files_included: usize,
    /// Files dropped from the tail to fit the token budget.
    pub files_trimmed: usize,
    /// Files listed in `relevant_files` but absent on disk.
    pub files_missing: usize,
}

/// Everything the executor needs to run one worker.
#[derive(Debug, Clone)]
pub struct DispatchDescriptor {
    pub prompt: String,
    pub working_directory: PathBuf,
    pub max_turns: u32,
    /// Extra environment for the worker; empty for the default tier.
    pub env: Vec<(String, String)>,
    /// Worker argv (without the binary itself).
    pub args: Vec<String>,
    pub meta: DispatchMeta,
}

/// Build the dispatch descriptor for a task and journal its `in_progress`
/// transition.
pub async fn build_dispatch(
    journal: &StatusJournal,
    scanned: &ScannedTask,
    config: &DispatchConfig,
    opts: &DispatchOptions,
) -> Result<DispatchDescriptor> {
    let task = &scanned.task;
    let workspace_root = journal.workspace_root();
    let project_dir = journal
        .registry()
        .project_dir(workspace_root, &scanned.project);

    // Project memory is optional; an unreadable file is worth a warning but
    // never blocks a dispatch.
    let memory_path = project_dir.join("CLAUDE.md");
    let memory = match fs::read_to_string(&memory_path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %memory_path.display(), error = %e, "could not read project memory");
            None
        }
    };

    let mut sections: Vec<String> = vec![WORKER_PREAMBLE.to_owned()];
    sections.push(format!(
        "## Project\n\n{} ({})",
        scanned.project_name, scanned.project.path
    ));
    if let Some(memory) = memory {
        sections.push(format!("## Project memory\n\n{}", memory.trim_end()));
    }
    sections.push(format!("## Task\n\n{}", task.title));
    if let Some(description) = task.extra.get("description").and_then(|v| v.as_str()) {
        sections.push(description.to_owned());
    }
    if let Some(description) = task.description() {
        sections.push(format!("### Feature\n\n{description}"));
    }
    if !task.acceptance_criteria().is_empty() {
        let items: Vec<String> = task
            .acceptance_criteria()
            .iter()
            .map(|c| format!("- {c}"))
            .collect();
        sections.push(format!("### Acceptance criteria\n\n{}", items.join("\n")));
    }

    let mut constraints = vec![format!("- Project path: {}", scanned.project.path)];
    if let Some(test_command) = &scanned.project.test_command {
        constraints.push(format!("- Test command: {test_command}"));
    }
    constraints.push(
        "- Work test-first: write the failing test, then make it pass.".to_owned(),
    );
    sections.push(format!("## Constraints\n\n{}", constraints.join("\n")));

    // Relevant files, workspace-relative. Missing ones are skipped and
    // counted; present ones become trimmable blocks.
    let mut blocks: Vec<String> = Vec::new();
    let mut files_missing = 0;
    for rel in &task.relevant_files {
        let path = workspace_root.join(rel);
        match fs::read_to_string(&path) {
            Ok(content) => blocks.push(format!("### {rel}\n\n```\n{content}\n```")),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "relevant file missing, skipping");
                files_missing += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read relevant file, skipping");
                files_missing += 1;
            }
        }
    }

    // Trim from the tail until the assembly fits the budget.
    let base = sections.join("\n\n");
    let mut included = blocks.len();
    let (prompt, token_estimate) = loop {
        let prompt = assemble(&base, &blocks[..included]);
        let estimate = estimate_tokens(&prompt);
        if estimate <= TOKEN_BUDGET || included == 0 {
            break (prompt, estimate);
        }
        included -= 1;
    };
    let files_trimmed = blocks.len() - included;

    let mut args: Vec<String> = vec![
        "--print".to_owned(),
        "--dangerouslySkipPermissions".to_owned(),
        "--max-turns".to_owned(),
        MAX_TURNS.to_string(),
    ];
    let mut env: Vec<(String, String)> = Vec::new();
    if task.model_tier() == ModelTier::Local {
        args.push("--model".to_owned());
        args.push(LOCAL_MODEL.to_owned());
        env.push((
            "ANTHROPIC_BASE_URL".to_owned(),
            config.ollama_base_url.clone(),
        ));
        env.push(("ANTHROPIC_AUTH_TOKEN".to_owned(), "ollama".to_owned()));
    }

    // Durable before any spawn: the task is in_progress on disk from here
    // on, dry-run included.
    journal
        .update_task_status(&task.id, TaskStatus::InProgress, UpdateOptions::default())
        .await
        .with_context(|| format!("failed to mark task {} in progress", task.id))?;

    let meta = DispatchMeta {
        token_estimate,
        files_included: included,
        files_trimmed,
        files_missing,
    };

    if !opts.quiet {
        info!(
            task_id = %task.id,
            tokens = meta.token_estimate,
            files_included = meta.files_included,
            files_trimmed = meta.files_trimmed,
            dry_run = opts.dry_run,
            "dispatch assembled"
        );
    }

    Ok(DispatchDescriptor {
        prompt,
        working_directory: project_dir,
        max_turns: MAX_TURNS,
        env,
        args,
        meta,
    })
}

fn assemble(base: &str, blocks: &[String]) -> String {
    if blocks.is_empty() {
        return base.to_owned();
    }
    let mut prompt = String::with_capacity(
        base.len() + blocks.iter().map(|b| b.len() + 2).sum::<usize>() + 32,
    );
    prompt.push_str(base);
    prompt.push_str("\n\n## Relevant files\n");
    for block in blocks {
        prompt.push('\n');
        prompt.push_str(block);
        prompt.push('\n');
    }
    prompt
}
