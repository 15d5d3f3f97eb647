//! Scanner: enumerate registry projects, load their task files, and merge
//! everything into one in-memory collection.
//!
//! The scanner is read-only and degrades around broken files: a missing
//! task file is simply an empty project, a parse error becomes a diagnostic
//! and the other projects still scan. Strict mode turns any diagnostic into
//! a hard failure.

use std::path::Path;

use anyhow::bail;
use serde::Serialize;
use tracing::debug;

use foreman_store::StoreError;
use foreman_store::codec::{self, Diagnostic};
use foreman_store::models::{Milestone, Project, Registry, Task};

/// A task augmented with the project context it was scanned from.
///
/// The persisted [`Task`] record stays as it was on disk; the backrefs here
/// exist only in memory and are never written back.
#[derive(Debug, Clone)]
pub struct ScannedTask {
    pub task: Task,
    pub project: Project,
    pub project_name: String,
    /// File-level milestone of the containing task file, if any.
    pub milestone: Option<Milestone>,
}

impl ScannedTask {
    pub fn id(&self) -> &str {
        &self.task.id
    }
}

/// A codec diagnostic tagged with the project it came from.
#[derive(Debug, Clone, Serialize)]
pub struct ScanDiagnostic {
    pub project: String,
    #[serde(flatten)]
    pub diagnostic: Diagnostic,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Fail the whole scan if any error or warning is present.
    pub strict: bool,
}

/// Merged scan output: every readable task across every project, plus the
/// diagnostics collected along the way.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub tasks: Vec<ScannedTask>,
    pub errors: Vec<ScanDiagnostic>,
    pub warnings: Vec<ScanDiagnostic>,
}

/// Scan a workspace, loading the registry from `<root>/projects.json`
/// first. Registry failures are fatal configuration errors.
pub fn scan_workspace(workspace_root: &Path, opts: &ScanOptions) -> anyhow::Result<ScanResult> {
    let registry = foreman_store::registry::load_registry(workspace_root)?;
    scan(workspace_root, &registry, opts)
}

/// Scan every registered project's task file against a pre-loaded registry.
pub fn scan(
    workspace_root: &Path,
    registry: &Registry,
    opts: &ScanOptions,
) -> anyhow::Result<ScanResult> {
    let mut result = ScanResult::default();

    for project in &registry.projects {
        let path = registry.task_file_path(workspace_root, project);
        let read = match codec::read_task_file(&path) {
            Ok(read) => read,
            Err(StoreError::NotFound { .. }) => {
                debug!(project = %project.name, "no task file, skipping project");
                continue;
            }
            Err(StoreError::Parse { path, message }) | Err(StoreError::Schema { path, message }) => {
                result.errors.push(ScanDiagnostic {
                    project: project.name.clone(),
                    diagnostic: Diagnostic::parse_error(&path, message),
                });
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        for diagnostic in read.errors {
            result.errors.push(ScanDiagnostic {
                project: project.name.clone(),
                diagnostic,
            });
        }
        for diagnostic in read.warnings {
            result.warnings.push(ScanDiagnostic {
                project: project.name.clone(),
                diagnostic,
            });
        }

        let milestone = read.file.milestone.clone();
        for task in read.file.tasks {
            result.tasks.push(ScannedTask {
                task,
                project: project.clone(),
                project_name: project.name.clone(),
                milestone: milestone.clone(),
            });
        }
    }

    if opts.strict && (!result.errors.is_empty() || !result.warnings.is_empty()) {
        let mut lines = Vec::new();
        for diag in result.errors.iter().chain(result.warnings.iter()) {
            lines.push(format!(
                "  {} ({}): {}",
                diag.project,
                diag.diagnostic.path.display(),
                diag.diagnostic.message
            ));
        }
        bail!(
            "strict scan failed with {} error(s) and {} warning(s):\n{}",
            result.errors.len(),
            result.warnings.len(),
            lines.join("\n")
        );
    }

    Ok(result)
}
