//! Outbound and inbound sync between scanned tasks and the tracker.
//!
//! The issue map is the source of truth for identity and is written only
//! after a successful remote create. A task id embedded in each issue body
//! lets a later inbound pass re-pair mappings the map file lost.

use std::path::PathBuf;

use anyhow::Result;
use futures::StreamExt;
use futures::stream;
use tracing::{info, warn};

use foreman_store::StoreError;
use foreman_store::issue_map::IssueMap;
use foreman_store::journal::{StatusJournal, UpdateOptions};
use foreman_store::models::{Task, TaskStatus};

use super::labels::{size_label, status_from_labels, status_label};
use super::ports::{IssueState, IssueTracker};
use crate::scanner::ScannedTask;

/// Remote calls in flight at once during batch updates.
const UPDATE_POOL: usize = 4;

const TASK_REF_PREFIX: &str = "<!-- foreman:task-id=";
const TASK_REF_SUFFIX: &str = " -->";

/// Embed a task id in an issue body, machine-parseable.
pub fn encode_task_ref(task_id: &str) -> String {
    format!("{TASK_REF_PREFIX}{task_id}{TASK_REF_SUFFIX}")
}

/// Extract the task id from an issue body, if present.
pub fn extract_task_ref(body: &str) -> Option<&str> {
    let start = body.find(TASK_REF_PREFIX)? + TASK_REF_PREFIX.len();
    let rest = &body[start..];
    let end = rest.find(TASK_REF_SUFFIX)?;
    Some(rest[..end].trim())
}

/// One failed bridge operation. Never aborts the batch.
#[derive(Debug)]
pub struct SyncError {
    pub task_id: Option<String>,
    pub issue: Option<u64>,
    pub message: String,
}

/// What a sync pass did (or, under dry-run, would have done).
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Outbound: new `(task_id, issue_number)` pairings.
    pub created: Vec<(String, u64)>,
    /// Outbound: issues whose title/body/labels were refreshed.
    pub updated: Vec<u64>,
    /// Outbound: issues closed because their task completed.
    pub closed: Vec<u64>,
    /// Inbound: task ids whose status was applied from the tracker.
    pub applied: Vec<String>,
    /// Operations skipped as no-ops, with reasons.
    pub skipped: Vec<String>,
    /// Dry-run: side-effects that were reported instead of performed.
    pub planned: Vec<String>,
    pub errors: Vec<SyncError>,
}

/// Bidirectional sync over one workspace.
pub struct Bridge<'a> {
    tracker: &'a dyn IssueTracker,
    journal: &'a StatusJournal,
    map_path: PathBuf,
    dry_run: bool,
}

impl<'a> Bridge<'a> {
    pub fn new(tracker: &'a dyn IssueTracker, journal: &'a StatusJournal, dry_run: bool) -> Self {
        let map_path = IssueMap::default_path(journal.workspace_root());
        Self {
            tracker,
            journal,
            map_path,
            dry_run,
        }
    }

    pub fn with_map_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.map_path = path.into();
        self
    }

    /// Outbound: push local task state to the tracker.
    ///
    /// Unmapped non-completed tasks get a new issue; mapped tasks get their
    /// issue refreshed; mapped completed tasks get their issue closed.
    pub async fn push(&self, tasks: &[ScannedTask]) -> Result<SyncReport> {
        let mut map = IssueMap::load(&self.map_path)?;
        let mut report = SyncReport::default();

        let mut to_create: Vec<&ScannedTask> = Vec::new();
        let mut to_update: Vec<(&ScannedTask, u64)> = Vec::new();
        let mut to_close: Vec<(&ScannedTask, u64)> = Vec::new();

        for scanned in tasks {
            let task = &scanned.task;
            match (map.issue_for(&task.id), task.status) {
                (Some(issue), TaskStatus::Completed) => to_close.push((scanned, issue)),
                (Some(issue), _) => to_update.push((scanned, issue)),
                (None, TaskStatus::Completed) => report
                    .skipped
                    .push(format!("{}: completed with no paired issue", task.id)),
                (None, _) => to_create.push(scanned),
            }
        }

        // Creates run one at a time: the map is committed after each
        // successful remote create, so a crash mid-batch loses no pairing.
        for scanned in to_create {
            let task = &scanned.task;
            if self.dry_run {
                report
                    .planned
                    .push(format!("would create an issue for {}", task.id));
                continue;
            }
            match self
                .tracker
                .create_issue(&task.title, &issue_body(task), &issue_labels(task))
                .await
            {
                Ok(number) => {
                    map.insert(&task.id, number);
                    map.save(&self.map_path)?;
                    info!(task_id = %task.id, issue = number, "created tracker issue");
                    report.created.push((task.id.clone(), number));
                }
                Err(e) => report.errors.push(SyncError {
                    task_id: Some(task.id.clone()),
                    issue: None,
                    message: e.to_string(),
                }),
            }
        }

        // Updates and closes have no map side to mutate; run them over a
        // small bounded pool.
        enum Refresh {
            Updated(u64),
            Closed(u64),
            Skipped(String),
            Planned(String),
            Failed(SyncError),
        }

        let refreshes = stream::iter(
            to_update
                .into_iter()
                .map(|(scanned, issue)| (scanned, issue, false))
                .chain(
                    to_close
                        .into_iter()
                        .map(|(scanned, issue)| (scanned, issue, true)),
                ),
        )
        .map(|(scanned, issue, close)| async move {
            let task = &scanned.task;
            if close {
                if self.dry_run {
                    return Refresh::Planned(format!(
                        "would close issue #{issue} for {}",
                        task.id
                    ));
                }
                match self.tracker.get_issue(issue).await {
                    Ok(remote) if remote.state == IssueState::Closed => {
                        return Refresh::Skipped(format!("issue #{issue} is already closed"));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Refresh::Failed(SyncError {
                            task_id: Some(task.id.clone()),
                            issue: Some(issue),
                            message: e.to_string(),
                        });
                    }
                }
                let comment = format!("Completed: {}", task.id);
                match self.tracker.close_issue(issue, Some(&comment)).await {
                    Ok(()) => Refresh::Closed(issue),
                    Err(e) => Refresh::Failed(SyncError {
                        task_id: Some(task.id.clone()),
                        issue: Some(issue),
                        message: e.to_string(),
                    }),
                }
            } else {
                if self.dry_run {
                    return Refresh::Planned(format!(
                        "would update issue #{issue} for {}",
                        task.id
                    ));
                }
                match self
                    .tracker
                    .update_issue(issue, &task.title, &issue_body(task), &issue_labels(task))
                    .await
                {
                    Ok(()) => Refresh::Updated(issue),
                    Err(e) => Refresh::Failed(SyncError {
                        task_id: Some(task.id.clone()),
                        issue: Some(issue),
                        message: e.to_string(),
                    }),
                }
            }
        })
        .buffer_unordered(UPDATE_POOL)
        .collect::<Vec<Refresh>>()
        .await;

        for refresh in refreshes {
            match refresh {
                Refresh::Updated(issue) => report.updated.push(issue),
                Refresh::Closed(issue) => report.closed.push(issue),
                Refresh::Skipped(note) => report.skipped.push(note),
                Refresh::Planned(note) => report.planned.push(note),
                Refresh::Failed(error) => report.errors.push(error),
            }
        }

        Ok(report)
    }

    /// Inbound: derive task status from tracker state and apply it through
    /// the journal.
    pub async fn pull(&self) -> Result<SyncReport> {
        let mut map = IssueMap::load(&self.map_path)?;
        let mut report = SyncReport::default();

        let issues = match self.tracker.list_issues().await {
            Ok(issues) => issues,
            Err(e) => {
                report.errors.push(SyncError {
                    task_id: None,
                    issue: None,
                    message: e.to_string(),
                });
                return Ok(report);
            }
        };

        for issue in &issues {
            let Some(task_id) = extract_task_ref(&issue.body) else {
                report.errors.push(SyncError {
                    task_id: None,
                    issue: Some(issue.number),
                    message: "issue body carries no task reference".to_owned(),
                });
                continue;
            };

            // Idempotent recovery: re-pair mappings the map file lost.
            if map.task_for(issue.number) != Some(task_id) && !self.dry_run {
                map.insert(task_id, issue.number);
                map.save(&self.map_path)?;
            }

            let desired = match issue.state {
                IssueState::Closed => TaskStatus::Completed,
                IssueState::Open => match status_from_labels(&issue.labels) {
                    Some(status) => status,
                    None => {
                        report
                            .skipped
                            .push(format!("issue #{}: no status label", issue.number));
                        continue;
                    }
                },
            };

            let current = match self.journal.get_task_status(task_id).await {
                Ok(status) => status,
                Err(StoreError::TaskNotFound { .. }) => {
                    report.errors.push(SyncError {
                        task_id: Some(task_id.to_owned()),
                        issue: Some(issue.number),
                        message: "task no longer exists locally".to_owned(),
                    });
                    continue;
                }
                Err(e) => {
                    report.errors.push(SyncError {
                        task_id: Some(task_id.to_owned()),
                        issue: Some(issue.number),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            if current == desired {
                report
                    .skipped
                    .push(format!("{task_id}: already {desired}"));
                continue;
            }

            if self.dry_run {
                report.planned.push(format!(
                    "would transition {task_id} {current} -> {desired} from issue #{}",
                    issue.number
                ));
                continue;
            }

            match self
                .journal
                .update_task_status(
                    task_id,
                    desired,
                    UpdateOptions {
                        summary: Some(format!("synced from issue #{}", issue.number)),
                    },
                )
                .await
            {
                Ok(_) => report.applied.push(task_id.to_owned()),
                Err(e) => {
                    warn!(task_id, issue = issue.number, error = %e, "inbound sync failed");
                    report.errors.push(SyncError {
                        task_id: Some(task_id.to_owned()),
                        issue: Some(issue.number),
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}

/// Issue body for a task: feature text, acceptance criteria, and the
/// machine-parseable task reference.
fn issue_body(task: &Task) -> String {
    let mut body = String::new();
    if let Some(description) = task.description() {
        body.push_str(description);
        body.push_str("\n\n");
    }
    if !task.acceptance_criteria().is_empty() {
        body.push_str("### Acceptance criteria\n\n");
        for criterion in task.acceptance_criteria() {
            body.push_str("- [ ] ");
            body.push_str(criterion);
            body.push('\n');
        }
        body.push('\n');
    }
    body.push_str(&encode_task_ref(&task.id));
    body
}

fn issue_labels(task: &Task) -> Vec<String> {
    vec![status_label(task.status), size_label(&task.complexity())]
}
