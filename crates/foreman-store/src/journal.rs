//! Status journal: the only writer of task files.
//!
//! Every public mutation appends exactly one history entry, updates
//! `updated_at`, and commits through the codec's atomic write while holding
//! the per-file advisory lock. Mutations are surgical — the rest of the file,
//! including fields and tasks this version does not understand, is written
//! back untouched.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use tokio::process::Child;
use tracing::debug;

use crate::StoreError;
use crate::codec;
use crate::lock;
use crate::models::{HistoryEntry, Project, Registry, Task, TaskStatus};

/// Options for a status update.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Free-text summary recorded on the history entry.
    pub summary: Option<String>,
}

/// Serializes all task-file mutation for one workspace.
#[derive(Debug, Clone)]
pub struct StatusJournal {
    workspace_root: PathBuf,
    registry: Registry,
}

impl StatusJournal {
    pub fn new(workspace_root: impl Into<PathBuf>, registry: Registry) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            registry,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolve a task id to its owning project and task-file path.
    fn locate(&self, task_id: &str) -> Result<(&Project, PathBuf), StoreError> {
        let project_name = task_id
            .split_once('/')
            .map(|(project, _)| project)
            .ok_or_else(|| StoreError::TaskNotFound {
                id: task_id.to_owned(),
            })?;
        let project =
            self.registry
                .find_project(project_name)
                .ok_or_else(|| StoreError::TaskNotFound {
                    id: task_id.to_owned(),
                })?;
        let path = self.registry.task_file_path(&self.workspace_root, project);
        Ok((project, path))
    }

    /// Transition a task to `new_status`, appending one history entry and
    /// bumping `updated_at`.
    ///
    /// `in_progress -> in_progress` is denied with
    /// [`StoreError::TaskAlreadyRunning`]; this is what guarantees at most
    /// one worker per task id.
    pub async fn update_task_status(
        &self,
        task_id: &str,
        new_status: TaskStatus,
        opts: UpdateOptions,
    ) -> Result<Task, StoreError> {
        let (_, path) = self.locate(task_id)?;
        let file_lock = lock::path_lock(&path);
        let _guard = file_lock.lock().await;

        let mut root = match codec::read_raw(&path) {
            Ok(root) => root,
            Err(StoreError::NotFound { .. }) => {
                return Err(StoreError::TaskNotFound {
                    id: task_id.to_owned(),
                });
            }
            Err(e) => return Err(e),
        };

        let entry = root
            .get_mut("tasks")
            .and_then(Value::as_array_mut)
            .and_then(|tasks| {
                tasks
                    .iter_mut()
                    .find(|t| t.get("id").and_then(Value::as_str) == Some(task_id))
            })
            .ok_or_else(|| StoreError::TaskNotFound {
                id: task_id.to_owned(),
            })?;

        let from: TaskStatus = entry
            .get("status")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| StoreError::Schema {
                path: path.clone(),
                message: format!("task {task_id} has an unreadable status"),
            })?;

        if from == TaskStatus::InProgress && new_status == TaskStatus::InProgress {
            return Err(StoreError::TaskAlreadyRunning {
                id: task_id.to_owned(),
            });
        }

        let now = Utc::now();
        let history_entry = HistoryEntry {
            from_status: from,
            to_status: new_status,
            timestamp: now,
            agent_summary: opts.summary,
        };

        let obj = entry.as_object_mut().ok_or_else(|| StoreError::Schema {
            path: path.clone(),
            message: format!("task {task_id} is not an object"),
        })?;
        obj.insert("status".to_owned(), json_value(&new_status, &path)?);
        obj.insert("updated_at".to_owned(), json_value(&now, &path)?);
        obj.entry("history".to_owned())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Some(history) = obj.get_mut("history").and_then(Value::as_array_mut) {
            history.push(json_value(&history_entry, &path)?);
        }

        let updated: Task =
            serde_json::from_value(Value::Object(obj.clone())).map_err(|e| StoreError::Schema {
                path: path.clone(),
                message: e.to_string(),
            })?;

        codec::write_raw(&path, &root)?;
        debug!(task_id, from = %from, to = %new_status, "recorded status transition");
        Ok(updated)
    }

    /// Read-only status lookup.
    pub async fn get_task_status(&self, task_id: &str) -> Result<TaskStatus, StoreError> {
        Ok(self.get_task(task_id).await?.status)
    }

    /// Read-only task lookup.
    pub async fn get_task(&self, task_id: &str) -> Result<Task, StoreError> {
        let (_, path) = self.locate(task_id)?;
        let read = match codec::read_task_file(&path) {
            Ok(read) => read,
            Err(StoreError::NotFound { .. }) => {
                return Err(StoreError::TaskNotFound {
                    id: task_id.to_owned(),
                });
            }
            Err(e) => return Err(e),
        };
        read.file
            .tasks
            .into_iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| StoreError::TaskNotFound {
                id: task_id.to_owned(),
            })
    }

    /// Await a worker's exit and record the terminal transition.
    ///
    /// Exit code 0 transitions `in_progress -> completed`; anything else
    /// transitions to `failed` with the exit code (and the head of stderr,
    /// when the caller captured one) in the history summary. Returns the
    /// exit code; a signal-terminated child reports as -1.
    pub async fn watch_worker_completion(
        &self,
        task_id: &str,
        child: &mut Child,
        stderr_head: Option<&str>,
    ) -> Result<i32, StoreError> {
        let status = child.wait().await?;
        let code = status.code().unwrap_or(-1);

        if code == 0 {
            self.update_task_status(task_id, TaskStatus::Completed, UpdateOptions::default())
                .await?;
        } else {
            let head = stderr_head.unwrap_or("").trim();
            let summary = if head.is_empty() {
                format!("worker exited with code {code}")
            } else {
                format!("worker exited with code {code}: {head}")
            };
            self.update_task_status(
                task_id,
                TaskStatus::Failed,
                UpdateOptions {
                    summary: Some(summary),
                },
            )
            .await?;
        }

        Ok(code)
    }
}

fn json_value<T: serde::Serialize>(value: &T, path: &Path) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Schema {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
