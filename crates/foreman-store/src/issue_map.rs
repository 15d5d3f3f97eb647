//! The per-workspace issue map: task id ↔ external issue number.
//!
//! Owned by the issue-tracker bridge. Both directions are kept in step by
//! construction; `insert` evicts any stale pairing either side had before.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::StoreError;
use crate::codec;

/// Bidirectional task ↔ issue pairing, persisted at
/// `<workspace>/.claude/issue-map.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueMap {
    pub version: u32,
    #[serde(default)]
    pub task_to_issue: BTreeMap<String, u64>,
    #[serde(default)]
    pub issue_to_task: BTreeMap<u64, String>,
}

impl Default for IssueMap {
    fn default() -> Self {
        Self {
            version: 1,
            task_to_issue: BTreeMap::new(),
            issue_to_task: BTreeMap::new(),
        }
    }
}

impl IssueMap {
    /// Conventional location under a workspace root.
    pub fn default_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(".claude").join("issue-map.json")
    }

    /// Load the map; a missing file is an empty map.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Persist atomically (temp sibling + rename).
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let value = serde_json::to_value(self).map_err(|e| StoreError::Schema {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        codec::write_raw(path, &value)
    }

    /// Register a pairing, evicting any stale pairing on either side.
    pub fn insert(&mut self, task_id: &str, issue: u64) {
        if let Some(old_issue) = self.task_to_issue.insert(task_id.to_owned(), issue) {
            if old_issue != issue {
                self.issue_to_task.remove(&old_issue);
            }
        }
        if let Some(old_task) = self.issue_to_task.insert(issue, task_id.to_owned()) {
            if old_task != task_id {
                self.task_to_issue.remove(&old_task);
            }
        }
    }

    pub fn remove_task(&mut self, task_id: &str) {
        if let Some(issue) = self.task_to_issue.remove(task_id) {
            self.issue_to_task.remove(&issue);
        }
    }

    pub fn remove_issue(&mut self, issue: u64) {
        if let Some(task_id) = self.issue_to_task.remove(&issue) {
            self.task_to_issue.remove(&task_id);
        }
    }

    pub fn issue_for(&self, task_id: &str) -> Option<u64> {
        self.task_to_issue.get(task_id).copied()
    }

    pub fn task_for(&self, issue: u64) -> Option<&str> {
        self.issue_to_task.get(&issue).map(String::as_str)
    }

    /// Every forward entry has its reverse and vice versa.
    pub fn is_bidirectional(&self) -> bool {
        self.task_to_issue.len() == self.issue_to_task.len()
            && self
                .task_to_issue
                .iter()
                .all(|(task, issue)| self.task_for(*issue) == Some(task.as_str()))
    }
}
