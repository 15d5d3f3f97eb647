//! Shared data model: tasks, task files, projects, and the issue map.
//!
//! Task status is a closed enumeration; complexity, model tier, and project
//! status tolerate unknown values explicitly (they carry the original string
//! through round-trips) because task files are written by many independent
//! authors.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Blocked,
}

impl TaskStatus {
    /// Whether the task has reached a terminal orchestration state.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "blocked" => Ok(Self::Blocked),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskStatus`] string.
#[derive(Debug, Clone)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ---------------------------------------------------------------------------

/// Task complexity bucket.
///
/// Unknown values are kept verbatim in [`Complexity::Other`] so files written
/// by newer tools survive a round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Complexity {
    S,
    M,
    L,
    Xl,
    Other(String),
}

impl Complexity {
    /// Effort multiplier applied to the impact factor.
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::S => 1.0,
            Self::M => 0.75,
            Self::L => 0.5,
            Self::Xl => 0.3,
            Self::Other(_) => 1.0,
        }
    }

    /// Ordering rank used as a scoring tie-break: S before M before L
    /// before XL. Unknown values sort with S (they share its multiplier).
    pub fn rank(&self) -> u8 {
        match self {
            Self::S | Self::Other(_) => 0,
            Self::M => 1,
            Self::L => 2,
            Self::Xl => 3,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::S => "S",
            Self::M => "M",
            Self::L => "L",
            Self::Xl => "XL",
            Self::Other(s) => s,
        }
    }

    fn from_name(s: &str) -> Self {
        match s {
            "S" => Self::S,
            "M" => Self::M,
            "L" => Self::L,
            "XL" => Self::Xl,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Complexity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Complexity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_name(&s))
    }
}

// ---------------------------------------------------------------------------

/// Which worker model a task should be dispatched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelTier {
    Opus,
    Local,
    Other(String),
}

impl ModelTier {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Opus => "opus",
            Self::Local => "local",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ModelTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModelTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "opus" => Self::Opus,
            "local" => Self::Local,
            _ => Self::Other(s),
        })
    }
}

// ---------------------------------------------------------------------------

/// Lifecycle status of a registered project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectStatus {
    Buildable,
    NearBuildable,
    ScaffoldingPlus,
    Scaffolding,
    Blocked,
    Other(String),
}

impl ProjectStatus {
    /// Maturity factor for scoring. Unknown statuses score zero.
    pub fn maturity(&self) -> f64 {
        match self {
            Self::Buildable => 100.0,
            Self::NearBuildable => 80.0,
            Self::ScaffoldingPlus => 60.0,
            Self::Scaffolding => 40.0,
            Self::Blocked => 10.0,
            Self::Other(_) => 0.0,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Buildable => "buildable",
            Self::NearBuildable => "near-buildable",
            Self::ScaffoldingPlus => "scaffolding-plus",
            Self::Scaffolding => "scaffolding",
            Self::Blocked => "blocked",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProjectStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProjectStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "buildable" => Self::Buildable,
            "near-buildable" => Self::NearBuildable,
            "scaffolding-plus" => Self::ScaffoldingPlus,
            "scaffolding" => Self::Scaffolding,
            "blocked" => Self::Blocked,
            _ => Self::Other(s),
        })
    }
}

// ---------------------------------------------------------------------------
// Task records
// ---------------------------------------------------------------------------

/// One status transition in a task's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub from_status: TaskStatus,
    pub to_status: TaskStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_summary: Option<String>,
}

/// Feature details attached to a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
}

/// A unit of work owned by exactly one project.
///
/// Optional attributes stay `None`/empty when absent on disk so a read/write
/// round-trip does not invent fields; callers wanting the schema defaults use
/// the accessor methods. Keys this version does not know about are preserved
/// in `extra` and reported as warnings by the codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Globally unique id, `"<project-name>/<slug>"`.
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unlocks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<Feature>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relevant_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_issue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_override: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_tier: Option<ModelTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    /// The project-name prefix of the task id, if well-formed.
    pub fn project_prefix(&self) -> Option<&str> {
        self.id.split_once('/').map(|(project, _)| project)
    }

    /// Complexity with the schema default (`M`) applied.
    pub fn complexity(&self) -> Complexity {
        self.complexity.clone().unwrap_or(Complexity::M)
    }

    /// Model tier with the schema default (`opus`) applied.
    pub fn model_tier(&self) -> ModelTier {
        self.model_tier.clone().unwrap_or(ModelTier::Opus)
    }

    pub fn description(&self) -> Option<&str> {
        self.feature.as_ref().and_then(|f| f.description.as_deref())
    }

    pub fn acceptance_criteria(&self) -> &[String] {
        self.feature
            .as_ref()
            .map(|f| f.acceptance_criteria.as_slice())
            .unwrap_or(&[])
    }
}

/// File-level milestone metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
}

/// Per-project task container, `.claude/tasks/tasks.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFile {
    pub version: u32,
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<Milestone>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A registered project in the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub path: String,
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The workspace project registry, `projects.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    pub version: u32,
    #[serde(default = "default_projects_root")]
    pub projects_root: String,
    #[serde(default)]
    pub projects: Vec<Project>,
}

fn default_projects_root() -> String {
    ".".to_owned()
}

impl Registry {
    pub fn find_project(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Base directory that project paths are resolved against.
    pub fn projects_base(&self, workspace_root: &std::path::Path) -> std::path::PathBuf {
        let root = std::path::Path::new(&self.projects_root);
        if root.is_absolute() {
            root.to_path_buf()
        } else if self.projects_root.is_empty() || self.projects_root == "." {
            workspace_root.to_path_buf()
        } else {
            workspace_root.join(root)
        }
    }

    pub fn project_dir(
        &self,
        workspace_root: &std::path::Path,
        project: &Project,
    ) -> std::path::PathBuf {
        self.projects_base(workspace_root).join(&project.path)
    }

    /// Path of a project's task file under the workspace.
    pub fn task_file_path(
        &self,
        workspace_root: &std::path::Path,
        project: &Project,
    ) -> std::path::PathBuf {
        self.project_dir(workspace_root, project)
            .join(".claude")
            .join("tasks")
            .join("tasks.json")
    }
}
