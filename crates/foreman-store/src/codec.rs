//! Task-file codec: schema-tolerant reads, atomic writes.
//!
//! Task files are written by many independent authors, so the read side
//! drops only the tasks it cannot make sense of and reports everything else
//! as diagnostics. The write side commits through a sibling temp file and a
//! rename so readers never observe a partial file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::StoreError;
use crate::models::{Milestone, Task, TaskFile, TaskStatus};

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    ParseError,
    ValidationError,
    UnknownField,
}

/// One problem found while reading a task file, with enough context to
/// locate it.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl Diagnostic {
    /// A file-level parse/shape failure, recorded by callers that degrade
    /// around an unreadable file instead of propagating the error.
    pub fn parse_error(path: &Path, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::ParseError,
            path: path.to_path_buf(),
            task_index: None,
            task_id: None,
            field: None,
            message: message.into(),
        }
    }

    fn validation(
        path: &Path,
        task_index: usize,
        task_id: Option<String>,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: DiagnosticKind::ValidationError,
            path: path.to_path_buf(),
            task_index: Some(task_index),
            task_id,
            field: field.map(str::to_owned),
            message: message.into(),
        }
    }

    fn unknown_field(
        path: &Path,
        task_index: Option<usize>,
        task_id: Option<String>,
        field: &str,
    ) -> Self {
        Self {
            kind: DiagnosticKind::UnknownField,
            path: path.to_path_buf(),
            task_index,
            task_id,
            field: Some(field.to_owned()),
            message: format!("unknown field {field:?} preserved but not understood"),
        }
    }
}

/// Result of reading a task file: the parsed file plus per-task diagnostics.
///
/// Tasks that failed validation are absent from `file.tasks`; `errors`
/// records why. `warnings` lists unknown fields that were kept.
#[derive(Debug)]
pub struct TaskFileRead {
    pub file: TaskFile,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Outer shell of a task file, with tasks left as raw values so one bad
/// task cannot sink its siblings.
#[derive(Deserialize)]
struct RawTaskFile {
    version: u32,
    project: String,
    #[serde(default)]
    milestone: Option<Milestone>,
    #[serde(default)]
    tasks: Vec<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Read and validate a task file.
///
/// Classified failures: [`StoreError::NotFound`] when the path is absent,
/// [`StoreError::Parse`] for JSON syntax errors, [`StoreError::Schema`]
/// when the outer shell (version/project) is unusable. Per-task problems
/// never fail the call; they surface in [`TaskFileRead::errors`].
pub fn read_task_file(path: &Path) -> Result<TaskFileRead, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let root: Value = serde_json::from_str(&text).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let raw: RawTaskFile = serde_json::from_value(root).map_err(|e| StoreError::Schema {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut tasks = Vec::with_capacity(raw.tasks.len());

    for (index, value) in raw.tasks.into_iter().enumerate() {
        match validate_task(path, index, &raw.project, value, &mut warnings) {
            Ok(task) => tasks.push(task),
            Err(diag) => errors.push(diag),
        }
    }

    for key in raw.extra.keys() {
        warnings.push(Diagnostic::unknown_field(path, None, None, key));
    }

    Ok(TaskFileRead {
        file: TaskFile {
            version: raw.version,
            project: raw.project,
            milestone: raw.milestone,
            tasks,
            extra: raw.extra,
        },
        errors,
        warnings,
    })
}

/// Validate one raw task entry, collecting unknown-field warnings.
fn validate_task(
    path: &Path,
    index: usize,
    project: &str,
    value: Value,
    warnings: &mut Vec<Diagnostic>,
) -> Result<Task, Diagnostic> {
    let Some(obj) = value.as_object() else {
        return Err(Diagnostic::validation(
            path,
            index,
            None,
            None,
            "task entry is not an object",
        ));
    };

    for field in ["id", "title", "status"] {
        if !obj.get(field).is_some_and(Value::is_string) {
            return Err(Diagnostic::validation(
                path,
                index,
                obj.get("id").and_then(Value::as_str).map(str::to_owned),
                Some(field),
                format!("required field {field:?} is missing or not a string"),
            ));
        }
    }

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    let status_str = obj.get("status").and_then(Value::as_str).unwrap_or_default();
    if status_str.parse::<TaskStatus>().is_err() {
        return Err(Diagnostic::validation(
            path,
            index,
            Some(id),
            Some("status"),
            format!("unknown task status {status_str:?}"),
        ));
    }

    match id.split_once('/') {
        Some((prefix, _)) if prefix == project => {}
        _ => {
            return Err(Diagnostic::validation(
                path,
                index,
                Some(id.clone()),
                Some("id"),
                format!("task id {id:?} does not belong to project {project:?}"),
            ));
        }
    }

    let task: Task = serde_json::from_value(value).map_err(|e| {
        Diagnostic::validation(path, index, Some(id.clone()), None, e.to_string())
    })?;

    for key in task.extra.keys() {
        warnings.push(Diagnostic::unknown_field(
            path,
            Some(index),
            Some(task.id.clone()),
            key,
        ));
    }

    Ok(task)
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Write a task file atomically: temp sibling, then rename as the commit
/// point. Task order and unknown fields are preserved.
pub fn write_task_file(path: &Path, file: &TaskFile) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(file).map_err(|e| StoreError::Schema {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    write_atomic(path, &text)
}

/// Read a task file as raw JSON, without validation.
///
/// The journal mutates files surgically through this so that tasks a newer
/// tool wrote (even ones this version would drop on a typed read) survive
/// a status update untouched.
pub fn read_raw(path: &Path) -> Result<Value, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&text).map_err(|e| StoreError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Atomically write raw JSON back to a task file.
pub fn write_raw(path: &Path, root: &Value) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(root).map_err(|e| StoreError::Schema {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    write_atomic(path, &text)
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| {
        StoreError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path {} has no parent directory", path.display()),
        ))
    })?;
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_json(dir: &Path, value: &Value) -> PathBuf {
        let path = dir.join("tasks.json");
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }

    #[test]
    fn read_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_task_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn read_malformed_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, "{ not json").unwrap();
        let err = read_task_file(&path).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn read_missing_project_is_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(dir.path(), &json!({ "version": 1, "tasks": [] }));
        let err = read_task_file(&path).unwrap_err();
        assert!(matches!(err, StoreError::Schema { .. }));
    }

    #[test]
    fn task_missing_title_is_dropped_with_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            dir.path(),
            &json!({
                "version": 1,
                "project": "app",
                "tasks": [
                    { "id": "app/ok", "title": "Ok", "status": "pending" },
                    { "id": "app/broken", "status": "pending" }
                ]
            }),
        );
        let read = read_task_file(&path).unwrap();
        assert_eq!(read.file.tasks.len(), 1);
        assert_eq!(read.errors.len(), 1);
        let diag = &read.errors[0];
        assert_eq!(diag.kind, DiagnosticKind::ValidationError);
        assert_eq!(diag.task_index, Some(1));
        assert_eq!(diag.field.as_deref(), Some("title"));
    }

    #[test]
    fn unknown_status_is_dropped_with_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            dir.path(),
            &json!({
                "version": 1,
                "project": "app",
                "tasks": [{ "id": "app/x", "title": "X", "status": "done" }]
            }),
        );
        let read = read_task_file(&path).unwrap();
        assert!(read.file.tasks.is_empty());
        assert_eq!(read.errors[0].field.as_deref(), Some("status"));
    }

    #[test]
    fn mismatched_id_prefix_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            dir.path(),
            &json!({
                "version": 1,
                "project": "app",
                "tasks": [{ "id": "other/x", "title": "X", "status": "pending" }]
            }),
        );
        let read = read_task_file(&path).unwrap();
        assert!(read.file.tasks.is_empty());
        assert_eq!(read.errors[0].field.as_deref(), Some("id"));
    }

    #[test]
    fn unknown_fields_warn_and_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            dir.path(),
            &json!({
                "version": 1,
                "project": "app",
                "sprint": "2026-08",
                "tasks": [{
                    "id": "app/x",
                    "title": "X",
                    "status": "pending",
                    "reviewer": "sam"
                }]
            }),
        );
        let read = read_task_file(&path).unwrap();
        assert!(read.errors.is_empty());
        let fields: Vec<_> = read
            .warnings
            .iter()
            .filter_map(|w| w.field.as_deref())
            .collect();
        assert!(fields.contains(&"sprint"));
        assert!(fields.contains(&"reviewer"));

        write_task_file(&path, &read.file).unwrap();
        let again = read_task_file(&path).unwrap();
        assert_eq!(again.file.extra.get("sprint"), Some(&json!("2026-08")));
        assert_eq!(
            again.file.tasks[0].extra.get("reviewer"),
            Some(&json!("sam"))
        );
    }

    #[test]
    fn write_preserves_task_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            dir.path(),
            &json!({
                "version": 1,
                "project": "app",
                "tasks": [
                    { "id": "app/z", "title": "Z", "status": "pending" },
                    { "id": "app/a", "title": "A", "status": "pending" }
                ]
            }),
        );
        let read = read_task_file(&path).unwrap();
        write_task_file(&path, &read.file).unwrap();
        let again = read_task_file(&path).unwrap();
        let ids: Vec<_> = again.file.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["app/z", "app/a"]);
    }

    #[test]
    fn raw_round_trip_is_byte_stable() {
        let dir = tempfile::tempdir().unwrap();
        let value = json!({
            "version": 1,
            "project": "app",
            "future_field": { "nested": [1, 2, 3] },
            "tasks": [{ "id": "app/x", "title": "X", "status": "pending", "zzz": null }]
        });
        let path = dir.path().join("tasks.json");
        write_raw(&path, &value).unwrap();
        let first = fs::read_to_string(&path).unwrap();

        let read = read_raw(&path).unwrap();
        write_raw(&path, &read).unwrap();
        let second = fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }
}
