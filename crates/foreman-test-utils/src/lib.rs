//! Shared test fixtures for foreman integration tests.
//!
//! Provides a temporary workspace with a registry, project directories, and
//! task files, plus fake worker shell scripts for exercising the executor
//! without a real `claude` binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;

use foreman_store::journal::StatusJournal;
use foreman_store::models::Registry;
use foreman_store::registry::load_registry;

/// A throwaway workspace on disk. Dropped with the value.
pub struct TestWorkspace {
    dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp workspace"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `projects.json` with the given project entries.
    pub fn write_registry(&self, projects: &[Value]) {
        let body = json!({
            "version": 1,
            "projects_root": ".",
            "projects": projects,
        });
        fs::write(
            self.root().join("projects.json"),
            serde_json::to_string_pretty(&body).expect("registry should serialize"),
        )
        .expect("failed to write registry");
    }

    /// A minimal registry project entry.
    pub fn project(name: &str, path: &str, status: &str) -> Value {
        json!({
            "name": name,
            "path": path,
            "status": status,
            "language": "rust",
        })
    }

    /// Write a project's task file, creating the directory structure.
    pub fn write_task_file(&self, project_path: &str, body: &Value) -> PathBuf {
        let path = self.task_file_path(project_path);
        fs::create_dir_all(path.parent().expect("task file path has a parent"))
            .expect("failed to create task dir");
        fs::write(
            &path,
            serde_json::to_string_pretty(body).expect("task file should serialize"),
        )
        .expect("failed to write task file");
        path
    }

    pub fn task_file_path(&self, project_path: &str) -> PathBuf {
        self.root()
            .join(project_path)
            .join(".claude")
            .join("tasks")
            .join("tasks.json")
    }

    pub fn read_task_file(&self, project_path: &str) -> Value {
        let text = fs::read_to_string(self.task_file_path(project_path))
            .expect("failed to read task file");
        serde_json::from_str(&text).expect("task file should be valid JSON")
    }

    /// Write a project's `CLAUDE.md` memory file.
    pub fn write_project_memory(&self, project_path: &str, content: &str) {
        let dir = self.root().join(project_path);
        fs::create_dir_all(&dir).expect("failed to create project dir");
        fs::write(dir.join("CLAUDE.md"), content).expect("failed to write project memory");
    }

    /// Write an arbitrary file under the workspace root.
    pub fn write_file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().expect("file path has a parent"))
            .expect("failed to create parent dir");
        fs::write(&path, content).expect("failed to write file");
        path
    }

    /// Write an executable shell script that stands in for the worker
    /// binary. The script sees the dispatched prompt on stdin.
    pub fn fake_worker(&self, name: &str, script: &str) -> PathBuf {
        let path = self.root().join(name);
        fs::write(&path, format!("#!/bin/sh\n{script}\n")).expect("failed to write worker script");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
                .expect("failed to chmod worker script");
        }
        path
    }

    /// Load the registry this workspace wrote.
    pub fn registry(&self) -> Registry {
        load_registry(self.root()).expect("registry should load")
    }

    /// A status journal over this workspace.
    pub fn journal(&self) -> StatusJournal {
        StatusJournal::new(self.root(), self.registry())
    }
}

/// A single-task task-file body, handy for small fixtures.
pub fn single_task_file(project: &str, task: Value) -> Value {
    json!({
        "version": 1,
        "project": project,
        "tasks": [task],
    })
}

/// A minimal pending task entry.
pub fn pending_task(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "status": "pending",
    })
}
