//! Project registry loading.
//!
//! The registry (`projects.json` at the workspace root) is loaded once at
//! startup and treated as read-only for the life of a loop iteration.
//! Failures here are fatal configuration errors.

use std::fs;
use std::io;
use std::path::Path;

use crate::StoreError;
use crate::models::Registry;

/// File name of the registry at the workspace root.
pub const REGISTRY_FILE: &str = "projects.json";

/// Load the registry from `<workspace>/projects.json`.
pub fn load_registry(workspace_root: &Path) -> Result<Registry, StoreError> {
    load_registry_from(&workspace_root.join(REGISTRY_FILE))
}

/// Load a registry from an explicit path.
pub fn load_registry_from(path: &Path) -> Result<Registry, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoreError::RegistryNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let registry: Registry =
        serde_json::from_str(&text).map_err(|e| StoreError::RegistryMalformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut seen = std::collections::HashSet::new();
    for project in &registry.projects {
        if !seen.insert(project.name.as_str()) {
            return Err(StoreError::RegistryMalformed {
                path: path.to_path_buf(),
                message: format!("duplicate project name {:?}", project.name),
            });
        }
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn load_missing_registry() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_registry(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::RegistryNotFound { .. }));
    }

    #[test]
    fn load_malformed_registry() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(REGISTRY_FILE), "[oops").unwrap();
        let err = load_registry(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::RegistryMalformed { .. }));
    }

    #[test]
    fn load_registry_with_projects() {
        let dir = tempfile::tempdir().unwrap();
        let body = json!({
            "version": 1,
            "projects_root": ".",
            "projects": [
                { "name": "app", "path": "app", "status": "buildable", "language": "rust" },
                { "name": "web", "path": "sites/web", "status": "scaffolding", "language": "ts" }
            ]
        });
        fs::write(
            dir.path().join(REGISTRY_FILE),
            serde_json::to_string_pretty(&body).unwrap(),
        )
        .unwrap();

        let registry = load_registry(dir.path()).unwrap();
        assert_eq!(registry.projects.len(), 2);
        assert!(registry.find_project("web").is_some());
        assert!(registry.find_project("nope").is_none());
    }

    #[test]
    fn duplicate_project_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let body = json!({
            "version": 1,
            "projects": [
                { "name": "app", "path": "a", "status": "buildable" },
                { "name": "app", "path": "b", "status": "blocked" }
            ]
        });
        fs::write(
            dir.path().join(REGISTRY_FILE),
            serde_json::to_string(&body).unwrap(),
        )
        .unwrap();
        let err = load_registry(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::RegistryMalformed { .. }));
    }
}
