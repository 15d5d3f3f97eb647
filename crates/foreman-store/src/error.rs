//! Store-level error taxonomy.

use std::path::PathBuf;

/// Errors raised by the registry, the task-file codec, and the status
/// journal.
///
/// Registry variants are fatal for the process; codec variants are scoped to
/// one file and the scanner degrades around them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("project registry not found at {path}")]
    RegistryNotFound { path: PathBuf },

    #[error("project registry at {path} is malformed: {message}")]
    RegistryMalformed { path: PathBuf, message: String },

    #[error("task file not found at {path}")]
    NotFound { path: PathBuf },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("schema violation in {path}: {message}")]
    Schema { path: PathBuf, message: String },

    #[error("task {id} not found")]
    TaskNotFound { id: String },

    #[error("task {id} is already running")]
    TaskAlreadyRunning { id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
