//! Per-file advisory locks.
//!
//! Task-file mutation is a read-modify-write cycle; within one process every
//! writer for a given file must hold the same lock across that cycle. The
//! table is keyed by absolute path and lives for the life of the process.
//! Cross-process coordination is out of scope.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

static LOCK_TABLE: OnceLock<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>> =
    OnceLock::new();

/// Fetch (or create) the advisory lock for a path.
///
/// Relative paths are resolved against the current directory so two callers
/// naming the same file differently still share one lock.
pub fn path_lock(path: &Path) -> Arc<tokio::sync::Mutex<()>> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let table = LOCK_TABLE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = table.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    map.entry(abs)
        .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
        .clone()
}
