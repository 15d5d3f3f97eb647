//! Executor: spawn the worker subprocess and supervise it to completion.
//!
//! The prompt goes to the child on stdin, never through argv. Stdout and
//! stderr are drained concurrently so a chatty worker can never deadlock on
//! a full pipe. Every exit path — success, failure, spawn error — lands a
//! terminal status in the journal before this function returns.

use std::process::Stdio;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

use foreman_store::StoreError;
use foreman_store::journal::{StatusJournal, UpdateOptions};
use foreman_store::models::TaskStatus;

use crate::dispatch::DispatchDescriptor;

/// Callback invoked once per output line while the worker runs.
pub type LineCallback = Box<dyn Fn(&str) + Send + Sync>;

/// How to run the worker.
pub struct ExecutorOptions {
    /// Path to the worker binary. Defaults to `"claude"` (found via `$PATH`).
    pub worker_binary: String,
    pub on_stdout: Option<LineCallback>,
    pub on_stderr: Option<LineCallback>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            worker_binary: "claude".to_owned(),
            on_stdout: None,
            on_stderr: None,
        }
    }
}

impl ExecutorOptions {
    /// Use a custom worker binary. Useful for tests, which point this at a
    /// shell script.
    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            worker_binary: path.into(),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for ExecutorOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorOptions")
            .field("worker_binary", &self.worker_binary)
            .field("on_stdout", &self.on_stdout.is_some())
            .field("on_stderr", &self.on_stderr.is_some())
            .finish()
    }
}

/// Errors from a worker run.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("failed to spawn worker {binary:?}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one worker run produced.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub task_id: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run the worker described by `descriptor` for `task_id`.
///
/// Returns the completion record for both zero and non-zero exits; callers
/// check [`ExecutionRecord::exit_code`]. A spawn failure marks the task
/// `failed` and surfaces as [`ExecutorError::Spawn`].
pub async fn execute_worker(
    journal: &StatusJournal,
    task_id: &str,
    descriptor: &DispatchDescriptor,
    opts: &ExecutorOptions,
) -> Result<ExecutionRecord, ExecutorError> {
    let started_at = Utc::now();

    let mut cmd = Command::new(&opts.worker_binary);
    cmd.args(&descriptor.args)
        .current_dir(&descriptor.working_directory)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &descriptor.env {
        cmd.env(key, value);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            let summary = format!("failed to spawn worker {:?}: {e}", opts.worker_binary);
            if let Err(journal_err) = journal
                .update_task_status(
                    task_id,
                    TaskStatus::Failed,
                    UpdateOptions {
                        summary: Some(summary),
                    },
                )
                .await
            {
                warn!(task_id, error = %journal_err, "could not record spawn failure");
            }
            return Err(ExecutorError::Spawn {
                binary: opts.worker_binary.clone(),
                source: e,
            });
        }
    };

    let mut stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let write_prompt = async {
        if let Some(mut stdin) = stdin.take() {
            if let Err(e) = stdin.write_all(descriptor.prompt.as_bytes()).await {
                warn!(task_id, error = %e, "failed to write prompt to worker stdin");
            }
            // Dropping stdin closes the pipe; the worker sees EOF.
        }
    };

    let (_, stdout_buf, stderr_buf) = tokio::join!(
        write_prompt,
        drain_lines(stdout, opts.on_stdout.as_deref()),
        drain_lines(stderr, opts.on_stderr.as_deref()),
    );

    let head = stderr_head(&stderr_buf);
    let exit_code = journal
        .watch_worker_completion(task_id, &mut child, Some(&head))
        .await?;
    let completed_at = Utc::now();

    if exit_code == 0 {
        info!(task_id, "worker completed");
    } else {
        warn!(task_id, exit_code, "worker failed");
    }

    Ok(ExecutionRecord {
        task_id: task_id.to_owned(),
        exit_code,
        stdout: stdout_buf,
        stderr: stderr_buf,
        started_at,
        completed_at,
    })
}

/// Read a pipe to EOF, invoking the callback per line and buffering the
/// whole stream.
async fn drain_lines<R: AsyncRead + Unpin>(
    reader: Option<R>,
    callback: Option<&(dyn Fn(&str) + Send + Sync)>,
) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    let mut lines = BufReader::new(reader).lines();
    let mut buffer = String::new();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(callback) = callback {
                    callback(&line);
                }
                buffer.push_str(&line);
                buffer.push('\n');
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "error reading worker output");
                break;
            }
        }
    }
    buffer
}

/// First lines of stderr, bounded, for failure summaries.
fn stderr_head(stderr: &str) -> String {
    let head: Vec<&str> = stderr.lines().take(5).collect();
    let mut joined = head.join("\n");
    if joined.chars().count() > 500 {
        joined = joined.chars().take(500).collect();
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_head_takes_first_lines() {
        let long = (0..20).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let head = stderr_head(&long);
        assert!(head.starts_with("line 0"));
        assert!(head.ends_with("line 4"));
    }

    #[test]
    fn stderr_head_bounds_length() {
        let noisy = "x".repeat(10_000);
        assert_eq!(stderr_head(&noisy).chars().count(), 500);
    }
}
