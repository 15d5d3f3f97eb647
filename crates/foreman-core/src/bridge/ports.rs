//! The issue-tracker port.
//!
//! The bridge depends on nothing tracker-specific beyond title, body,
//! labels, and open/closed state.

use async_trait::async_trait;

/// Open/closed state of a remote issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueState {
    Open,
    Closed,
}

/// The slice of a remote issue the bridge works with.
#[derive(Debug, Clone)]
pub struct RemoteIssue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub state: IssueState,
}

/// Errors from tracker operations. Accumulated per-operation by the bridge;
/// they never abort a batch.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("failed to invoke tracker for {op}: {source}")]
    Spawn {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("tracker {op} failed: {message}")]
    Command { op: &'static str, message: String },

    #[error("could not parse tracker output for {op}: {message}")]
    Parse { op: &'static str, message: String },
}

/// Minimal capability surface of the external tracker.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Create an issue; returns its number.
    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<u64, TrackerError>;

    /// Replace an issue's title, body, and bridge-owned labels.
    async fn update_issue(
        &self,
        number: u64,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<(), TrackerError>;

    /// Close an issue, optionally leaving a comment.
    async fn close_issue(&self, number: u64, comment: Option<&str>) -> Result<(), TrackerError>;

    /// List issues (open and closed) with body and labels.
    async fn list_issues(&self) -> Result<Vec<RemoteIssue>, TrackerError>;

    /// Fetch a single issue.
    async fn get_issue(&self, number: u64) -> Result<RemoteIssue, TrackerError>;
}
