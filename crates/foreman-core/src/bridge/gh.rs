//! `gh`-CLI adapter for the issue-tracker port.
//!
//! Shells out to a pre-authenticated GitHub CLI and parses its `--json`
//! output. Only title, body, labels, and open/closed state are touched.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::labels::is_bridge_label;
use super::ports::{IssueState, IssueTracker, RemoteIssue, TrackerError};

const ISSUE_JSON_FIELDS: &str = "number,title,body,labels,state";

/// Issue tracker backed by the `gh` command-line client.
#[derive(Debug, Clone)]
pub struct GhTracker {
    /// Path to the `gh` binary. Defaults to `"gh"` (found via `$PATH`).
    binary: String,
    /// Optional `owner/repo` override; without it `gh` uses the current
    /// repository context.
    repo: Option<String>,
}

impl Default for GhTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl GhTracker {
    pub fn new() -> Self {
        Self {
            binary: "gh".to_owned(),
            repo: None,
        }
    }

    /// Use a custom binary path. Useful for tests.
    pub fn with_binary(path: impl Into<String>) -> Self {
        Self {
            binary: path.into(),
            repo: None,
        }
    }

    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    async fn run(&self, op: &'static str, args: Vec<String>) -> Result<String, TrackerError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args);
        if let Some(repo) = &self.repo {
            cmd.arg("--repo").arg(repo);
        }
        debug!(op, ?args, "invoking tracker CLI");

        let output = cmd
            .output()
            .await
            .map_err(|e| TrackerError::Spawn { op, source: e })?;

        if !output.status.success() {
            return Err(TrackerError::Command {
                op,
                message: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Deserialize)]
struct GhIssue {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    labels: Vec<GhLabel>,
    state: String,
}

#[derive(Deserialize)]
struct GhLabel {
    name: String,
}

impl GhIssue {
    fn into_remote(self, op: &'static str) -> Result<RemoteIssue, TrackerError> {
        let state = if self.state.eq_ignore_ascii_case("open") {
            IssueState::Open
        } else if self.state.eq_ignore_ascii_case("closed") {
            IssueState::Closed
        } else {
            return Err(TrackerError::Parse {
                op,
                message: format!("unexpected issue state {:?}", self.state),
            });
        };
        Ok(RemoteIssue {
            number: self.number,
            title: self.title,
            body: self.body,
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            state,
        })
    }
}

/// Parse the issue number out of the URL `gh issue create` prints.
fn issue_number_from_url(stdout: &str) -> Result<u64, TrackerError> {
    stdout
        .trim()
        .rsplit('/')
        .next()
        .and_then(|tail| tail.parse().ok())
        .ok_or_else(|| TrackerError::Parse {
            op: "create_issue",
            message: format!("could not find an issue number in {stdout:?}"),
        })
}

#[async_trait]
impl IssueTracker for GhTracker {
    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<u64, TrackerError> {
        let mut args = vec![
            "issue".to_owned(),
            "create".to_owned(),
            "--title".to_owned(),
            title.to_owned(),
            "--body".to_owned(),
            body.to_owned(),
        ];
        for label in labels {
            args.push("--label".to_owned());
            args.push(label.clone());
        }
        let stdout = self.run("create_issue", args).await?;
        issue_number_from_url(&stdout)
    }

    async fn update_issue(
        &self,
        number: u64,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<(), TrackerError> {
        // Bridge-owned labels are replaced; labels humans added stay.
        let current = self.get_issue(number).await?;
        let add: Vec<&String> = labels
            .iter()
            .filter(|label| !current.labels.contains(*label))
            .collect();
        let remove: Vec<&String> = current
            .labels
            .iter()
            .filter(|label| is_bridge_label(label) && !labels.contains(*label))
            .collect();

        let mut args = vec![
            "issue".to_owned(),
            "edit".to_owned(),
            number.to_string(),
            "--title".to_owned(),
            title.to_owned(),
            "--body".to_owned(),
            body.to_owned(),
        ];
        if !add.is_empty() {
            args.push("--add-label".to_owned());
            args.push(add.iter().map(|l| l.as_str()).collect::<Vec<_>>().join(","));
        }
        if !remove.is_empty() {
            args.push("--remove-label".to_owned());
            args.push(
                remove
                    .iter()
                    .map(|l| l.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }
        self.run("update_issue", args).await?;
        Ok(())
    }

    async fn close_issue(&self, number: u64, comment: Option<&str>) -> Result<(), TrackerError> {
        let mut args = vec!["issue".to_owned(), "close".to_owned(), number.to_string()];
        if let Some(comment) = comment {
            args.push("--comment".to_owned());
            args.push(comment.to_owned());
        }
        self.run("close_issue", args).await?;
        Ok(())
    }

    async fn list_issues(&self) -> Result<Vec<RemoteIssue>, TrackerError> {
        let stdout = self
            .run(
                "list_issues",
                vec![
                    "issue".to_owned(),
                    "list".to_owned(),
                    "--state".to_owned(),
                    "all".to_owned(),
                    "--json".to_owned(),
                    ISSUE_JSON_FIELDS.to_owned(),
                    "--limit".to_owned(),
                    "500".to_owned(),
                ],
            )
            .await?;
        let issues: Vec<GhIssue> =
            serde_json::from_str(&stdout).map_err(|e| TrackerError::Parse {
                op: "list_issues",
                message: e.to_string(),
            })?;
        issues
            .into_iter()
            .map(|i| i.into_remote("list_issues"))
            .collect()
    }

    async fn get_issue(&self, number: u64) -> Result<RemoteIssue, TrackerError> {
        let stdout = self
            .run(
                "get_issue",
                vec![
                    "issue".to_owned(),
                    "view".to_owned(),
                    number.to_string(),
                    "--json".to_owned(),
                    ISSUE_JSON_FIELDS.to_owned(),
                ],
            )
            .await?;
        let issue: GhIssue = serde_json::from_str(&stdout).map_err(|e| TrackerError::Parse {
            op: "get_issue",
            message: e.to_string(),
        })?;
        issue.into_remote("get_issue")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_number_parses_from_create_url() {
        let url = "https://github.com/acme/widgets/issues/42\n";
        assert_eq!(issue_number_from_url(url).unwrap(), 42);
    }

    #[test]
    fn issue_number_rejects_garbage() {
        assert!(issue_number_from_url("no url here").is_err());
    }

    #[test]
    fn gh_issue_state_parsing() {
        let issue = GhIssue {
            number: 1,
            title: "t".to_owned(),
            body: "b".to_owned(),
            labels: vec![GhLabel {
                name: "status:pending".to_owned(),
            }],
            state: "OPEN".to_owned(),
        };
        let remote = issue.into_remote("test").unwrap();
        assert_eq!(remote.state, IssueState::Open);
        assert_eq!(remote.labels, vec!["status:pending"]);

        let closed = GhIssue {
            number: 2,
            title: String::new(),
            body: String::new(),
            labels: vec![],
            state: "closed".to_owned(),
        };
        assert_eq!(closed.into_remote("test").unwrap().state, IssueState::Closed);
    }

    #[tokio::test]
    async fn failing_binary_surfaces_command_error() {
        let tracker = GhTracker::with_binary("false");
        let err = tracker.list_issues().await.unwrap_err();
        assert!(matches!(err, TrackerError::Command { .. }));
    }

    #[tokio::test]
    async fn missing_binary_surfaces_spawn_error() {
        let tracker = GhTracker::with_binary("/nonexistent/gh-binary");
        let err = tracker.get_issue(1).await.unwrap_err();
        assert!(matches!(err, TrackerError::Spawn { .. }));
    }
}
