//! Fixed, reversible label mappings between task state and tracker labels.

use foreman_store::models::{Complexity, TaskStatus};

/// `status:<s>` label for a task status.
pub fn status_label(status: TaskStatus) -> String {
    let name = match status {
        TaskStatus::Pending => "pending",
        TaskStatus::InProgress => "in-progress",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
        TaskStatus::Blocked => "blocked",
    };
    format!("status:{name}")
}

/// Inverse of [`status_label`].
pub fn parse_status_label(label: &str) -> Option<TaskStatus> {
    match label {
        "status:pending" => Some(TaskStatus::Pending),
        "status:in-progress" => Some(TaskStatus::InProgress),
        "status:completed" => Some(TaskStatus::Completed),
        "status:failed" => Some(TaskStatus::Failed),
        "status:blocked" => Some(TaskStatus::Blocked),
        _ => None,
    }
}

/// `size:<c>` label for a complexity. Unknown complexities carry the
/// default bucket.
pub fn size_label(complexity: &Complexity) -> String {
    let name = match complexity {
        Complexity::S => "small",
        Complexity::M | Complexity::Other(_) => "medium",
        Complexity::L => "large",
        Complexity::Xl => "xlarge",
    };
    format!("size:{name}")
}

/// Inverse of [`size_label`].
pub fn parse_size_label(label: &str) -> Option<Complexity> {
    match label {
        "size:small" => Some(Complexity::S),
        "size:medium" => Some(Complexity::M),
        "size:large" => Some(Complexity::L),
        "size:xlarge" => Some(Complexity::Xl),
        _ => None,
    }
}

/// First status label found in an issue's label set.
pub fn status_from_labels(labels: &[String]) -> Option<TaskStatus> {
    labels.iter().find_map(|l| parse_status_label(l))
}

/// Whether a label is owned (written and rewritten) by the bridge.
pub fn is_bridge_label(label: &str) -> bool {
    label.starts_with("status:") || label.starts_with("size:")
}
