//! Priority scoring: five weighted factors, bounded to [0, 100].
//!
//! All functions are pure over scanner output; the only clock input comes
//! through [`ScoreOptions::now`] so tests stay deterministic.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use foreman_store::models::TaskStatus;

use crate::scanner::ScannedTask;

pub const WEIGHT_MATURITY: f64 = 0.20;
pub const WEIGHT_IMPACT: f64 = 0.30;
pub const WEIGHT_DEPENDENCY: f64 = 0.20;
pub const WEIGHT_EFFORT: f64 = 0.15;
pub const WEIGHT_PREFERENCE: f64 = 0.15;

/// Per-factor scores and the combined total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub maturity: f64,
    pub impact: f64,
    pub dependency: f64,
    pub effort: f64,
    pub preference: f64,
    /// Final score; equals `priority_override` verbatim when one is set.
    pub total: f64,
    pub overridden: bool,
}

/// A scanned task paired with its score.
#[derive(Debug, Clone)]
pub struct ScoredTask {
    pub task: ScannedTask,
    pub breakdown: ScoreBreakdown,
}

impl ScoredTask {
    pub fn score(&self) -> f64 {
        self.breakdown.total
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoreOptions {
    /// Label granted the +30 preference bonus.
    pub focus_label: Option<String>,
    /// Keep `completed`/`failed` tasks in batch output.
    pub include_finished: bool,
    /// Clock override; defaults to the wall clock.
    pub now: Option<DateTime<Utc>>,
}

/// Score one task against the merged collection.
pub fn score_task(
    scanned: &ScannedTask,
    all: &[ScannedTask],
    opts: &ScoreOptions,
) -> ScoreBreakdown {
    let index = status_index(all);
    let now = opts.now.unwrap_or_else(Utc::now);
    compute(scanned, all, &index, opts, now)
}

/// Score a batch: filter out finished tasks (unless asked otherwise), score
/// each, and sort best-first.
///
/// Ties break on higher impact, then smaller complexity, then lexicographic
/// task id, so the ordering is total and stable across runs.
pub fn score_tasks(tasks: &[ScannedTask], opts: &ScoreOptions) -> Vec<ScoredTask> {
    let index = status_index(tasks);
    let now = opts.now.unwrap_or_else(Utc::now);

    let mut scored: Vec<ScoredTask> = tasks
        .iter()
        .filter(|t| opts.include_finished || !t.task.status.is_finished())
        .map(|t| ScoredTask {
            breakdown: compute(t, tasks, &index, opts, now),
            task: t.clone(),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.breakdown
            .total
            .partial_cmp(&a.breakdown.total)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.breakdown
                    .impact
                    .partial_cmp(&a.breakdown.impact)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| {
                a.task
                    .task
                    .complexity()
                    .rank()
                    .cmp(&b.task.task.complexity().rank())
            })
            .then_with(|| a.task.task.id.cmp(&b.task.task.id))
    });

    scored
}

fn status_index(tasks: &[ScannedTask]) -> HashMap<&str, TaskStatus> {
    tasks
        .iter()
        .map(|t| (t.task.id.as_str(), t.task.status))
        .collect()
}

fn compute(
    scanned: &ScannedTask,
    all: &[ScannedTask],
    index: &HashMap<&str, TaskStatus>,
    opts: &ScoreOptions,
    now: DateTime<Utc>,
) -> ScoreBreakdown {
    let task = &scanned.task;

    let maturity = scanned.project.status.maturity();
    let impact = impact(scanned, all);
    let dependency = dependency(task.blocked_by.as_slice(), index);
    let effort = impact * task.complexity().multiplier();
    let preference = preference(scanned, opts, now);

    let computed = (WEIGHT_MATURITY * maturity
        + WEIGHT_IMPACT * impact
        + WEIGHT_DEPENDENCY * dependency
        + WEIGHT_EFFORT * effort
        + WEIGHT_PREFERENCE * preference)
        .clamp(0.0, 100.0);

    let (total, overridden) = match task.priority_override {
        Some(value) => (value, true),
        None => (computed, false),
    };

    ScoreBreakdown {
        maturity,
        impact,
        dependency,
        effort,
        preference,
        total,
        overridden,
    }
}

/// Impact: structural completeness plus what finishing the task unlocks,
/// capped at 100.
fn impact(scanned: &ScannedTask, all: &[ScannedTask]) -> f64 {
    let task = &scanned.task;
    let mut points = 0.0;

    if !task.acceptance_criteria().is_empty() {
        points += 20.0;
    }
    if task.description().is_some_and(|d| !d.is_empty()) {
        points += 10.0;
    }
    if task.github_issue.is_some() {
        points += 10.0;
    }
    points += (task.unlocks.len() as f64 * 15.0).min(45.0);

    if let (Some(task_milestone), Some(file_milestone)) = (&task.milestone, &scanned.milestone) {
        if *task_milestone == file_milestone.name {
            points += 15.0;
            let other_open = all.iter().any(|other| {
                other.project_name == scanned.project_name
                    && other.task.id != task.id
                    && other.task.status != TaskStatus::Completed
                    && other.task.milestone.as_deref() == Some(task_milestone.as_str())
            });
            if !other_open {
                points += 25.0;
            }
        }
    }

    for label in &task.labels {
        points += match label.as_str() {
            "bugfix" | "test" => 10.0,
            "feature" | "infra" => 5.0,
            _ => 0.0,
        };
    }

    points.min(100.0)
}

/// Dependency: 100 when unblocked, 50 when only waiting on running work,
/// 0 when anything upstream is unresolved or not moving.
///
/// A blocker in `failed` status gates like `pending`/`blocked`: the task is
/// not actionable until the blocker is retried.
fn dependency(blocked_by: &[String], index: &HashMap<&str, TaskStatus>) -> f64 {
    if blocked_by.is_empty() {
        return 100.0;
    }

    let mut any_in_progress = false;
    for id in blocked_by {
        match index.get(id.as_str()) {
            None => return 0.0,
            Some(TaskStatus::Pending | TaskStatus::Blocked | TaskStatus::Failed) => return 0.0,
            Some(TaskStatus::InProgress) => any_in_progress = true,
            Some(TaskStatus::Completed) => {}
        }
    }

    if any_in_progress { 50.0 } else { 100.0 }
}

fn preference(scanned: &ScannedTask, opts: &ScoreOptions, now: DateTime<Utc>) -> f64 {
    let mut points = 50.0;
    if let Some(created) = scanned.task.created_at {
        if now.signed_duration_since(created) <= Duration::hours(24) {
            points += 20.0;
        }
    }
    if let Some(focus) = &opts.focus_label {
        if scanned.task.labels.iter().any(|l| l == focus) {
            points += 30.0;
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_store::models::{Project, ProjectStatus, Task};
    use serde_json::json;

    fn project(status: ProjectStatus) -> Project {
        serde_json::from_value(json!({
            "name": "app",
            "path": "app",
            "status": status.as_str(),
        }))
        .unwrap()
    }

    fn scanned(task: serde_json::Value, status: ProjectStatus) -> ScannedTask {
        let task: Task = serde_json::from_value(task).unwrap();
        ScannedTask {
            task,
            project: project(status.clone()),
            project_name: "app".to_owned(),
            milestone: None,
        }
    }

    fn opts_at(now: DateTime<Utc>) -> ScoreOptions {
        ScoreOptions {
            now: Some(now),
            ..ScoreOptions::default()
        }
    }

    #[test]
    fn verification_example_fresh_small_task() {
        // near-buildable project, S, no blockers, 2 unlocks, description +
        // acceptance criteria + github issue, created just now => 78.00.
        let now = Utc::now();
        let task = scanned(
            json!({
                "id": "app/fresh",
                "title": "Fresh",
                "status": "pending",
                "complexity": "S",
                "unlocks": ["app/a", "app/b"],
                "feature": {
                    "description": "f",
                    "acceptance_criteria": ["c1", "c2"]
                },
                "github_issue": "gh#1",
                "created_at": now.to_rfc3339(),
            }),
            ProjectStatus::NearBuildable,
        );

        let breakdown = score_task(&task, std::slice::from_ref(&task), &opts_at(now));
        assert_eq!(breakdown.maturity, 80.0);
        assert_eq!(breakdown.impact, 70.0);
        assert_eq!(breakdown.dependency, 100.0);
        assert_eq!(breakdown.effort, 70.0);
        assert_eq!(breakdown.preference, 70.0);
        assert!((breakdown.total - 78.0).abs() < 0.01, "{}", breakdown.total);
    }

    #[test]
    fn verification_example_stale_blocked_task() {
        // blocked project, XL, one unresolved blocker, description only,
        // old created_at => 12.95.
        let now = Utc::now();
        let task = scanned(
            json!({
                "id": "app/stale",
                "title": "Stale",
                "status": "pending",
                "complexity": "XL",
                "blocked_by": ["app/missing"],
                "feature": { "description": "d" },
                "created_at": (now - Duration::days(30)).to_rfc3339(),
            }),
            ProjectStatus::Blocked,
        );

        let breakdown = score_task(&task, std::slice::from_ref(&task), &opts_at(now));
        assert_eq!(breakdown.maturity, 10.0);
        assert_eq!(breakdown.impact, 10.0);
        assert_eq!(breakdown.dependency, 0.0);
        assert!((breakdown.effort - 3.0).abs() < 1e-9);
        assert_eq!(breakdown.preference, 50.0);
        assert!((breakdown.total - 12.95).abs() < 0.01, "{}", breakdown.total);
    }

    #[test]
    fn scores_stay_within_bounds() {
        let now = Utc::now();
        let task = scanned(
            json!({
                "id": "app/maxed",
                "title": "Maxed",
                "status": "pending",
                "complexity": "S",
                "unlocks": ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"],
                "labels": ["bugfix", "test", "feature", "infra"],
                "feature": {
                    "description": "d",
                    "acceptance_criteria": ["c"]
                },
                "github_issue": "gh#9",
                "created_at": now.to_rfc3339(),
            }),
            ProjectStatus::Buildable,
        );

        let mut opts = opts_at(now);
        opts.focus_label = Some("bugfix".to_owned());
        let breakdown = score_task(&task, std::slice::from_ref(&task), &opts);
        assert!(breakdown.total <= 100.0);
        assert!(breakdown.total >= 0.0);
        assert!(breakdown.impact <= 100.0);
        assert_eq!(breakdown.preference, 100.0);
    }

    #[test]
    fn unlocks_bonus_caps_at_45() {
        let ten: Vec<String> = (0..10).map(|i| format!("app/u{i}")).collect();
        let three: Vec<String> = (0..3).map(|i| format!("app/u{i}")).collect();
        let with_ten = scanned(
            json!({ "id": "app/x", "title": "X", "status": "pending", "unlocks": ten }),
            ProjectStatus::Buildable,
        );
        let with_three = scanned(
            json!({ "id": "app/y", "title": "Y", "status": "pending", "unlocks": three }),
            ProjectStatus::Buildable,
        );
        let a = score_task(&with_ten, std::slice::from_ref(&with_ten), &ScoreOptions::default());
        let b = score_task(
            &with_three,
            std::slice::from_ref(&with_three),
            &ScoreOptions::default(),
        );
        assert_eq!(a.impact, 45.0);
        assert_eq!(b.impact, 45.0);
    }

    #[test]
    fn override_replaces_computed_score_verbatim() {
        let task = scanned(
            json!({
                "id": "app/pinned",
                "title": "Pinned",
                "status": "pending",
                "priority_override": 83.5,
            }),
            ProjectStatus::Scaffolding,
        );
        let breakdown = score_task(&task, std::slice::from_ref(&task), &ScoreOptions::default());
        assert!(breakdown.overridden);
        assert_eq!(breakdown.total, 83.5);
    }

    #[test]
    fn dependency_factor_cases() {
        let make = |id: &str, status: &str, blocked_by: serde_json::Value| {
            scanned(
                json!({ "id": id, "title": id, "status": status, "blocked_by": blocked_by }),
                ProjectStatus::Buildable,
            )
        };

        // Unresolved blocker => 0.
        let all = vec![make("app/a", "pending", json!(["app/ghost"]))];
        assert_eq!(score_task(&all[0], &all, &ScoreOptions::default()).dependency, 0.0);

        // All blockers completed => 100.
        let all = vec![
            make("app/a", "pending", json!(["app/b"])),
            make("app/b", "completed", json!([])),
        ];
        assert_eq!(score_task(&all[0], &all, &ScoreOptions::default()).dependency, 100.0);

        // Non-completed blockers all in progress => 50.
        let all = vec![
            make("app/a", "pending", json!(["app/b", "app/c"])),
            make("app/b", "in_progress", json!([])),
            make("app/c", "completed", json!([])),
        ];
        assert_eq!(score_task(&all[0], &all, &ScoreOptions::default()).dependency, 50.0);

        // A pending blocker gates hard => 0.
        let all = vec![
            make("app/a", "pending", json!(["app/b"])),
            make("app/b", "pending", json!([])),
        ];
        assert_eq!(score_task(&all[0], &all, &ScoreOptions::default()).dependency, 0.0);

        // A failed blocker gates hard => 0.
        let all = vec![
            make("app/a", "pending", json!(["app/b"])),
            make("app/b", "failed", json!([])),
        ];
        assert_eq!(score_task(&all[0], &all, &ScoreOptions::default()).dependency, 0.0);
    }

    #[test]
    fn milestone_last_blocker_bonus() {
        let milestone = Some(foreman_store::models::Milestone {
            name: "v1".to_owned(),
            target_date: None,
        });
        let mut closer = scanned(
            json!({ "id": "app/closer", "title": "C", "status": "pending", "milestone": "v1" }),
            ProjectStatus::Buildable,
        );
        closer.milestone = milestone.clone();
        let mut sibling = scanned(
            json!({ "id": "app/sibling", "title": "S", "status": "completed", "milestone": "v1" }),
            ProjectStatus::Buildable,
        );
        sibling.milestone = milestone.clone();

        // Only completed siblings share the milestone: +15 +25.
        let all = vec![closer.clone(), sibling.clone()];
        assert_eq!(score_task(&closer, &all, &ScoreOptions::default()).impact, 40.0);

        // An open sibling removes the last-blocker bonus: +15 only.
        let mut open_sibling = sibling.clone();
        open_sibling.task.status = TaskStatus::Pending;
        let all = vec![closer.clone(), open_sibling];
        assert_eq!(score_task(&closer, &all, &ScoreOptions::default()).impact, 15.0);
    }

    #[test]
    fn batch_filters_finished_and_sorts_descending() {
        let tasks = vec![
            scanned(
                json!({ "id": "app/low", "title": "L", "status": "pending" }),
                ProjectStatus::Scaffolding,
            ),
            scanned(
                json!({ "id": "app/high", "title": "H", "status": "pending",
                        "feature": { "description": "d", "acceptance_criteria": ["c"] } }),
                ProjectStatus::Buildable,
            ),
            scanned(
                json!({ "id": "app/done", "title": "D", "status": "completed" }),
                ProjectStatus::Buildable,
            ),
            scanned(
                json!({ "id": "app/dead", "title": "F", "status": "failed" }),
                ProjectStatus::Buildable,
            ),
        ];

        let scored = score_tasks(&tasks, &ScoreOptions::default());
        let ids: Vec<_> = scored.iter().map(|s| s.task.id()).collect();
        assert_eq!(ids, vec!["app/high", "app/low"]);
        assert!(scored[0].score() >= scored[1].score());

        let with_finished = score_tasks(
            &tasks,
            &ScoreOptions {
                include_finished: true,
                ..ScoreOptions::default()
            },
        );
        assert_eq!(with_finished.len(), 4);
    }

    #[test]
    fn ties_break_on_impact_then_complexity_then_id() {
        // Same total score by construction: identical tasks except for the
        // tie-break inputs.
        let a = scanned(
            json!({ "id": "app/b-task", "title": "B", "status": "pending", "complexity": "L" }),
            ProjectStatus::Buildable,
        );
        let b = scanned(
            json!({ "id": "app/a-task", "title": "A", "status": "pending", "complexity": "S" }),
            ProjectStatus::Buildable,
        );
        let scored = score_tasks(&[a, b], &ScoreOptions::default());
        // Zero impact for both, so complexity decides: S before L.
        assert_eq!(scored[0].task.id(), "app/a-task");

        let c = scanned(
            json!({ "id": "app/zz", "title": "Z", "status": "pending" }),
            ProjectStatus::Buildable,
        );
        let d = scanned(
            json!({ "id": "app/aa", "title": "A", "status": "pending" }),
            ProjectStatus::Buildable,
        );
        let scored = score_tasks(&[c, d], &ScoreOptions::default());
        assert_eq!(scored[0].task.id(), "app/aa");
    }

    #[test]
    fn scoring_is_idempotent() {
        let now = Utc::now();
        let task = scanned(
            json!({
                "id": "app/same",
                "title": "Same",
                "status": "pending",
                "feature": { "description": "d" },
                "created_at": now.to_rfc3339(),
            }),
            ProjectStatus::Buildable,
        );
        let first = score_task(&task, std::slice::from_ref(&task), &opts_at(now));
        let second = score_task(&task, std::slice::from_ref(&task), &opts_at(now));
        assert_eq!(first, second);
    }
}
