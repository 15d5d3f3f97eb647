//! Integration tests for the status journal: history chaining, the
//! exactly-one-worker guard, surgical writes, and worker completion.

use serde_json::json;

use foreman_store::StoreError;
use foreman_store::journal::UpdateOptions;
use foreman_store::models::TaskStatus;
use foreman_test_utils::{TestWorkspace, pending_task, single_task_file};

fn workspace_with_task() -> TestWorkspace {
    let ws = TestWorkspace::new();
    ws.write_registry(&[TestWorkspace::project("app", "app", "buildable")]);
    ws.write_task_file(
        "app",
        &single_task_file("app", pending_task("app/build-widget", "Build the widget")),
    );
    ws
}

#[tokio::test]
async fn update_appends_history_and_updates_status() {
    let ws = workspace_with_task();
    let journal = ws.journal();

    let task = journal
        .update_task_status("app/build-widget", TaskStatus::InProgress, UpdateOptions::default())
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.history.len(), 1);
    assert_eq!(task.history[0].from_status, TaskStatus::Pending);
    assert_eq!(task.history[0].to_status, TaskStatus::InProgress);
    assert!(task.updated_at.is_some());

    let task = journal
        .update_task_status(
            "app/build-widget",
            TaskStatus::Completed,
            UpdateOptions {
                summary: Some("all done".to_owned()),
            },
        )
        .await
        .unwrap();

    assert_eq!(task.history.len(), 2);
    assert_eq!(task.history[1].from_status, TaskStatus::InProgress);
    assert_eq!(task.history[1].to_status, TaskStatus::Completed);
    assert_eq!(task.history[1].agent_summary.as_deref(), Some("all done"));
    assert!(task.history[0].timestamp <= task.history[1].timestamp);
    assert_eq!(task.status, task.history[1].to_status);
}

#[tokio::test]
async fn double_in_progress_is_rejected() {
    let ws = workspace_with_task();
    let journal = ws.journal();

    journal
        .update_task_status("app/build-widget", TaskStatus::InProgress, UpdateOptions::default())
        .await
        .unwrap();

    let err = journal
        .update_task_status("app/build-widget", TaskStatus::InProgress, UpdateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::TaskAlreadyRunning { .. }));

    // The guard left no trace in the file.
    let task = journal.get_task("app/build-widget").await.unwrap();
    assert_eq!(task.history.len(), 1);
}

#[tokio::test]
async fn unknown_task_is_task_not_found() {
    let ws = workspace_with_task();
    let journal = ws.journal();

    for id in ["app/nope", "ghost/task", "malformed-id"] {
        let err = journal
            .update_task_status(id, TaskStatus::Completed, UpdateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound { .. }), "id: {id}");
    }
}

#[tokio::test]
async fn update_preserves_unknown_fields_and_siblings() {
    let ws = TestWorkspace::new();
    ws.write_registry(&[TestWorkspace::project("app", "app", "buildable")]);
    ws.write_task_file(
        "app",
        &json!({
            "version": 1,
            "project": "app",
            "sprint": "2026-08",
            "tasks": [
                {
                    "id": "app/target",
                    "title": "Target",
                    "status": "pending",
                    "reviewer": "sam"
                },
                {
                    // Invalid for this version; the journal must not drop it.
                    "id": "app/from-the-future",
                    "status": "quantum"
                }
            ]
        }),
    );

    let journal = ws.journal();
    journal
        .update_task_status("app/target", TaskStatus::InProgress, UpdateOptions::default())
        .await
        .unwrap();

    let on_disk = ws.read_task_file("app");
    assert_eq!(on_disk["sprint"], json!("2026-08"));
    assert_eq!(on_disk["tasks"][0]["reviewer"], json!("sam"));
    assert_eq!(on_disk["tasks"][0]["status"], json!("in_progress"));
    assert_eq!(on_disk["tasks"][1]["status"], json!("quantum"));
}

#[tokio::test]
async fn watch_worker_completion_records_success() {
    let ws = workspace_with_task();
    let journal = ws.journal();
    journal
        .update_task_status("app/build-widget", TaskStatus::InProgress, UpdateOptions::default())
        .await
        .unwrap();

    let mut child = tokio::process::Command::new("sh")
        .args(["-c", "exit 0"])
        .spawn()
        .unwrap();
    let code = journal
        .watch_worker_completion("app/build-widget", &mut child, None)
        .await
        .unwrap();

    assert_eq!(code, 0);
    let task = journal.get_task("app/build-widget").await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
}

#[tokio::test]
async fn watch_worker_completion_records_failure_with_summary() {
    let ws = workspace_with_task();
    let journal = ws.journal();
    journal
        .update_task_status("app/build-widget", TaskStatus::InProgress, UpdateOptions::default())
        .await
        .unwrap();

    let mut child = tokio::process::Command::new("sh")
        .args(["-c", "exit 3"])
        .spawn()
        .unwrap();
    let code = journal
        .watch_worker_completion("app/build-widget", &mut child, Some("boom"))
        .await
        .unwrap();

    assert_eq!(code, 3);
    let task = journal.get_task("app/build-widget").await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    let summary = task.history.last().unwrap().agent_summary.clone().unwrap();
    assert!(summary.contains("code 3"), "summary: {summary}");
    assert!(summary.contains("boom"), "summary: {summary}");
}

#[tokio::test]
async fn concurrent_updates_serialize_through_the_file_lock() {
    let ws = TestWorkspace::new();
    ws.write_registry(&[TestWorkspace::project("app", "app", "buildable")]);
    ws.write_task_file(
        "app",
        &json!({
            "version": 1,
            "project": "app",
            "tasks": [
                pending_task("app/a", "A"),
                pending_task("app/b", "B"),
                pending_task("app/c", "C"),
                pending_task("app/d", "D")
            ]
        }),
    );

    let journal = ws.journal();
    let mut handles = Vec::new();
    for id in ["app/a", "app/b", "app/c", "app/d"] {
        let journal = journal.clone();
        handles.push(tokio::spawn(async move {
            journal
                .update_task_status(id, TaskStatus::Blocked, UpdateOptions::default())
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Every update survived the concurrent read-modify-write cycles.
    for id in ["app/a", "app/b", "app/c", "app/d"] {
        let task = journal.get_task(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Blocked, "task: {id}");
        assert_eq!(task.history.len(), 1, "task: {id}");
    }
}
