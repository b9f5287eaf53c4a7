//! Commands flowing through the context and out through the bridges.

use super::support::{eventually, path, RecordingClient};
use firebridge::config::HarnessConfig;
use firebridge::context::{Query, Target, Topic};
use firebridge::domain::{Command, CommandEnvelope};
use firebridge::store::{ChildEvent, RemoteStoreClient};
use firebridge::types::{ProjectId, TaskId, UserId};
use firebridge::Application;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

fn app() -> (Application, Arc<RecordingClient>) {
    let recorder = RecordingClient::new();
    (
        Application::with_store(HarnessConfig::default(), recorder.clone()),
        recorder,
    )
}

fn post(app: &Application, command: Command) {
    let ack = app.context().post(CommandEnvelope::new(command));
    assert!(ack.is_ok(), "command rejected: {:?}", ack.status);
}

fn create_task(app: &Application, id: &str, assignee: Option<&str>, project: Option<&str>) {
    post(
        app,
        Command::CreateTask {
            id: TaskId::new(id),
            name: format!("task {}", id),
            description: String::new(),
            assignee: assignee.map(UserId::from),
            project: project.map(ProjectId::from),
        },
    );
}

#[tokio::test]
async fn reassignment_moves_task_between_users() {
    let (app, recorder) = app();
    let handle = app
        .subscriptions()
        .subscribe(Topic {
            target: Target::UserTasks,
            ids: Some(vec!["ann".to_string(), "bob".to_string()]),
        })
        .await
        .unwrap();

    create_task(&app, "t1", Some("ann"), None);
    post(
        &app,
        Command::ReassignTask {
            id: TaskId::new("t1"),
            new_assignee: UserId::new("bob"),
        },
    );

    let bob = handle.path.child("bob").unwrap();
    let bob_tasks = eventually(|| {
        let recorder = Arc::clone(&recorder);
        let bob = bob.clone();
        async move {
            let node = recorder.inner.fetch_node(&bob).await.unwrap()?;
            Some(node.into_json()["tasks"].clone())
        }
    })
    .await;
    assert_eq!(bob_tasks, json!(["t1"]));

    let ann = handle.path.child("ann").unwrap();
    let ann_tasks = eventually(|| {
        let recorder = Arc::clone(&recorder);
        let ann = ann.clone();
        async move {
            let node = recorder.inner.fetch_node(&ann).await.unwrap()?;
            let tasks = node.into_json()["tasks"].clone();
            (tasks == json!([])).then_some(tasks)
        }
    })
    .await;
    assert_eq!(ann_tasks, json!([]));

    app.shutdown().await;
    assert!(recorder.inner.is_empty());
}

#[tokio::test]
async fn unassigned_task_reaches_no_user() {
    let (app, _) = app();
    create_task(&app, "t1", None, None);

    let users = app.context().query(&Query::all(Target::UserTasks)).unwrap();
    assert!(users.entities.is_empty());
    let tasks = app.context().query(&Query::all(Target::Task)).unwrap();
    assert_eq!(tasks.entities.len(), 1);
    assert_eq!(tasks.entities[0].state["assignee"], Value::Null);
}

#[tokio::test]
async fn project_completes_when_every_task_does() {
    let (app, recorder) = app();
    post(
        &app,
        Command::CreateProject {
            id: ProjectId::new("p1"),
            name: "launch".to_string(),
        },
    );
    create_task(&app, "t1", Some("ann"), Some("p1"));
    create_task(&app, "t2", Some("bob"), Some("p1"));
    post(&app, Command::CompleteTask { id: TaskId::new("t1") });

    let response = app
        .queries()
        .send(&Query::all(Target::ProjectProgress))
        .await
        .unwrap();
    let written = recorder.inner.fetch_node(&response.path).await.unwrap().unwrap();
    assert_eq!(written.as_json()[0]["state"]["status"], "IN_PROGRESS");

    post(&app, Command::CompleteTask { id: TaskId::new("t2") });
    let progress = app
        .context()
        .query(&Query::all(Target::ProjectProgress))
        .unwrap();
    assert_eq!(progress.entities[0].state["status"], "COMPLETED");
    assert_eq!(progress.entities[0].state["completed_tasks"], 2);

    let report = app.shutdown().await;
    assert_eq!(report.failed, 0);
    assert!(recorder.delete_calls().contains(&response.path));
}

#[tokio::test]
async fn store_listeners_see_subscription_writes() {
    let (app, recorder) = app();
    let handle = app
        .subscriptions()
        .subscribe(Topic {
            target: Target::Task,
            ids: None,
        })
        .await
        .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    recorder
        .subscribe_to(
            &handle.path,
            Arc::new(move |event: ChildEvent| sink.lock().push(event.key().to_string())),
        )
        .await
        .unwrap();

    create_task(&app, "t9", None, None);
    eventually(|| {
        let seen = Arc::clone(&seen);
        async move { seen.lock().contains(&"t9".to_string()).then_some(()) }
    })
    .await;

    app.subscriptions().cancel(&handle.id).await.unwrap();
    assert!(recorder.inner.fetch_node(&handle.path).await.unwrap().is_none());
    assert!(!app.store().is_tracked(&path(&format!("subscriptions/{}", handle.id))));
}
