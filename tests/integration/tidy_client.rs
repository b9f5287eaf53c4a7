//! Write tracking and teardown of `TidyClient`.

use super::support::{eventually, path, value, RecordingClient};
use firebridge::config::HarnessConfig;
use firebridge::context::{Target, Topic};
use firebridge::domain::{Command, CommandEnvelope};
use firebridge::store::{ChildEvent, CleanupReport, NodePath, RemoteStoreClient, TidyClient};
use firebridge::types::{TaskId, UserId};
use firebridge::Application;
use proptest::prelude::*;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Create(usize),
    Update(usize),
    Delete(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..6).prop_map(Op::Create),
        (0usize..6).prop_map(Op::Update),
        (0usize..6).prop_map(Op::Delete),
    ]
}

fn slot(index: usize) -> NodePath {
    path(&format!("runs/slot{}", index))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Tracked paths are the written paths minus the deleted ones, and
    /// teardown deletes each of them exactly once.
    #[test]
    fn prop_tracking_follows_writes_and_deletes(ops in proptest::collection::vec(arb_op(), 0..40)) {
        runtime().block_on(async {
            let recorder = RecordingClient::new();
            let client = TidyClient::new(recorder.clone());
            let mut expected = HashSet::new();

            for op in &ops {
                match op {
                    Op::Create(i) => {
                        client.create(&slot(*i), value(json!({"n": i}))).await.unwrap();
                        expected.insert(slot(*i));
                    }
                    Op::Update(i) => {
                        client.update(&slot(*i), value(json!({"m": i}))).await.unwrap();
                        expected.insert(slot(*i));
                    }
                    Op::Delete(i) => {
                        client.delete(&slot(*i)).await.unwrap();
                        expected.remove(&slot(*i));
                    }
                }
            }
            prop_assert_eq!(client.tracked_paths(), expected.clone());

            let before = recorder.delete_calls().len();
            let report = client.teardown().await;
            let torn: Vec<NodePath> = recorder.delete_calls()[before..].to_vec();

            prop_assert_eq!(torn.len(), expected.len());
            prop_assert_eq!(torn.into_iter().collect::<HashSet<_>>(), expected.clone());
            prop_assert_eq!(report, CleanupReport { deleted: expected.len(), failed: 0 });
            prop_assert!(recorder.inner.is_empty());
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn delete_untracked_path_stays_untracked() {
    let client = TidyClient::new(RecordingClient::new());
    let stranger = path("never/written");

    client.delete(&stranger).await.unwrap();
    assert!(!client.is_tracked(&stranger));

    client.create(&stranger, value(json!(1))).await.unwrap();
    client.delete(&stranger).await.unwrap();
    assert!(!client.is_tracked(&stranger));
}

#[tokio::test]
async fn reads_never_touch_tracking() {
    let recorder = RecordingClient::new();
    let client = TidyClient::new(recorder.clone());
    let written = path("a/b");
    client.create(&written, value(json!("x"))).await.unwrap();

    client.fetch_node(&path("a/b")).await.unwrap();
    client.fetch_node(&path("elsewhere")).await.unwrap();
    client
        .subscribe_to(&path("watched"), Arc::new(|_: ChildEvent| {}))
        .await
        .unwrap();

    recorder.fail_reads();
    assert!(client.fetch_node(&path("elsewhere")).await.is_err());
    assert!(client
        .subscribe_to(&path("watched"), Arc::new(|_: ChildEvent| {}))
        .await
        .is_err());

    assert_eq!(client.tracked_paths(), HashSet::from([written]));
}

#[tokio::test]
async fn failed_writes_are_not_tracked() {
    let recorder = RecordingClient::new();
    let client = TidyClient::new(recorder.clone());
    let locked = path("locked/node");
    recorder.fail_writes_to(&locked);

    assert!(client.create(&locked, value(json!(1))).await.is_err());
    assert!(client.update(&locked, value(json!({"a": 1}))).await.is_err());
    assert!(client.tracked_paths().is_empty());

    client.teardown().await;
    assert!(recorder.delete_calls().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_are_each_torn_down_once() {
    const N: usize = 64;
    let recorder = RecordingClient::new();
    let client = Arc::new(TidyClient::new(recorder.clone()));

    let mut tasks = Vec::new();
    for i in 0..N {
        let client = Arc::clone(&client);
        tasks.push(tokio::spawn(async move {
            client
                .create(&path(&format!("load/n{}", i)), value(json!(i)))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(client.tracked_paths().len(), N);

    let report = client.teardown().await;
    assert_eq!(report.deleted, N);

    let mut counts: HashMap<NodePath, usize> = HashMap::new();
    for deleted in recorder.delete_calls() {
        *counts.entry(deleted).or_default() += 1;
    }
    assert_eq!(counts.len(), N);
    assert!(counts.values().all(|&count| count == 1));
}

#[tokio::test]
async fn teardown_continues_past_failures_and_runs_once() {
    let recorder = RecordingClient::new();
    let client = TidyClient::new(recorder.clone());
    let stuck = path("t/stuck");
    recorder.fail_deletes_of(&stuck);

    for name in ["t/a", "t/stuck", "t/b"] {
        client.create(&path(name), value(json!(name))).await.unwrap();
    }

    let report = client.teardown().await;
    assert_eq!(report, CleanupReport { deleted: 2, failed: 1 });
    assert_eq!(recorder.delete_calls().len(), 3);
    assert!(client.is_tracked(&stuck));

    let again = client.teardown().await;
    assert_eq!(again, CleanupReport::default());
    assert_eq!(recorder.delete_calls().len(), 3);
}

#[tokio::test]
async fn deleting_a_parent_untracks_its_children() {
    let recorder = RecordingClient::new();
    let client = TidyClient::new(recorder.clone());
    client.create(&path("subs/s1"), value(json!({"a": 1}))).await.unwrap();
    client.create(&path("subs/s1/b"), value(json!(2))).await.unwrap();
    client.create(&path("subs/s1/b/c"), value(json!(3))).await.unwrap();
    client.create(&path("subs/s10"), value(json!(4))).await.unwrap();

    client.delete(&path("subs/s1")).await.unwrap();
    assert_eq!(client.tracked_paths(), HashSet::from([path("subs/s10")]));

    let report = client.teardown().await;
    assert_eq!(report, CleanupReport { deleted: 1, failed: 0 });
    assert_eq!(
        recorder.delete_calls(),
        vec![path("subs/s1"), path("subs/s10")]
    );
}

#[tokio::test]
async fn teardown_skips_children_of_deleted_parents() {
    let recorder = RecordingClient::new();
    let client = TidyClient::new(recorder.clone());
    for name in ["q/a/b", "q/a", "q/a/c"] {
        client.create(&path(name), value(json!(name))).await.unwrap();
    }

    let report = client.teardown().await;
    assert_eq!(report, CleanupReport { deleted: 1, failed: 0 });
    assert_eq!(recorder.delete_calls(), vec![path("q/a")]);
    assert!(recorder.inner.is_empty());
}

#[tokio::test]
async fn cancelled_subscription_leaves_nothing_tracked() {
    let recorder = RecordingClient::new();
    let app = Application::with_store(HarnessConfig::default(), recorder.clone());
    let handle = app
        .subscriptions()
        .subscribe(Topic {
            target: Target::UserTasks,
            ids: None,
        })
        .await
        .unwrap();

    let ack = app.context().post(CommandEnvelope::new(Command::CreateTask {
        id: TaskId::new("t1"),
        name: "ship".to_string(),
        description: String::new(),
        assignee: Some(UserId::new("ann")),
        project: None,
    }));
    assert!(ack.is_ok());
    let entity = handle.path.child("ann").unwrap();
    eventually(|| {
        let store = Arc::clone(app.store());
        let entity = entity.clone();
        async move { store.is_tracked(&entity).then_some(()) }
    })
    .await;

    app.subscriptions().cancel(&handle.id).await.unwrap();
    assert!(app.store().tracked_paths().is_empty());

    let report = app.shutdown().await;
    assert_eq!(report, CleanupReport::default());
    assert_eq!(recorder.delete_calls(), vec![handle.path.clone()]);
}
