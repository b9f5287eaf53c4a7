//! HTTP routes driven through `tower::ServiceExt::oneshot`.

use super::support::RecordingClient;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use firebridge::config::HarnessConfig;
use firebridge::store::{NodePath, RemoteStoreClient};
use firebridge::web::{self, ErrorBody, REVERSED_JSON};
use firebridge::Application;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn router() -> (Router, Arc<Application>, Arc<RecordingClient>) {
    let recorder = RecordingClient::new();
    let app = Arc::new(Application::with_store(
        HarnessConfig::default(),
        recorder.clone(),
    ));
    (web::router(Arc::clone(&app)), app, recorder)
}

fn post(uri: &str, content_type: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body.into()))
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    post(uri, "application/json", body.to_string())
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn reversed(text: &str) -> String {
    text.chars().rev().collect()
}

#[tokio::test]
async fn command_returns_ack() {
    let (router, _, _) = router();
    let response = router
        .oneshot(post_json(
            "/command",
            json!({"id": "c1", "message": {"type": "CreateTask", "id": "t1", "name": "ship"}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let ack: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(ack["command_id"], "c1");
    assert_eq!(ack["status"]["kind"], "ok");
    assert_eq!(ack["events"][0]["type"], "TaskCreated");
}

#[tokio::test]
async fn rejected_command_is_reported_in_ack() {
    let (router, _, _) = router();
    let response = router
        .oneshot(post_json(
            "/command",
            json!({"message": {"type": "CompleteTask", "id": "missing"}}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let ack: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(ack["status"]["kind"], "rejected");
}

#[tokio::test]
async fn reversed_json_command_round_trips() {
    let (router, app, _) = router();
    let envelope = json!({
        "id": "c7",
        "message": {"type": "CreateTask", "id": "t7", "name": "reverse me", "assignee": "ann"}
    });
    let response = router
        .oneshot(post(
            "/reverse-json-command",
            REVERSED_JSON,
            reversed(&envelope.to_string()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        REVERSED_JSON
    );
    let ack: Value = serde_json::from_str(&reversed(&body_text(response).await)).unwrap();
    assert_eq!(ack["command_id"], "c7");
    assert_eq!(ack["status"]["kind"], "ok");

    let users = app
        .context()
        .query(&firebridge::context::Query::all(
            firebridge::context::Target::UserTasks,
        ))
        .unwrap();
    assert_eq!(users.entities[0].id, "ann");
}

#[tokio::test]
async fn reversed_json_garbage_is_bad_request() {
    let (router, _, _) = router();
    let response = router
        .oneshot(post("/reverse-json-command", REVERSED_JSON, "}{ not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body.code, 400);
}

#[tokio::test]
async fn reversed_route_requires_its_content_type() {
    let (router, _, _) = router();
    let response = router
        .oneshot(post_json(
            "/reverse-json-command",
            json!({"message": {"type": "CompleteTask", "id": "t1"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn query_writes_result_to_store() {
    let (router, app, recorder) = router();
    app.context()
        .post(firebridge::domain::CommandEnvelope::new(
            firebridge::domain::Command::CreateTask {
                id: "t1".into(),
                name: "ship".to_string(),
                description: String::new(),
                assignee: None,
                project: None,
            },
        ));

    let response = router
        .oneshot(post_json("/query", json!({"target": "Task"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["count"], 1);
    let written_at = NodePath::new(body["path"].as_str().unwrap()).unwrap();
    let written = recorder.inner.fetch_node(&written_at).await.unwrap().unwrap();
    assert_eq!(written.as_json()[0]["id"], "t1");
}

#[tokio::test]
async fn subscription_lifecycle() {
    let (router, _, recorder) = router();

    let response = router
        .clone()
        .oneshot(post_json("/subscription/create", json!({"target": "UserTasks"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let handle: Value = serde_json::from_str(&body_text(response).await).unwrap();
    let id = handle["id"].as_str().unwrap().to_string();

    let response = router
        .clone()
        .oneshot(post_json("/subscription/keep-up", json!({"id": id})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router
        .clone()
        .oneshot(post_json("/subscription/cancel", json!({"id": id})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(recorder
        .delete_calls()
        .iter()
        .any(|deleted| deleted.as_str() == format!("subscriptions/{}", id)));

    let response = router
        .oneshot(post_json("/subscription/keep-up", json!({"id": id})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body.code, 404);
}

#[tokio::test]
async fn malformed_query_is_bad_request() {
    let (router, _, _) = router();
    let response = router
        .oneshot(post_json("/query", json!({"target": "Nope"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
