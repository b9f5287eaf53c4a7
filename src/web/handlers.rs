//! Route handlers.

use super::codec::{MessageFormat, REVERSED_JSON};
use super::error::ApiResult;
use crate::app::Application;
use crate::context::{Query, Topic};
use crate::domain::CommandEnvelope;
use crate::error::ApiError;
use crate::types::SubscriptionId;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

type AppState = State<Arc<Application>>;

/// Body of keep-up and cancel requests.
#[derive(Debug, Deserialize)]
pub(super) struct SubscriptionRef {
    id: SubscriptionId,
}

fn reply<T: Serialize>(format: MessageFormat, value: &T) -> ApiResult<Response> {
    let body = format.encode(value)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, format.content_type())],
        body,
    )
        .into_response())
}

pub(super) async fn post_command(State(app): AppState, body: Bytes) -> ApiResult<Response> {
    let envelope: CommandEnvelope = MessageFormat::Json.decode(&body)?;
    let ack = app.context().post(envelope);
    reply(MessageFormat::Json, &ack)
}

pub(super) async fn post_reversed_command(
    State(app): AppState,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with(REVERSED_JSON) {
        return Err(ApiError::InvalidMessage(format!(
            "Expected content type {}, got {:?}",
            REVERSED_JSON, content_type
        )));
    }
    let envelope: CommandEnvelope = MessageFormat::ReversedJson.decode(&body)?;
    let ack = app.context().post(envelope);
    reply(MessageFormat::ReversedJson, &ack)
}

pub(super) async fn post_query(State(app): AppState, body: Bytes) -> ApiResult<Response> {
    let query: Query = MessageFormat::Json.decode(&body)?;
    let response = app.queries().send(&query).await?;
    reply(MessageFormat::Json, &response)
}

pub(super) async fn create_subscription(
    State(app): AppState,
    body: Bytes,
) -> ApiResult<Response> {
    let topic: Topic = MessageFormat::Json.decode(&body)?;
    let handle = app.subscriptions().subscribe(topic).await?;
    reply(MessageFormat::Json, &handle)
}

pub(super) async fn keep_up_subscription(
    State(app): AppState,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let request: SubscriptionRef = MessageFormat::Json.decode(&body)?;
    app.subscriptions().keep_up(&request.id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn cancel_subscription(
    State(app): AppState,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let request: SubscriptionRef = MessageFormat::Json.decode(&body)?;
    app.subscriptions().cancel(&request.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
