//! REST client for the remote real-time database.
//!
//! Nodes are addressed as `{database_url}/{path}.json`. Reads are `GET`,
//! `create` is `PUT`, `update` is `PATCH` and `delete` is `DELETE`. Listening
//! uses the streaming endpoint (`Accept: text/event-stream`), whose `put` and
//! `patch` events are folded into a local copy of the node and diffed into
//! child events.

use super::tree::{diff_children, prune, set};
use super::{ChildEvent, ChildEventListener, NodePath, NodeValue, RemoteStoreClient};
use crate::error::StoreError;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Store client speaking the database REST API.
pub struct RestStoreClient {
    http: reqwest::Client,
    database_url: String,
    auth_token: Option<String>,
    streams: Mutex<Vec<JoinHandle<()>>>,
}

impl RestStoreClient {
    /// Create a client for `database_url`, authenticating with `auth_token` when set.
    pub fn new(
        database_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let database_url = database_url.trim_end_matches('/').to_string();
        if !database_url.starts_with("http://") && !database_url.starts_with("https://") {
            return Err(StoreError::Transport(format!(
                "Database URL must be http(s): {}",
                database_url
            )));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            database_url,
            auth_token,
            streams: Mutex::new(Vec::new()),
        })
    }

    fn node_url(&self, path: &NodePath) -> String {
        if path.is_root() {
            format!("{}/.json", self.database_url)
        } else {
            format!("{}/{}.json", self.database_url, path.as_str())
        }
    }

    fn request(&self, method: Method, path: &NodePath) -> RequestBuilder {
        let builder = self.http.request(method, self.node_url(path));
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token)]),
            None => builder,
        }
    }

    async fn send(&self, path: &NodePath, builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Rejected {
            path: path.clone(),
            status: status.as_u16(),
            message,
        })
    }
}

impl Drop for RestStoreClient {
    fn drop(&mut self) {
        for stream in self.streams.lock().drain(..) {
            stream.abort();
        }
    }
}

#[async_trait]
impl RemoteStoreClient for RestStoreClient {
    async fn fetch_node(&self, path: &NodePath) -> Result<Option<NodeValue>, StoreError> {
        let response = self.send(path, self.request(Method::GET, path)).await?;
        let value: Value = response.json().await?;
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(NodeValue::from_json(value)))
        }
    }

    async fn subscribe_to(
        &self,
        path: &NodePath,
        listener: Arc<dyn ChildEventListener>,
    ) -> Result<(), StoreError> {
        let request = self
            .request(Method::GET, path)
            .header(ACCEPT, "text/event-stream");
        let response = self.send(path, request).await?;
        let watched = path.clone();
        info!(path = %watched, "Opened event stream");

        let handle = tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = EventStreamDecoder::default();
            let mut state = StreamState::default();
            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!(path = %watched, error = %e, "Event stream failed");
                        return;
                    }
                };
                for (event, data) in decoder.push(&chunk) {
                    match state.apply(&event, &data) {
                        Ok(StreamStep::Events(events)) => {
                            for child_event in events {
                                listener.on_child_event(child_event);
                            }
                        }
                        Ok(StreamStep::Closed(reason)) => {
                            info!(
                                path = %watched,
                                reason = %reason,
                                "Event stream closed by server"
                            );
                            return;
                        }
                        Err(e) => {
                            warn!(path = %watched, error = %e, "Skipping malformed stream event");
                        }
                    }
                }
            }
            debug!(path = %watched, "Event stream ended");
        });
        let mut streams = self.streams.lock();
        streams.retain(|stream| !stream.is_finished());
        streams.push(handle);
        Ok(())
    }

    async fn create(&self, path: &NodePath, value: NodeValue) -> Result<(), StoreError> {
        let request = self.request(Method::PUT, path).json(value.as_json());
        self.send(path, request).await?;
        Ok(())
    }

    async fn update(&self, path: &NodePath, value: NodeValue) -> Result<(), StoreError> {
        // PATCH only accepts objects; anything else is a plain overwrite.
        let method = if value.as_json().is_object() {
            Method::PATCH
        } else {
            Method::PUT
        };
        let request = self.request(method, path).json(value.as_json());
        self.send(path, request).await?;
        Ok(())
    }

    async fn delete(&self, path: &NodePath) -> Result<(), StoreError> {
        self.send(path, self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

/// Splits a server-sent event stream into `(event, data)` pairs.
///
/// Buffers raw bytes so a UTF-8 sequence split across network chunks is
/// decoded only once its block is complete.
#[derive(Default)]
struct EventStreamDecoder {
    buffer: Vec<u8>,
}

impl EventStreamDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<(String, String)> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some((end, separator)) = block_end(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + separator).collect();
            let text = match std::str::from_utf8(&block[..end]) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Dropping stream event that is not UTF-8");
                    continue;
                }
            };
            let mut event = String::new();
            let mut data = Vec::new();
            for line in text.lines() {
                if let Some(rest) = line.strip_prefix("event:") {
                    event = rest.trim().to_string();
                } else if let Some(rest) = line.strip_prefix("data:") {
                    data.push(rest.trim_start().to_string());
                }
            }
            if !event.is_empty() {
                out.push((event, data.join("\n")));
            }
        }
        out
    }
}

/// Offset and length of the first blank-line separator in `buffer`.
fn block_end(buffer: &[u8]) -> Option<(usize, usize)> {
    (0..buffer.len()).find_map(|i| {
        let rest = &buffer[i..];
        if rest.starts_with(b"\r\n\r\n") {
            Some((i, 4))
        } else if rest.starts_with(b"\n\n") {
            Some((i, 2))
        } else {
            None
        }
    })
}

#[derive(Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

enum StreamStep {
    Events(Vec<ChildEvent>),
    Closed(String),
}

/// Local copy of the watched node, kept current from stream events.
struct StreamState {
    node: Value,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            node: Value::Object(Map::new()),
        }
    }
}

impl StreamState {
    fn apply(&mut self, event: &str, data: &str) -> Result<StreamStep, StoreError> {
        match event {
            "put" | "patch" => {
                let payload: StreamPayload = serde_json::from_str(data)?;
                let at = NodePath::new(&payload.path)?;
                let before = self.node.clone();
                if event == "put" {
                    set(&mut self.node, &at, payload.data);
                } else if let Value::Object(fields) = payload.data {
                    for (key, value) in fields {
                        let target = NodePath::new(&format!("{}/{}", at.as_str(), key))?;
                        set(&mut self.node, &target, value);
                    }
                }
                prune(&mut self.node);
                Ok(StreamStep::Events(diff_children(
                    Some(&before),
                    Some(&self.node),
                )))
            }
            "keep-alive" => Ok(StreamStep::Events(Vec::new())),
            "cancel" | "auth_revoked" => Ok(StreamStep::Closed(event.to_string())),
            other => {
                debug!(event = other, "Ignoring unknown stream event");
                Ok(StreamStep::Events(Vec::new()))
            }
        }
    }
}
