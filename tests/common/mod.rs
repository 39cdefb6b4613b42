// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared test harness: a mock remote API, video host and messaging gateway
//! on one local port, plus a requester that records replies.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use vidrun::delivery::{DeliveryError, Requester};

pub type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub const TASK_ID: &str = "abc123";

/// Size of the served video body.
pub const VIDEO_SIZE: usize = 10 * 1024 * 1024;

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

struct Inner {
    create_status: u16,
    statuses: VecDeque<Value>,
    last_status: Value,
    status_queries: usize,
    gateway_status: u16,
    created: Vec<Recorded>,
    gateway_calls: Vec<Recorded>,
    video: Bytes,
}

#[derive(Clone)]
struct MockState {
    inner: Arc<Mutex<Inner>>,
}

pub struct MockApi {
    pub port: u16,
    state: MockState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl MockApi {
    pub async fn start() -> TestResult<Self> {
        let port = find_free_port()?;
        let state = MockState {
            inner: Arc::new(Mutex::new(Inner {
                create_status: 200,
                statuses: VecDeque::new(),
                last_status: json!({ "status": "running" }),
                status_queries: 0,
                gateway_status: 200,
                created: Vec::new(),
                gateway_calls: Vec::new(),
                video: Bytes::from(vec![7u8; VIDEO_SIZE]),
            })),
        };

        let app = Router::new()
            .route("/api/v3/contents/generations/tasks", post(mock_create_task))
            .route("/api/v3/contents/generations/tasks/:id", get(mock_task_status))
            .route("/v.mp4", get(mock_video))
            .route("/send_group_msg", post(mock_gateway))
            .route("/send_private_msg", post(mock_gateway))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            port,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Status bodies returned in order; the last one repeats.
    pub fn script_statuses(&self, statuses: Vec<Value>) {
        let mut inner = self.state.inner.lock().unwrap();
        if let Some(last) = statuses.last() {
            inner.last_status = last.clone();
        }
        inner.statuses = statuses.into();
    }

    pub fn fail_create(&self, status: u16) {
        self.state.inner.lock().unwrap().create_status = status;
    }

    pub fn fail_gateway(&self, status: u16) {
        self.state.inner.lock().unwrap().gateway_status = status;
    }

    pub fn created(&self) -> Vec<Recorded> {
        self.state.inner.lock().unwrap().created.clone()
    }

    pub fn gateway_calls(&self) -> Vec<Recorded> {
        self.state.inner.lock().unwrap().gateway_calls.clone()
    }

    pub fn status_queries(&self) -> usize {
        self.state.inner.lock().unwrap().status_queries
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn mock_create_task(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut inner = state.inner.lock().unwrap();
    inner.created.push(Recorded {
        path: "/api/v3/contents/generations/tasks".to_string(),
        authorization: authorization(&headers),
        body,
    });
    let status = StatusCode::from_u16(inner.create_status).unwrap_or(StatusCode::OK);
    if status.is_success() {
        (status, Json(json!({ "id": TASK_ID })))
    } else {
        (status, Json(json!({ "error": { "message": "invalid api key" } })))
    }
}

async fn mock_task_status(
    State(state): State<MockState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let mut inner = state.inner.lock().unwrap();
    inner.status_queries += 1;
    if id != TASK_ID {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "no such task" })));
    }
    let body = match inner.statuses.pop_front() {
        Some(body) => body,
        None => inner.last_status.clone(),
    };
    (StatusCode::OK, Json(body))
}

async fn mock_video(State(state): State<MockState>) -> impl IntoResponse {
    let video = state.inner.lock().unwrap().video.clone();
    ([("content-type", "video/mp4")], video)
}

async fn mock_gateway(
    State(state): State<MockState>,
    uri: axum::http::Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut inner = state.inner.lock().unwrap();
    inner.gateway_calls.push(Recorded {
        path: uri.path().to_string(),
        authorization: authorization(&headers),
        body,
    });
    let status = StatusCode::from_u16(inner.gateway_status).unwrap_or(StatusCode::OK);
    (status, Json(json!({ "status": "ok", "retcode": 0 })))
}

pub fn find_free_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Records every reply instead of printing it.
pub struct RecordingRequester {
    context: Value,
    texts: Mutex<Vec<String>>,
}

impl RecordingRequester {
    pub fn new(context: Value) -> Self {
        Self {
            context,
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Requester for RecordingRequester {
    async fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn conversation(&self) -> &Value {
        &self.context
    }
}
