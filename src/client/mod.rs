// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Remote video generation API client
//!
//! Submits a generation task, then polls its status until it succeeds, fails
//! or the deadline runs out.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use vidrun::client::RemoteJobClient;
//! use vidrun::config::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let request = config.job_request("a kitten chasing a ball", None);
//! let client = RemoteJobClient::for_request(&request)?;
//!
//! let handle = client.submit(&request).await?;
//! let locator = client
//!     .poll(&handle, Duration::from_secs(600), Duration::from_secs(30))
//!     .await?;
//! println!("Video ready: {}", locator);
//! # Ok(())
//! # }
//! ```

pub mod locator;
pub mod poll;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::probe::FieldProbe;
use crate::types::{JobHandle, JobRequest, ResultLocator};
use crate::utils::{mask_sensitive, truncate_for_log, LOG_PAYLOAD_LIMIT};

pub use locator::{extract_locator, LOCATOR_PROBES};
pub use poll::{poll_job, StatusSource};

/// Path segment the remote API is versioned under.
const API_VERSION_PATH: &str = "/api/v3";

/// Task collection below the versioned base.
const TASKS_PATH: &str = "/contents/generations/tasks";

/// Timeout for the creation call (in seconds).
const SUBMIT_TIMEOUT_SECS: u64 = 30;

/// Timeout for a single status query (in seconds).
const QUERY_TIMEOUT_SECS: u64 = 30;

/// Error types specific to remote job operations.
#[derive(Debug, Clone, PartialEq)]
pub enum JobClientError {
    /// Transport failed before a response arrived.
    Network(String),
    /// Non-success HTTP status.
    Api { status: u16, body: String },
    /// Response body was not the JSON we expected.
    MalformedResponse(String),
    /// Creation succeeded but no task id came back.
    MissingHandle,
    /// Remote side reported the task as failed.
    JobFailed(String),
    /// Status value outside the known set.
    UnexpectedStatus(String),
    /// Task succeeded without any locator field.
    MissingLocator,
    /// Deadline exhausted.
    Timeout { waited: Duration, queries: u32 },
}

impl std::fmt::Display for JobClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Api { status, body } => write!(f, "API error: HTTP {} - {}", status, body),
            Self::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            Self::MissingHandle => write!(f, "Task created but response carried no task id"),
            Self::JobFailed(msg) => write!(f, "Generation failed: {}", msg),
            Self::UnexpectedStatus(status) => write!(f, "Unexpected task status: '{}'", status),
            Self::MissingLocator => write!(f, "Task succeeded but no video URL was found"),
            Self::Timeout { waited, queries } => write!(
                f,
                "Timed out after {}s ({} status queries)",
                waited.as_secs(),
                queries
            ),
        }
    }
}

impl std::error::Error for JobClientError {}

impl From<reqwest::Error> for JobClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network("Request timed out.".to_string())
        } else if e.is_connect() {
            Self::Network(format!("Failed to connect: {}", e))
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Task collection URL for `base`.
///
/// Trailing slashes are dropped; `/api/v3` is inserted unless the base
/// already contains it.
pub fn tasks_endpoint(base: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if base.contains(API_VERSION_PATH) {
        format!("{}{}", base, TASKS_PATH)
    } else {
        format!("{}{}{}", base, API_VERSION_PATH, TASKS_PATH)
    }
}

/// Client for the remote generation task API.
#[derive(Debug, Clone)]
pub struct RemoteJobClient {
    /// HTTP client with configured timeouts.
    client: reqwest::Client,
    api_key: String,
    /// Task collection URL, already normalized.
    tasks_url: String,
}

impl RemoteJobClient {
    pub fn new(api_base: &str, api_key: impl Into<String>) -> Result<Self, JobClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SUBMIT_TIMEOUT_SECS))
            .build()
            .map_err(|e| JobClientError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            tasks_url: tasks_endpoint(api_base),
        })
    }

    /// Client for the endpoint and credentials carried by `request`.
    pub fn for_request(request: &JobRequest) -> Result<Self, JobClientError> {
        Self::new(&request.api_base, request.api_key.clone())
    }

    pub fn tasks_url(&self) -> &str {
        &self.tasks_url
    }

    /// Create the remote task. One attempt, no retry.
    pub async fn submit(&self, request: &JobRequest) -> Result<JobHandle, JobClientError> {
        tracing::info!(
            "Submitting generation task: model={}, key={}",
            request.model,
            mask_sensitive(&self.api_key, 6)
        );

        let response = self
            .client
            .post(&self.tasks_url)
            .bearer_auth(&self.api_key)
            .json(&request.to_payload())
            .timeout(Duration::from_secs(SUBMIT_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| {
                let err = JobClientError::from(e);
                tracing::error!("Task creation request failed: {}", err);
                err
            })?;

        let status = response.status();
        let text = response.text().await.map_err(JobClientError::from)?;
        let body = truncate_for_log(&text, LOG_PAYLOAD_LIMIT);

        if !status.is_success() {
            tracing::error!("Task creation failed: HTTP {} - {}", status, body);
            return Err(JobClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            tracing::error!("Task creation response is not JSON: {}", body);
            JobClientError::MalformedResponse(e.to_string())
        })?;

        match parse_handle(&value) {
            Some(handle) => {
                tracing::info!("Task created: {}", handle);
                Ok(handle)
            }
            None => {
                tracing::error!("Task creation response has no id: {}", body);
                Err(JobClientError::MissingHandle)
            }
        }
    }

    /// Wait for `handle` to reach a terminal state. See [`poll_job`].
    pub async fn poll(
        &self,
        handle: &JobHandle,
        deadline: Duration,
        interval: Duration,
    ) -> Result<ResultLocator, JobClientError> {
        poll_job(self, handle, deadline, interval).await
    }
}

#[async_trait]
impl StatusSource for RemoteJobClient {
    async fn query_status(&self, handle: &JobHandle) -> Result<Value, JobClientError> {
        let url = format!("{}/{}", self.tasks_url, handle);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(QUERY_TIMEOUT_SECS))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(JobClientError::Api {
                status: status.as_u16(),
                body: truncate_for_log(&text, LOG_PAYLOAD_LIMIT),
            });
        }

        serde_json::from_str(&text).map_err(|e| JobClientError::MalformedResponse(e.to_string()))
    }
}

/// Task id in a creation response; numeric ids are accepted too.
const HANDLE_PROBE: FieldProbe = FieldProbe::new("id", &["id"]);

/// Read the job handle out of a task creation response.
pub fn parse_handle(body: &Value) -> Option<JobHandle> {
    HANDLE_PROBE.extract(body).map(JobHandle)
}
