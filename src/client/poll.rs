// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Deadline-bounded status polling.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::{sleep, Instant};

use super::locator::{extract_locator, failure_message};
use super::JobClientError;
use crate::types::{JobHandle, JobStatus, ResultLocator};

/// Shortest sleep between queries.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Anything that can report the raw status body of a task.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// One status query. Errors are treated as transient by [`poll_job`].
    async fn query_status(&self, handle: &JobHandle) -> Result<Value, JobClientError>;
}

/// Sleep `interval`, query, repeat until a terminal status or `deadline`.
///
/// The first query happens after one full interval. A query is only started
/// if its wake-up time still falls within the deadline, so a deadline shorter
/// than the interval fails without querying at all. Transient query errors
/// are logged and polling continues.
pub async fn poll_job<S>(
    source: &S,
    handle: &JobHandle,
    deadline: Duration,
    interval: Duration,
) -> Result<ResultLocator, JobClientError>
where
    S: StatusSource + ?Sized,
{
    let interval = interval.max(MIN_POLL_INTERVAL);
    let start = Instant::now();
    let mut queries: u32 = 0;

    loop {
        let elapsed = start.elapsed();
        if elapsed + interval > deadline {
            tracing::error!(
                "Task {} timed out after {}s ({} queries)",
                handle,
                elapsed.as_secs(),
                queries
            );
            return Err(JobClientError::Timeout {
                waited: elapsed,
                queries,
            });
        }

        sleep(interval).await;
        queries += 1;

        let body = match source.query_status(handle).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("Status query {} for task {} failed: {}", queries, handle, e);
                continue;
            }
        };

        let status = JobStatus::parse(body.get("status").and_then(Value::as_str));
        tracing::info!(
            "Task {} status: {} ({}s elapsed)",
            handle,
            status.as_str(),
            start.elapsed().as_secs()
        );

        match status {
            JobStatus::Queued | JobStatus::Running => continue,
            JobStatus::Succeeded => {
                return extract_locator(&body).ok_or_else(|| {
                    tracing::error!("Task {} succeeded without a video URL: {}", handle, body);
                    JobClientError::MissingLocator
                });
            }
            JobStatus::Failed => {
                let reason = failure_message(&body);
                tracing::error!("Task {} failed: {}", handle, reason);
                return Err(JobClientError::JobFailed(reason));
            }
            JobStatus::Unknown(raw) => {
                tracing::error!("Task {} returned unexpected status '{}'", handle, raw);
                return Err(JobClientError::UnexpectedStatus(raw));
            }
        }
    }
}
