// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Where a succeeded task response may carry the video URL.

use serde_json::Value;

use crate::probe::{first_match, FieldProbe};
use crate::types::ResultLocator;

/// Locator fields in priority order.
pub const LOCATOR_PROBES: &[FieldProbe] = &[
    FieldProbe::new("content.video_url", &["content", "video_url"]),
    FieldProbe::new("content.url", &["content", "url"]),
    FieldProbe::new("content.download_url", &["content", "download_url"]),
    FieldProbe::new("video_url", &["video_url"]),
    FieldProbe::new("url", &["url"]),
    FieldProbe::new("download_url", &["download_url"]),
];

/// Diagnostic message attached to a failed task.
pub const FAILURE_MESSAGE_PROBES: &[FieldProbe] = &[
    FieldProbe::new("error.message", &["error", "message"]),
    FieldProbe::new("message", &["message"]),
];

/// Extract the result locator from a succeeded status body.
pub fn extract_locator(body: &Value) -> Option<ResultLocator> {
    let hit = first_match(body, LOCATOR_PROBES)?;
    tracing::debug!("Result locator found in '{}'", hit.probe.name);
    Some(ResultLocator(hit.value))
}

/// Failure reason from a failed status body, or "unknown error".
pub fn failure_message(body: &Value) -> String {
    first_match(body, FAILURE_MESSAGE_PROBES)
        .map(|hit| hit.value)
        .unwrap_or_else(|| "unknown error".to_string())
}
