// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Canonical job types shared by the client, downloader and dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Video generation models the remote API accepts.
///
/// Index `i` is shown to users as `i + 1` by `vidrun models`.
pub const SUPPORTED_MODELS: &[&str] = &[
    "doubao-seedance-1-0-pro-250528",
    "doubao-seedance-1-5-pro-251215",
    "doubao-seedance-1-0-lite-i2v-250428",
];

/// Look up a supported model by its 1-based position.
pub fn model_by_index(index: usize) -> Option<&'static str> {
    index.checked_sub(1).and_then(|i| SUPPORTED_MODELS.get(i)).copied()
}

/// Output parameters sent alongside the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoParams {
    /// Aspect ratio, e.g. "16:9", "9:16", "adaptive"
    pub ratio: String,
    /// Clip length in seconds
    pub duration: u32,
    pub watermark: bool,
    pub generate_audio: bool,
    /// Fast low-quality preview
    pub draft: bool,
    pub return_last_frame: bool,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            ratio: "16:9".to_string(),
            duration: 5,
            watermark: false,
            generate_audio: true,
            draft: false,
            return_last_frame: false,
        }
    }
}

/// A single generation request. Built once per invocation, never persisted.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub prompt: String,
    pub model: String,
    pub params: VideoParams,
    pub api_key: String,
    pub api_base: String,
}

impl JobRequest {
    /// Request body for `POST /contents/generations/tasks`.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "content": [
                { "type": "text", "text": self.prompt }
            ],
            "ratio": self.params.ratio,
            "duration": self.params.duration,
            "watermark": self.params.watermark,
            "return_last_frame": self.params.return_last_frame,
            "generate_audio": self.params.generate_audio,
            "draft": self.params.draft,
        })
    }
}

/// Remote task identifier returned on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status reported by the remote task endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    /// Anything the client does not recognize. Treated as a terminal failure.
    Unknown(String),
}

impl JobStatus {
    /// Parse the raw `status` field. A missing field maps to `Unknown("")`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("queued") => Self::Queued,
            Some("running") => Self::Running,
            Some("succeeded") => Self::Succeeded,
            Some("failed") => Self::Failed,
            Some(other) => Self::Unknown(other.to_string()),
            None => Self::Unknown(String::new()),
        }
    }

    /// Returns true once no further polling can change the outcome.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unknown(raw) => raw,
        }
    }
}

/// Reference to the generated media, usually an HTTPS URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLocator(pub String);

impl ResultLocator {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResultLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
