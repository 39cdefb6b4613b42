// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Catalog record type.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Extension every stored video uses.
pub const VIDEO_EXTENSION: &str = "mp4";

/// One downloaded video and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Allocated as max existing id + 1, never reused
    pub id: u64,
    /// Prompt the video was generated from
    pub prompt: String,
    /// Model that generated it
    pub model_id: String,
    /// Descriptive name, e.g. `doubao_a cat_1718000000.mp4`
    pub original_filename: String,
    /// Unix timestamp in (fractional) seconds
    pub created_at: f64,
    /// Canonical storage name, always `{id}.mp4`
    pub filename: String,
}

impl CatalogEntry {
    /// Create an entry stamped with the current time.
    pub fn new(
        id: u64,
        prompt: impl Into<String>,
        model_id: impl Into<String>,
        original_filename: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let created_at = now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6;
        Self::with_timestamp(id, prompt, model_id, original_filename, created_at)
    }

    pub fn with_timestamp(
        id: u64,
        prompt: impl Into<String>,
        model_id: impl Into<String>,
        original_filename: impl Into<String>,
        created_at: f64,
    ) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            model_id: model_id.into(),
            original_filename: original_filename.into(),
            created_at,
            filename: Self::canonical_filename(id),
        }
    }

    /// `{id}.mp4`
    pub fn canonical_filename(id: u64) -> String {
        format!("{}.{}", id, VIDEO_EXTENSION)
    }

    /// Creation time as a UTC datetime, if the stored timestamp is representable.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        let secs = self.created_at.trunc() as i64;
        let nanos = ((self.created_at.fract()) * 1e9) as u32;
        Utc.timestamp_opt(secs, nanos).single()
    }

    /// Returns true if `fragment` occurs in the prompt or the original filename.
    pub fn matches_name(&self, fragment: &str) -> bool {
        self.prompt.contains(fragment) || self.original_filename.contains(fragment)
    }
}
