// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Utility functions for vidrun.
//!
//! This module provides common utility functions used across the codebase.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that are not allowed in filenames on common filesystems.
static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).expect("Unsafe filename regex"));

/// Maximum number of characters of a response body written to the log.
pub const LOG_PAYLOAD_LIMIT: usize = 500;

/// Mask a sensitive string (like API keys) for logging.
///
/// Shows only the first `visible_prefix` characters and replaces the rest with "...".
/// This ensures API keys are never logged in full.
///
/// # Examples
///
/// ```
/// use vidrun::utils::mask_sensitive;
///
/// let api_key = "ark-0123456789abcdef";
/// let masked = mask_sensitive(&api_key, 6);
/// assert_eq!(masked, "ark-01...");
/// ```
pub fn mask_sensitive(input: &str, visible_prefix: usize) -> String {
    if input.chars().count() <= visible_prefix {
        return "***".to_string();
    }

    let prefix: String = input.chars().take(visible_prefix).collect();
    format!("{}...", prefix)
}

/// Cut a payload down to `max_chars` characters for log output.
pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let mut chars = input.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...[truncated]", head)
    } else {
        head
    }
}

/// Human-readable name recorded for a downloaded video.
///
/// Uses the first 20 characters of the prompt with filesystem-hostile
/// characters replaced by `_`, e.g. `doubao_a cat on grass_1718000000.mp4`.
pub fn original_filename(prompt: &str, unix_ts: i64) -> String {
    let head: String = prompt.chars().take(20).collect();
    let safe = if head.is_empty() {
        "video".to_string()
    } else {
        UNSAFE_FILENAME_CHARS.replace_all(&head, "_").into_owned()
    };
    format!("doubao_{}_{}.mp4", safe, unix_ts)
}
