// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Ordered field probing over loosely structured JSON.
//!
//! Remote responses and host conversation contexts put the value we want in
//! one of several places. Rather than chaining conditionals, callers declare
//! an ordered table of [`FieldProbe`]s and take the first non-empty hit.
//!
//! ```
//! use vidrun::probe::{FieldProbe, first_match};
//!
//! const PROBES: &[FieldProbe] = &[
//!     FieldProbe::new("nested", &["content", "url"]),
//!     FieldProbe::new("top", &["url"]),
//! ];
//!
//! let value = serde_json::json!({ "content": {}, "url": "https://x/v.mp4" });
//! let hit = first_match(&value, PROBES).unwrap();
//! assert_eq!(hit.probe.name, "top");
//! assert_eq!(hit.value, "https://x/v.mp4");
//! ```

use serde_json::Value;

/// A named path into a JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldProbe {
    /// Label used in logs when this probe wins
    pub name: &'static str,
    /// Object keys to walk, outermost first
    pub path: &'static [&'static str],
}

impl FieldProbe {
    pub const fn new(name: &'static str, path: &'static [&'static str]) -> Self {
        Self { name, path }
    }

    /// Resolve this probe against `value`.
    ///
    /// Strings are returned trimmed; numbers are stringified so numeric chat
    /// ids work the same as string ones. Empty strings, zero-length paths,
    /// `null`, booleans, objects and arrays all count as a miss.
    pub fn extract(&self, value: &Value) -> Option<String> {
        if self.path.is_empty() {
            return None;
        }
        let mut current = value;
        for key in self.path {
            current = current.get(*key)?;
        }
        match current {
            Value::String(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// The winning probe and the value it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHit {
    pub probe: FieldProbe,
    pub value: String,
}

/// Apply `probes` in order and return the first non-empty result.
pub fn first_match(value: &Value, probes: &[FieldProbe]) -> Option<ProbeHit> {
    probes.iter().find_map(|probe| {
        probe.extract(value).map(|found| ProbeHit {
            probe: *probe,
            value: found,
        })
    })
}
