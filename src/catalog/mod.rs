// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Local catalog of downloaded videos.
//!
//! The catalog is a single JSON array (`metadata.json`) living next to the
//! video files it describes. It is the authoritative answer to "which videos
//! exist locally": a file on disk without an entry is ignored, and an entry
//! whose file has gone missing is reported when someone tries to play it.
//!
//! # Layout
//!
//! ```text
//! <storage dir>/
//! ├── metadata.json   [{id, prompt, model_id, original_filename, created_at, filename}, ...]
//! ├── metadata.lock   exclusive while a writer rewrites metadata.json
//! ├── 1.mp4
//! └── 2.mp4
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use vidrun::catalog::VideoCatalog;
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut catalog = VideoCatalog::open("/tmp/videos")?;
//! let id = catalog.allocate_next_id();
//! catalog.record(id, "a cat on the grass", "doubao-seedance-1-0-pro-250528", "doubao_a cat_1.mp4")?;
//! assert_eq!(catalog.find_by_id(id).map(|e| e.filename.as_str()), Some("1.mp4"));
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod store;

pub use entry::CatalogEntry;
pub use store::{CatalogError, VideoCatalog, CATALOG_FILE};
