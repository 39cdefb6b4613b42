// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Video download for vidrun
//!
//! Streams a result locator to `{id}.mp4` inside the catalog directory in
//! bounded chunks, drives a [`ProgressReporter`](crate::progress::ProgressReporter)
//! and registers the file in the catalog once the body is complete.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vidrun::catalog::VideoCatalog;
//! use vidrun::download::DownloadManager;
//! use vidrun::types::ResultLocator;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut catalog = VideoCatalog::open("/tmp/videos")?;
//! let manager = DownloadManager::new()?;
//!
//! let locator = ResultLocator("https://example.com/v.mp4".to_string());
//! let video = manager.fetch(&mut catalog, &locator, "a cat", "doubao-seedance-1-0-pro-250528").await?;
//! println!("Saved {} as {:?}", video.entry.id, video.path);
//! # Ok(())
//! # }
//! ```

pub mod manager;

pub use manager::{DownloadError, DownloadManager, DownloadedVideo, CHUNK_SIZE};
