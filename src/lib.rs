// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! vidrun - Remote video generation relay
//!
//! Submit a prompt, wait for the remote job, download the video, deliver it.
//!
//! **Submit** -> **Poll** -> **Download** -> **Deliver**
//!
//! # Core Modules
//!
//! - [`client`] - Remote task API: submit and deadline-bounded polling
//! - [`download`] - Chunked streaming download into the catalog directory
//! - [`catalog`] - Persistent index of downloaded videos
//! - [`delivery`] - Gateway, native attachment and text fallback channels
//! - [`progress`] - Rate-limited download progress display
//! - [`service`] - User-facing operations built on the above
//! - [`config`] - `~/.vidrun/config.json` loading and validation
//! - [`error`] - User-facing error taxonomy and formatting

pub mod catalog;
pub mod client;
pub mod config;
pub mod delivery;
pub mod download;
pub mod error;
pub mod probe;
pub mod progress;
pub mod service;
pub mod types;
pub mod utils;

pub use catalog::{CatalogEntry, VideoCatalog};
pub use client::{JobClientError, RemoteJobClient, StatusSource};
pub use config::Config;
pub use delivery::{
    AttachmentSender, DeliveryChannel, DeliveryDispatcher, DeliveryOutcome, DeliveryRequest,
    Requester,
};
pub use download::{DownloadError, DownloadManager};
pub use error::VidrunError;
pub use progress::ProgressReporter;
pub use service::{GenerationOutcome, VideoService};
pub use types::{JobHandle, JobRequest, JobStatus, ResultLocator, VideoParams};
