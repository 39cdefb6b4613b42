// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Streams a finished video into the catalog directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::catalog::{CatalogEntry, CatalogError, VideoCatalog};
use crate::progress::ProgressReporter;
use crate::types::ResultLocator;
use crate::utils::{original_filename, truncate_for_log, LOG_PAYLOAD_LIMIT};

/// Size of each write to disk.
pub const CHUNK_SIZE: usize = 8192;

/// Whole-transfer timeout (in seconds).
const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Error types specific to downloads.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadError {
    /// Request or body stream failed.
    Network(String),
    /// Non-success HTTP status.
    Http { status: u16, body: String },
    /// Local file could not be written.
    Io(String),
}

impl std::fmt::Display for DownloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Download network error: {}", msg),
            Self::Http { status, body } => write!(f, "Download failed: HTTP {} - {}", status, body),
            Self::Io(msg) => write!(f, "Failed to write video file: {}", msg),
        }
    }
}

impl std::error::Error for DownloadError {}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// A video that reached disk and the catalog.
#[derive(Debug, Clone)]
pub struct DownloadedVideo {
    pub entry: CatalogEntry,
    pub path: PathBuf,
    /// Bytes written
    pub bytes: u64,
    /// Number of writes, each at most [`CHUNK_SIZE`]
    pub chunks: u64,
}

/// Fetches result locators into a [`VideoCatalog`].
#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: reqwest::Client,
    show_progress: bool,
}

impl DownloadManager {
    pub fn new() -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| DownloadError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            show_progress: true,
        })
    }

    /// Disable the terminal progress bar.
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Download `locator` and record it in `catalog`.
    ///
    /// One attempt, no retry. The body streams into a `.part` file unique to
    /// this call and is renamed to `{id}.mp4` only after the entry is
    /// recorded, so a concurrent writer holding the same candidate id never
    /// touches this file. On failure the `.part` file is left behind without
    /// a catalog entry.
    pub async fn fetch(
        &self,
        catalog: &mut VideoCatalog,
        locator: &ResultLocator,
        prompt: &str,
        model_id: &str,
    ) -> Result<DownloadedVideo, DownloadError> {
        let original = original_filename(prompt, chrono::Utc::now().timestamp());
        let id = with_catalog(catalog, |c| c.allocate_next_id()).await?;
        let part = catalog.dir().join(partial_filename(id));

        tracing::info!(
            "Downloading video: url={}, destination={:?}",
            truncate_for_log(locator.as_str(), 50),
            part
        );

        let (bytes, chunks) = match self.stream_to_file(locator, &part).await {
            Ok(counts) => counts,
            Err(e) => {
                tracing::error!("Video download failed: {}", e);
                return Err(e);
            }
        };

        let (prompt, model_id) = (prompt.to_string(), model_id.to_string());
        let entry = with_catalog(catalog, move |c| match c.record(id, &prompt, &model_id, &original) {
            Ok(entry) => entry,
            Err(CatalogError::DuplicateId(taken)) => {
                // Another writer claimed the id while we were streaming
                let entry = c.register(&prompt, &model_id, &original);
                tracing::warn!("Video id {} was taken, stored as {}", taken, entry.id);
                entry
            }
        })
        .await?;

        let path = catalog.artifact_path(&entry);
        tokio::fs::rename(&part, &path)
            .await
            .map_err(|e| DownloadError::Io(format!("{:?} -> {:?}: {}", part, path, e)))?;
        tracing::info!("Video saved: {:?} ({} bytes)", path, bytes);

        Ok(DownloadedVideo {
            entry,
            path,
            bytes,
            chunks,
        })
    }

    async fn stream_to_file(
        &self,
        locator: &ResultLocator,
        path: &Path,
    ) -> Result<(u64, u64), DownloadError> {
        let response = self.client.get(locator.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DownloadError::Http {
                status: status.as_u16(),
                body: truncate_for_log(&text, LOG_PAYLOAD_LIMIT),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let mut progress = if self.show_progress {
            ProgressReporter::new(total)
        } else {
            ProgressReporter::hidden(total)
        };

        let mut file = File::create(path)
            .await
            .map_err(|e| DownloadError::Io(format!("{:?}: {}", path, e)))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut chunks: u64 = 0;

        while let Some(item) = stream.next().await {
            let data = item?;
            for piece in data.chunks(CHUNK_SIZE) {
                file.write_all(piece)
                    .await
                    .map_err(|e| DownloadError::Io(e.to_string()))?;
                downloaded += piece.len() as u64;
                chunks += 1;
                progress.update(downloaded);
            }
        }

        file.flush()
            .await
            .map_err(|e| DownloadError::Io(e.to_string()))?;
        progress.finish();

        Ok((downloaded, chunks))
    }
}

/// Per-call sequence so concurrent fetches in one process never share a
/// `.part` file.
static PART_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// `{id}.{pid}-{seq}.part`
fn partial_filename(id: u64) -> String {
    let seq = PART_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}.{}-{}.part", id, std::process::id(), seq)
}

/// Run a blocking catalog operation on the blocking pool.
///
/// The catalog is moved into the task and written back afterwards.
async fn with_catalog<T, F>(catalog: &mut VideoCatalog, op: F) -> Result<T, DownloadError>
where
    F: FnOnce(&mut VideoCatalog) -> T + Send + 'static,
    T: Send + 'static,
{
    let mut owned = catalog.clone();
    let (owned, out) = tokio::task::spawn_blocking(move || {
        let out = op(&mut owned);
        (owned, out)
    })
    .await
    .map_err(|e| DownloadError::Io(format!("Task join error: {}", e)))?;
    *catalog = owned;
    Ok(out)
}
