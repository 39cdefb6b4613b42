// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Persistent catalog storage.
//!
//! Every mutation re-reads `metadata.json`, applies the change and rewrites
//! the whole file through a temp file + atomic rename while holding an
//! exclusive lock on `metadata.lock`. Save failures are logged and swallowed:
//! the in-memory view stays authoritative for this process until the next
//! successful save.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use fs2::FileExt;

use super::entry::CatalogEntry;

/// Catalog file name inside the storage directory.
pub const CATALOG_FILE: &str = "metadata.json";

/// Default timeout for acquiring file locks (5 seconds)
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Retry interval when waiting for lock acquisition
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Errors surfaced by catalog mutations.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    /// An entry with this id already exists.
    DuplicateId(u64),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "Catalog already contains video {}", id),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Index of downloaded videos backed by `metadata.json`.
#[derive(Debug, Clone)]
pub struct VideoCatalog {
    dir: PathBuf,
    entries: Vec<CatalogEntry>,
}

impl VideoCatalog {
    /// Open (and create if needed) the catalog in `dir`.
    ///
    /// An unreadable or corrupt catalog file is logged and treated as empty.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create video directory: {:?}", dir))?;

        let mut catalog = Self {
            dir,
            entries: Vec::new(),
        };
        catalog.refresh();
        Ok(catalog)
    }

    /// Storage directory holding the catalog and the video files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CATALOG_FILE)
    }

    fn lock_path(&self) -> PathBuf {
        self.path().with_extension("lock")
    }

    /// Where the file for `entry` lives. Existence is not checked.
    pub fn artifact_path(&self, entry: &CatalogEntry) -> PathBuf {
        self.dir.join(&entry.filename)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Acquire an exclusive lock with timeout.
    ///
    /// Returns the locked file handle; the lock is released when it is dropped.
    fn acquire_exclusive_lock_with_timeout(path: &Path, timeout: Duration) -> Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for lock file: {:?}", parent))?;
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file: {:?}", path))?;

        let start = Instant::now();
        loop {
            match FileExt::try_lock_exclusive(&lock_file) {
                Ok(()) => return Ok(lock_file),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= timeout {
                        bail!(
                            "Timed out waiting for exclusive lock on {:?} after {:?}. \
                             Another process may be writing the catalog.",
                            path,
                            timeout
                        );
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to acquire exclusive lock on {:?}", path));
                }
            }
        }
    }

    /// Acquire a shared lock with timeout. Multiple readers may hold it at once.
    fn acquire_shared_lock_with_timeout(path: &Path, timeout: Duration) -> Result<File> {
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file: {:?}", path))?;

        let start = Instant::now();
        loop {
            match FileExt::try_lock_shared(&lock_file) {
                Ok(()) => return Ok(lock_file),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() >= timeout {
                        bail!(
                            "Timed out waiting for shared lock on {:?} after {:?}.",
                            path,
                            timeout
                        );
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(e).with_context(|| "Failed to acquire shared lock on catalog");
                }
            }
        }
    }

    /// Parse the on-disk catalog. `Ok(None)` means there is no file yet.
    fn read_disk(&self) -> Result<Option<Vec<CatalogEntry>>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read catalog: {:?}", path))?;
        let entries = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog: {:?}", path))?;
        Ok(Some(entries))
    }

    /// Reload from disk under a shared lock.
    ///
    /// On any failure the current in-memory view is kept.
    pub fn refresh(&mut self) {
        let _guard = match Self::acquire_shared_lock_with_timeout(&self.lock_path(), LOCK_TIMEOUT) {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!("Catalog read without lock: {:#}", e);
                match self.read_disk() {
                    Ok(Some(entries)) => self.entries = entries,
                    Ok(None) => {}
                    Err(e) => tracing::error!("Failed to load video catalog: {:#}", e),
                }
                return;
            }
        };

        match self.read_disk() {
            Ok(Some(entries)) => self.entries = entries,
            Ok(None) => {}
            Err(e) => tracing::error!("Failed to load video catalog: {:#}", e),
        }
    }

    /// Next free id: 1 for an empty catalog, otherwise max existing id + 1.
    ///
    /// Call immediately before [`record`](Self::record). Use
    /// [`register`](Self::register) when allocation and recording must not
    /// interleave with another writer.
    pub fn allocate_next_id(&mut self) -> u64 {
        self.refresh();
        Self::next_id(&self.entries)
    }

    fn next_id(entries: &[CatalogEntry]) -> u64 {
        entries.iter().map(|e| e.id).max().map_or(1, |max| max + 1)
    }

    /// Append an entry for `id` stamped with the current time and persist.
    pub fn record(
        &mut self,
        id: u64,
        prompt: &str,
        model_id: &str,
        original_filename: &str,
    ) -> Result<CatalogEntry, CatalogError> {
        let entry = CatalogEntry::new(id, prompt, model_id, original_filename);
        self.insert(entry)
    }

    /// Allocate the next id and record under one exclusive lock.
    pub fn register(&mut self, prompt: &str, model_id: &str, original_filename: &str) -> CatalogEntry {
        let guard = self.lock_for_write();
        self.merge_disk();
        let id = Self::next_id(&self.entries);
        let entry = CatalogEntry::new(id, prompt, model_id, original_filename);
        self.entries.push(entry.clone());
        if guard.is_some() {
            self.save_logged();
        }
        entry
    }

    fn insert(&mut self, entry: CatalogEntry) -> Result<CatalogEntry, CatalogError> {
        let guard = self.lock_for_write();
        self.merge_disk();

        if self.entries.iter().any(|e| e.id == entry.id) {
            return Err(CatalogError::DuplicateId(entry.id));
        }

        self.entries.push(entry.clone());
        if guard.is_some() {
            self.save_logged();
        }
        Ok(entry)
    }

    /// Take the write lock, logging instead of failing.
    ///
    /// `None` means the lock could not be taken; callers then keep the change
    /// in memory only.
    fn lock_for_write(&self) -> Option<File> {
        match Self::acquire_exclusive_lock_with_timeout(&self.lock_path(), LOCK_TIMEOUT) {
            Ok(guard) => Some(guard),
            Err(e) => {
                tracing::error!("Failed to save video catalog: {:#}", e);
                None
            }
        }
    }

    /// Adopt the on-disk entries if they can be read, so entries written by
    /// other processes since our last load survive the rewrite.
    fn merge_disk(&mut self) {
        match self.read_disk() {
            Ok(Some(entries)) => self.entries = entries,
            Ok(None) => {}
            Err(e) => tracing::warn!("Keeping in-memory catalog, disk copy unreadable: {:#}", e),
        }
    }

    fn save_logged(&self) {
        if let Err(e) = self.save() {
            tracing::error!("Failed to save video catalog: {:#}", e);
        }
    }

    /// Rewrite the whole catalog atomically. Caller holds the write lock.
    fn save(&self) -> Result<()> {
        let path = self.path();
        let temp_path = path.with_extension("tmp");

        let content = serde_json::to_string_pretty(&self.entries)
            .with_context(|| "Failed to serialize catalog to JSON")?;

        {
            let mut temp_file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;

            temp_file
                .write_all(content.as_bytes())
                .with_context(|| "Failed to write to temp file")?;

            temp_file
                .sync_all()
                .with_context(|| "Failed to sync temp file to disk")?;
        }

        fs::rename(&temp_path, &path).with_context(|| {
            format!("Failed to rename temp file to catalog: {:?} -> {:?}", temp_path, path)
        })?;

        Ok(())
    }

    pub fn find_by_id(&self, id: u64) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// First entry, in catalog order, whose prompt or original filename
    /// contains `fragment`.
    pub fn find_by_name(&self, fragment: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.matches_name(fragment))
    }

    /// All entries, newest first. Ties keep catalog order.
    pub fn list_all(&self) -> Vec<&CatalogEntry> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| b.created_at.total_cmp(&a.created_at));
        entries
    }
}
