// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Race Detection Tests for vidrun
//!
//! Independent invocations share one catalog directory. These tests run many
//! writers at once, each with its own [`VideoCatalog`] handle the way separate
//! processes would, and check that no id is handed out twice and no entry is
//! lost.
//!
//! # Running with ThreadSanitizer
//!
//! ```bash
//! RUSTFLAGS="-Z sanitizer=thread" cargo +nightly test --target x86_64-unknown-linux-gnu --test race_detection_test
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use vidrun::catalog::{CatalogError, VideoCatalog};

// Test configuration
const CONCURRENCY_LEVEL: usize = 8;
const ITERATIONS_PER_TASK: usize = 10;
const TEST_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// CATALOG CONCURRENT REGISTRATION TESTS
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_catalog_concurrent_register() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path: Arc<PathBuf> = Arc::new(dir.path().to_path_buf());
    let registered = Arc::new(AtomicU64::new(0));

    let result = timeout(Duration::from_secs(TEST_TIMEOUT_SECS), async {
        let mut handles = Vec::new();
        for task in 0..CONCURRENCY_LEVEL {
            let path = Arc::clone(&path);
            let registered = Arc::clone(&registered);
            handles.push(tokio::task::spawn_blocking(move || {
                let mut catalog = VideoCatalog::open(path.as_path()).expect("open catalog");
                let mut ids = Vec::new();
                for i in 0..ITERATIONS_PER_TASK {
                    let entry = catalog.register(&format!("task {} video {}", task, i), "m", "o");
                    registered.fetch_add(1, Ordering::SeqCst);
                    ids.push(entry.id);
                }
                ids
            }));
        }

        let mut all_ids = Vec::new();
        for handle in handles {
            all_ids.extend(handle.await.expect("Task panicked"));
        }
        all_ids
    })
    .await;

    let all_ids = result.expect("Test timed out - possible deadlock");
    let expected = (CONCURRENCY_LEVEL * ITERATIONS_PER_TASK) as u64;
    assert_eq!(registered.load(Ordering::SeqCst), expected);

    let unique: HashSet<u64> = all_ids.iter().copied().collect();
    assert_eq!(unique.len(), all_ids.len(), "Duplicate ids handed out");

    let catalog = VideoCatalog::open(path.as_path()).expect("open catalog");
    assert_eq!(catalog.len() as u64, expected);
    let mut persisted: Vec<u64> = catalog.list_all().iter().map(|e| e.id).collect();
    persisted.sort_unstable();
    assert_eq!(persisted, (1..=expected).collect::<Vec<_>>());
}

// =============================================================================
// ALLOCATE-THEN-RECORD INTERLEAVING
// =============================================================================

#[tokio::test]
async fn test_stale_allocation_is_rejected_not_overwritten() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut first = VideoCatalog::open(dir.path()).expect("open catalog");
    let mut second = VideoCatalog::open(dir.path()).expect("open catalog");

    // Both writers see an empty catalog and pick the same id
    let a = first.allocate_next_id();
    let b = second.allocate_next_id();
    assert_eq!(a, b);

    first.record(a, "first", "m", "o").expect("first record");
    assert_eq!(
        second.record(b, "second", "m", "o"),
        Err(CatalogError::DuplicateId(b))
    );

    // The loser can still register under a fresh id
    let entry = second.register("second", "m", "o");
    assert_eq!(entry.id, a + 1);

    let catalog = VideoCatalog::open(dir.path()).expect("open catalog");
    assert_eq!(catalog.find_by_id(a).map(|e| e.prompt.as_str()), Some("first"));
    assert_eq!(catalog.find_by_id(a + 1).map(|e| e.prompt.as_str()), Some("second"));
}

// =============================================================================
// READERS DURING WRITES
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_torn_catalog() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path: Arc<PathBuf> = Arc::new(dir.path().to_path_buf());

    let writer_path = Arc::clone(&path);
    let writer = tokio::task::spawn_blocking(move || {
        let mut catalog = VideoCatalog::open(writer_path.as_path()).expect("open catalog");
        for i in 0..ITERATIONS_PER_TASK * 4 {
            catalog.register(&format!("video {}", i), "m", "o");
        }
    });

    let mut readers = Vec::new();
    for _ in 0..CONCURRENCY_LEVEL {
        let path = Arc::clone(&path);
        readers.push(tokio::task::spawn_blocking(move || {
            let mut last_len = 0;
            for _ in 0..ITERATIONS_PER_TASK * 4 {
                let catalog = VideoCatalog::open(path.as_path()).expect("open catalog");
                // Atomic rename means the count only ever grows
                assert!(catalog.len() >= last_len);
                last_len = catalog.len();
            }
        }));
    }

    timeout(Duration::from_secs(TEST_TIMEOUT_SECS), async {
        writer.await.expect("Writer panicked");
        for reader in readers {
            reader.await.expect("Reader panicked");
        }
    })
    .await
    .expect("Test timed out - possible deadlock");
}
