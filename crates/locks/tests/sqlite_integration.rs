// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of certkv.
//
// certkv is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// certkv is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with certkv. If not, see <https://www.gnu.org/licenses/>.

//! SQLite lease manager integration tests.
//!
//! These tests verify:
//! - Try-once acquisition and `Locked` on contention
//! - Lazy expiry of abandoned leases
//! - Release idempotence and immediate re-acquisition
//! - Exactly one winner among concurrent acquirers, in one process and
//!   across independent pools on the same database file

use certkv_common::{SqlPool, StorageConfig, StorageError};
use certkv_locks::{LeaseLocker, SqlLeaseManager};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::{sleep, Duration};

async fn create_manager(dir: &TempDir) -> SqlLeaseManager {
    let url = format!("sqlite://{}", dir.path().join("leases.db").display());
    let config = StorageConfig::new(url);
    let pool = SqlPool::connect(&config).await.unwrap();
    SqlLeaseManager::new(pool, config.lock_timeout, config.query_timeout)
}

#[tokio::test]
async fn test_sqlite_acquire_lock_already_held() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir).await;

    manager.acquire("issue_cert_example.com").await.unwrap();

    let err = manager.acquire("issue_cert_example.com").await.unwrap_err();
    assert!(matches!(err, StorageError::Locked(ref key) if key == "issue_cert_example.com"));
}

#[tokio::test]
async fn test_sqlite_reacquire_own_lease_is_locked() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir).await;

    manager.acquire("renew").await.unwrap();
    assert!(manager.acquire("renew").await.unwrap_err().is_locked());

    // Still held by the first grant
    let lease = manager.lease("renew").await.unwrap().unwrap();
    assert!(lease.active);
}

#[tokio::test]
async fn test_sqlite_keys_are_independent() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir).await;

    manager.acquire("a").await.unwrap();
    manager.acquire("b").await.unwrap();
    assert!(manager.acquire("a").await.unwrap_err().is_locked());
    assert!(manager.acquire("b").await.unwrap_err().is_locked());
}

#[tokio::test]
async fn test_sqlite_expired_lease_is_superseded() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir).await;

    manager
        .acquire_with("short", Duration::from_millis(50), Duration::from_secs(3))
        .await
        .unwrap();
    assert!(manager.acquire("short").await.unwrap_err().is_locked());

    sleep(Duration::from_millis(200)).await;

    let stale = manager.lease("short").await.unwrap().unwrap();
    assert!(!stale.active);

    manager.acquire("short").await.unwrap();
    let fresh = manager.lease("short").await.unwrap().unwrap();
    assert!(fresh.active);
    assert!(fresh.expires > stale.expires);
}

#[tokio::test]
async fn test_sqlite_release_then_reacquire() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir).await;

    manager.acquire("k").await.unwrap();
    manager.release("k").await.unwrap();
    manager.acquire("k").await.unwrap();
    assert!(manager.lease("k").await.unwrap().unwrap().active);
}

#[tokio::test]
async fn test_sqlite_release_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir).await;

    manager.release("never-acquired").await.unwrap();

    manager.acquire("k").await.unwrap();
    manager.release("k").await.unwrap();
    manager.release("k").await.unwrap();
    assert!(manager.lease("k").await.unwrap().is_none());
}

#[tokio::test]
async fn test_sqlite_concurrent_acquire_single_winner() {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(create_manager(&dir).await);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move { manager.acquire("contended").await }));
    }

    let mut granted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => granted += 1,
            Err(e) => assert!(e.is_locked(), "unexpected error: {e}"),
        }
    }
    assert_eq!(granted, 1);
}

#[tokio::test]
async fn test_sqlite_independent_pools_single_winner() {
    let dir = TempDir::new().unwrap();
    let first = create_manager(&dir).await;
    let second = create_manager(&dir).await;

    let (a, b) = tokio::join!(first.acquire("shared"), second.acquire("shared"));
    let results = [a, b];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(result.is_locked(), "unexpected error: {result}");
    }
}

#[tokio::test]
async fn test_sqlite_acquire_timeout_grants_nothing() {
    let dir = TempDir::new().unwrap();
    let manager = create_manager(&dir).await;

    let err = manager
        .acquire_with("slow", Duration::from_secs(60), Duration::ZERO)
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    let observer = create_manager(&dir).await;
    assert!(observer.lease("slow").await.unwrap().is_none());
}
