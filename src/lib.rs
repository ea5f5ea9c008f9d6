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

//! # certkv
//!
//! ## Purpose
//! Durable shared storage for certificate-management processes: a flat
//! byte-valued key-value store plus short-lived named leases, both kept in
//! one relational database so every cooperating process sees the same state.
//!
//! ## Architecture Context
//! - [`certkv_common`]: configuration, error taxonomy, connection pool
//! - [`certkv_keyvalue`]: the data table (`put`/`get`/`delete`/`list`/`stat`)
//! - [`certkv_locks`]: the lease table (`acquire`/`release`)
//! - [`CertStorage`]: the capability object the host calls, combining both
//!   over one pool
//!
//! ## Examples
//! ```rust,no_run
//! use certkv::{CertStorage, KeyValueStore, LeaseLocker, StorageConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig::new("postgres://localhost/certs").with_lock_timeout("2m")?;
//! let storage = CertStorage::connect(&config).await?;
//!
//! storage.acquire("issue_cert_example.com").await?;
//! storage.put("certificates/example.com.crt", b"...").await?;
//! storage.release("issue_cert_example.com").await?;
//!
//! storage.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod telemetry;

pub use certkv_common::{
    BackendFailure, DatabaseKind, SqlPool, StorageConfig, StorageError, StorageResult,
};
pub use certkv_keyvalue::{KeyInfo, KeyValueStore, SqlKeyValueStore};
pub use certkv_locks::{Lease, LeaseLocker, SqlLeaseManager};

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{instrument, warn};

/// Storage capability consumed by a certificate-management host.
///
/// Data operations and leases share one backend; [`Storage::close`]
/// releases it.
#[async_trait]
pub trait Storage: KeyValueStore + LeaseLocker {
    /// Close the backend. Calling it again is harmless.
    async fn close(&self);
}

/// Key-value store and lease manager over one shared pool.
///
/// Cloning is cheap; clones share the pool and closing any of them closes
/// all.
#[derive(Debug, Clone)]
pub struct CertStorage {
    pool: SqlPool,
    kv: SqlKeyValueStore,
    leases: SqlLeaseManager,
}

impl CertStorage {
    /// Connect to the backend named by `config.connection_string`.
    ///
    /// Probes connectivity (bounded by [`certkv_common::CONNECT_PROBE_TIMEOUT`])
    /// and creates the tables unless `ensure_schema` is off. Invalid settings
    /// fail with `InvalidConfig`, an unreachable backend with `Backend`.
    pub async fn connect(config: &StorageConfig) -> StorageResult<Self> {
        let pool = SqlPool::connect(config).await?;
        Self::open(pool, config)
    }

    /// Wrap an existing pool without probing it.
    ///
    /// Only the timeouts of `config` are used.
    pub fn open(pool: SqlPool, config: &StorageConfig) -> StorageResult<Self> {
        config.validate_timeouts()?;
        Ok(Self {
            kv: SqlKeyValueStore::new(pool.clone(), config.query_timeout),
            leases: SqlLeaseManager::new(pool.clone(), config.lock_timeout, config.query_timeout),
            pool,
        })
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlPool {
        &self.pool
    }

    /// Key-value half of the store.
    pub fn key_value(&self) -> &SqlKeyValueStore {
        &self.kv
    }

    /// Lease half of the store.
    pub fn leases(&self) -> &SqlLeaseManager {
        &self.leases
    }

    /// See [`SqlKeyValueStore::try_exists`].
    pub async fn try_exists(&self, key: &str) -> StorageResult<bool> {
        self.kv.try_exists(key).await
    }

    /// See [`SqlLeaseManager::acquire_with`].
    pub async fn acquire_with(
        &self,
        key: &str,
        lease: Duration,
        deadline: Duration,
    ) -> StorageResult<()> {
        self.leases.acquire_with(key, lease, deadline).await
    }

    /// See [`SqlLeaseManager::lease`].
    pub async fn lease(&self, key: &str) -> StorageResult<Option<Lease>> {
        self.leases.lease(key).await
    }

    /// Run `critical` while holding the lease for `key`.
    ///
    /// The lease is released whether `critical` succeeds or fails. A release
    /// failure is reported only when `critical` itself succeeded.
    #[instrument(skip(self, critical), fields(lock_key = %key))]
    pub async fn with_lease<T, F, Fut>(&self, key: &str, critical: F) -> StorageResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        self.leases.acquire(key).await?;
        let outcome = critical().await;
        let released = self.leases.release(key).await;

        match (outcome, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(error = %release_err, "Lease release failed after critical section error");
                Err(e)
            }
        }
    }

    /// Close the shared pool. Calling it again is harmless.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeyValueStore for CertStorage {
    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.kv.put(key, value).await
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.kv.get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.kv.delete(key).await
    }

    async fn exists(&self, key: &str) -> bool {
        self.kv.exists(key).await
    }

    async fn list(&self, prefix: &str, recursive: bool) -> StorageResult<Vec<String>> {
        self.kv.list(prefix, recursive).await
    }

    async fn stat(&self, key: &str) -> StorageResult<KeyInfo> {
        self.kv.stat(key).await
    }
}

#[async_trait]
impl LeaseLocker for CertStorage {
    async fn acquire(&self, key: &str) -> StorageResult<()> {
        self.leases.acquire(key).await
    }

    async fn release(&self, key: &str) -> StorageResult<()> {
        self.leases.release(key).await
    }
}

#[async_trait]
impl Storage for CertStorage {
    async fn close(&self) {
        CertStorage::close(self).await
    }
}
