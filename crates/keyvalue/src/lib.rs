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

//! # certkv KeyValue Store
//!
//! ## Purpose
//! Durable mapping from string key to opaque bytes with a last-modified
//! timestamp. Certificates, private keys and ACME account metadata are
//! stored here by every cooperating process.
//!
//! ## Architecture Context
//! Leaf component: the store never calls into the lease manager. Both share
//! the [`SqlPool`](certkv_common::SqlPool) and the error taxonomy from
//! `certkv-common`.
//!
//! ## Key Components
//! - [`KeyValueStore`]: operations every backend provides
//! - [`SqlKeyValueStore`]: PostgreSQL / SQLite implementation
//! - [`KeyInfo`]: metadata returned by `stat()`
//!
//! ## Key Semantics
//! Keys are opaque strings. `list()` matches a literal textual prefix and has
//! no notion of directories, so every key is terminal.
//!
//! ## Examples
//! ```rust,no_run
//! use certkv_common::{SqlPool, StorageConfig};
//! use certkv_keyvalue::{KeyValueStore, SqlKeyValueStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig::new("sqlite::memory:");
//! let pool = SqlPool::connect(&config).await?;
//! let kv = SqlKeyValueStore::new(pool, config.query_timeout);
//!
//! kv.put("certificates/example.com.crt", b"-----BEGIN CERTIFICATE-----").await?;
//! let keys = kv.list("certificates/", false).await?;
//! assert_eq!(keys, vec!["certificates/example.com.crt".to_string()]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use async_trait::async_trait;
use certkv_common::StorageResult;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod pattern;
pub mod sql;

pub use sql::SqlKeyValueStore;

/// KeyValue store trait.
///
/// Every call is a single round-trip to the backend under the configured
/// query deadline. Nothing is cached in memory.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Upsert `value` at `key`, refreshing its modified time.
    ///
    /// Never fails because the key already exists.
    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()>;

    /// Load the value at `key`.
    ///
    /// ## Returns
    /// - `Ok(value)` if key exists
    /// - `Err(StorageError::NotFound)` if key does not exist
    /// - `Err(StorageError::Backend)` on any other failure
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Delete `key`. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// `true` if `key` exists.
    ///
    /// Failures are reported as `false`; this call cannot tell "absent"
    /// from "error".
    async fn exists(&self, key: &str) -> bool;

    /// Keys starting with the literal `prefix`, ascending.
    ///
    /// `recursive = true` always fails with `StorageError::Unsupported`.
    async fn list(&self, prefix: &str, recursive: bool) -> StorageResult<Vec<String>>;

    /// Size and modified time of the value at `key`.
    ///
    /// `Err(StorageError::NotFound)` if key does not exist.
    async fn stat(&self, key: &str) -> StorageResult<KeyInfo>;
}

/// Metadata about a stored key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    /// The key
    pub key: String,
    /// Byte length of the current value
    pub size: u64,
    /// Time of the most recent successful write (backend clock)
    pub modified: DateTime<Utc>,
    /// Always `true`: this store has no directory-like keys
    pub is_terminal: bool,
}
