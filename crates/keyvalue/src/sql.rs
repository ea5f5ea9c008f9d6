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

//! SQL-based KeyValue store (PostgreSQL and SQLite).
//!
//! ## Schema
//! ```sql
//! -- PostgreSQL
//! CREATE TABLE certmagic_data (
//!     key TEXT PRIMARY KEY,
//!     value BYTEA NOT NULL,
//!     modified TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
//! );
//! ```
//!
//! SQLite uses `BLOB` for the value and stores `modified` as Unix epoch
//! milliseconds taken from the database clock.
//!
//! ## Guarantees
//! - `put()` is one conditional-write statement: conflict detection and
//!   replacement happen atomically, never read-then-write
//! - `list()` binds the escaped prefix as a parameter and orders by byte value
//! - Every operation runs under the query deadline; expiry drops the
//!   in-flight statement

use crate::pattern::{glob_prefix_pattern, like_prefix_pattern};
use crate::{KeyInfo, KeyValueStore};
use async_trait::async_trait;
use certkv_common::clock::from_epoch_millis;
use certkv_common::error::backend;
use certkv_common::{sqlite_now_millis, with_deadline, SqlPool, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// SQL-backed KeyValue store.
///
/// Holds only a pool handle and the query deadline; clones share the pool.
#[derive(Debug, Clone)]
pub struct SqlKeyValueStore {
    pool: SqlPool,
    query_timeout: Duration,
}

impl SqlKeyValueStore {
    /// Create a store over an already connected pool.
    pub fn new(pool: SqlPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    /// Deadline applied to every operation.
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Existence check that surfaces backend failures.
    ///
    /// [`KeyValueStore::exists`] collapses errors into `false`; use this when
    /// the difference matters.
    pub async fn try_exists(&self, key: &str) -> StorageResult<bool> {
        with_deadline(self.query_timeout, "exists", async {
            let found = match &self.pool {
                SqlPool::Postgres(pool) => sqlx::query("SELECT 1 FROM certmagic_data WHERE key = $1")
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(backend("select key"))?
                    .is_some(),
                SqlPool::Sqlite(pool) => sqlx::query("SELECT 1 FROM certmagic_data WHERE key = ?1")
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(backend("select key"))?
                    .is_some(),
            };
            Ok(found)
        })
        .await
    }
}

#[async_trait]
impl KeyValueStore for SqlKeyValueStore {
    #[instrument(skip(self, value), fields(key = %key, value_size = value.len()))]
    async fn put(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        with_deadline(self.query_timeout, "put", async {
            match &self.pool {
                SqlPool::Postgres(pool) => {
                    sqlx::query(
                        r#"INSERT INTO certmagic_data (key, value, modified)
                           VALUES ($1, $2, CURRENT_TIMESTAMP)
                           ON CONFLICT (key) DO UPDATE SET
                               value = EXCLUDED.value,
                               modified = EXCLUDED.modified"#,
                    )
                    .bind(key)
                    .bind(value)
                    .execute(pool)
                    .await
                    .map_err(backend("upsert value"))?;
                }
                SqlPool::Sqlite(pool) => {
                    sqlx::query(concat!(
                        "INSERT INTO certmagic_data (key, value, modified) VALUES (?1, ?2, ",
                        sqlite_now_millis!(),
                        ") ON CONFLICT(key) DO UPDATE SET value = excluded.value, modified = excluded.modified"
                    ))
                    .bind(key)
                    .bind(value)
                    .execute(pool)
                    .await
                    .map_err(backend("upsert value"))?;
                }
            }
            debug!("Stored value");
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        with_deadline(self.query_timeout, "get", async {
            let value: Option<Vec<u8>> = match &self.pool {
                SqlPool::Postgres(pool) => sqlx::query("SELECT value FROM certmagic_data WHERE key = $1")
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(backend("select value"))?
                    .map(|row| row.try_get::<Vec<u8>, _>("value"))
                    .transpose()
                    .map_err(backend("decode value"))?,
                SqlPool::Sqlite(pool) => sqlx::query("SELECT value FROM certmagic_data WHERE key = ?1")
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(backend("select value"))?
                    .map(|row| row.try_get::<Vec<u8>, _>("value"))
                    .transpose()
                    .map_err(backend("decode value"))?,
            };

            value.ok_or_else(|| StorageError::NotFound(key.to_string()))
        })
        .await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        with_deadline(self.query_timeout, "delete", async {
            let deleted = match &self.pool {
                SqlPool::Postgres(pool) => sqlx::query("DELETE FROM certmagic_data WHERE key = $1")
                    .bind(key)
                    .execute(pool)
                    .await
                    .map_err(backend("delete value"))?
                    .rows_affected(),
                SqlPool::Sqlite(pool) => sqlx::query("DELETE FROM certmagic_data WHERE key = ?1")
                    .bind(key)
                    .execute(pool)
                    .await
                    .map_err(backend("delete value"))?
                    .rows_affected(),
            };
            debug!(deleted, "Deleted value");
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn exists(&self, key: &str) -> bool {
        match self.try_exists(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Existence check failed, reporting key as absent");
                false
            }
        }
    }

    #[instrument(skip(self), fields(prefix = %prefix))]
    async fn list(&self, prefix: &str, recursive: bool) -> StorageResult<Vec<String>> {
        if recursive {
            return Err(StorageError::Unsupported(
                "recursive listing: keys have no directory structure".to_string(),
            ));
        }

        with_deadline(self.query_timeout, "list", async {
            let keys: Vec<String> = match &self.pool {
                SqlPool::Postgres(pool) => sqlx::query_scalar::<_, String>(
                    r#"SELECT key FROM certmagic_data
                       WHERE key LIKE $1 ESCAPE '\'
                       ORDER BY key COLLATE "C""#,
                )
                .bind(like_prefix_pattern(prefix))
                .fetch_all(pool)
                .await
                .map_err(backend("list keys"))?,
                SqlPool::Sqlite(pool) => sqlx::query_scalar::<_, String>(
                    "SELECT key FROM certmagic_data WHERE key GLOB ?1 ORDER BY key",
                )
                .bind(glob_prefix_pattern(prefix))
                .fetch_all(pool)
                .await
                .map_err(backend("list keys"))?,
            };
            debug!(count = keys.len(), "Listed keys");
            Ok(keys)
        })
        .await
    }

    #[instrument(skip(self), fields(key = %key))]
    async fn stat(&self, key: &str) -> StorageResult<KeyInfo> {
        with_deadline(self.query_timeout, "stat", async {
            let (size, modified): (i64, DateTime<Utc>) = match &self.pool {
                SqlPool::Postgres(pool) => {
                    let row = sqlx::query(
                        r#"SELECT octet_length(value)::BIGINT AS size,
                                  modified::TIMESTAMPTZ AS modified
                           FROM certmagic_data WHERE key = $1"#,
                    )
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(backend("select key info"))?
                    .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

                    (
                        row.try_get::<i64, _>("size").map_err(backend("decode size"))?,
                        row.try_get::<DateTime<Utc>, _>("modified")
                            .map_err(backend("decode modified"))?,
                    )
                }
                SqlPool::Sqlite(pool) => {
                    let row = sqlx::query(
                        r#"SELECT length(CAST(value AS BLOB)) AS size, modified
                           FROM certmagic_data WHERE key = ?1"#,
                    )
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(backend("select key info"))?
                    .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

                    let millis: i64 = row.try_get("modified").map_err(backend("decode modified"))?;
                    (
                        row.try_get::<i64, _>("size").map_err(backend("decode size"))?,
                        from_epoch_millis(millis)?,
                    )
                }
            };

            Ok(KeyInfo {
                key: key.to_string(),
                size: size.max(0) as u64,
                modified,
                is_terminal: true,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certkv_common::StorageConfig;

    async fn memory_store() -> SqlKeyValueStore {
        let config = StorageConfig::new("sqlite::memory:");
        let pool = SqlPool::connect(&config).await.unwrap();
        SqlKeyValueStore::new(pool, config.query_timeout)
    }

    #[tokio::test]
    async fn test_sqlite_basic_operations() {
        let kv = memory_store().await;

        kv.put("key1", b"value1").await.unwrap();
        assert_eq!(kv.get("key1").await.unwrap(), b"value1".to_vec());

        assert!(kv.exists("key1").await);
        assert!(!kv.exists("nonexistent").await);

        kv.delete("key1").await.unwrap();
        assert!(!kv.exists("key1").await);
        assert!(kv.get("key1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_sqlite_recursive_list_unsupported() {
        let kv = memory_store().await;
        kv.put("abc", b"value").await.unwrap();

        let err = kv.list("abc", true).await.unwrap_err();
        assert!(matches!(err, StorageError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_exists_swallows_backend_errors() {
        let kv = memory_store().await;
        kv.put("abc", b"value").await.unwrap();

        kv.pool.close().await;
        assert!(kv.try_exists("abc").await.is_err());
        assert!(!kv.exists("abc").await);
    }
}
