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

//! Connection pool shared by the key-value store and the lease manager.
//!
//! ## Design
//! - One pool per store instance, no process-wide state
//! - Backend chosen from the URL scheme (`postgres://`, `postgresql://`, `sqlite:`)
//! - Initial connectivity probe with its own fixed timeout
//! - Schema bootstrap with `CREATE TABLE IF NOT EXISTS`

use crate::deadline::with_deadline;
use crate::error::backend;
use crate::{StorageConfig, StorageError, StorageResult};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Connection;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Deadline for the connectivity probe made while constructing a store.
pub const CONNECT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long SQLite waits on another writer before reporting busy.
const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const POSTGRES_SCHEMA: &str = include_str!("../schema/postgres.sql");
const SQLITE_SCHEMA: &str = include_str!("../schema/sqlite.sql");

/// Relational backend behind a [`SqlPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    /// PostgreSQL (multi-process, production)
    Postgres,
    /// SQLite (embedded, single host)
    Sqlite,
}

impl DatabaseKind {
    /// Detect the backend from a connection URL.
    pub fn from_url(url: &str) -> StorageResult<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(StorageError::InvalidConfig(
                "connection string must not be empty".to_string(),
            ));
        }
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(DatabaseKind::Postgres)
        } else if url.starts_with("sqlite:") {
            Ok(DatabaseKind::Sqlite)
        } else {
            Err(StorageError::InvalidConfig(format!(
                "unsupported connection string scheme: {}",
                url.split(':').next().unwrap_or_default()
            )))
        }
    }
}

/// SQL connection pool (PostgreSQL or SQLite).
///
/// Cloning is cheap and clones share the same underlying connections.
#[derive(Debug, Clone)]
pub enum SqlPool {
    /// PostgreSQL connection pool
    Postgres(PgPool),
    /// SQLite connection pool
    Sqlite(SqlitePool),
}

impl From<PgPool> for SqlPool {
    fn from(pool: PgPool) -> Self {
        SqlPool::Postgres(pool)
    }
}

impl From<SqlitePool> for SqlPool {
    fn from(pool: SqlitePool) -> Self {
        SqlPool::Sqlite(pool)
    }
}

impl SqlPool {
    /// Build a pool without touching the network.
    pub fn connect_lazy(config: &StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        let url = config.connection_string.trim();

        match DatabaseKind::from_url(url)? {
            DatabaseKind::Postgres => {
                let options = PgConnectOptions::from_str(url).map_err(|e| {
                    StorageError::InvalidConfig(format!("invalid PostgreSQL connection string: {e}"))
                })?;
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(config.query_timeout)
                    .connect_lazy_with(options);
                Ok(SqlPool::Postgres(pool))
            }
            DatabaseKind::Sqlite => {
                let options = SqliteConnectOptions::from_str(url)
                    .map_err(|e| {
                        StorageError::InvalidConfig(format!("invalid SQLite connection string: {e}"))
                    })?
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .busy_timeout(SQLITE_BUSY_TIMEOUT);
                let pool = SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(config.query_timeout)
                    .connect_lazy_with(options);
                Ok(SqlPool::Sqlite(pool))
            }
        }
    }

    /// Build a pool, probe the backend and bootstrap the schema.
    ///
    /// A backend that does not answer within [`CONNECT_PROBE_TIMEOUT`] fails
    /// construction.
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &StorageConfig) -> StorageResult<Self> {
        let pool = Self::connect_lazy(config)?;

        if let Err(e) = with_deadline(CONNECT_PROBE_TIMEOUT, "ping database", pool.ping()).await {
            pool.close().await;
            return Err(e);
        }

        if config.ensure_schema {
            if let Err(e) =
                with_deadline(CONNECT_PROBE_TIMEOUT, "create schema", pool.ensure_schema()).await
            {
                pool.close().await;
                return Err(e);
            }
        }

        info!(backend = ?pool.kind(), "Connected to storage backend");
        Ok(pool)
    }

    /// Backend kind of this pool.
    pub fn kind(&self) -> DatabaseKind {
        match self {
            SqlPool::Postgres(_) => DatabaseKind::Postgres,
            SqlPool::Sqlite(_) => DatabaseKind::Sqlite,
        }
    }

    /// Round-trip a ping over one pooled connection.
    pub async fn ping(&self) -> StorageResult<()> {
        match self {
            SqlPool::Postgres(pool) => {
                let mut conn = pool.acquire().await.map_err(backend("acquire conn"))?;
                conn.ping().await.map_err(backend("ping database"))
            }
            SqlPool::Sqlite(pool) => {
                let mut conn = pool.acquire().await.map_err(backend("acquire conn"))?;
                conn.ping().await.map_err(backend("ping database"))
            }
        }
    }

    /// Create the data and lock tables if they do not exist.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        match self {
            SqlPool::Postgres(pool) => {
                sqlx::raw_sql(POSTGRES_SCHEMA)
                    .execute(pool)
                    .await
                    .map_err(backend("create schema"))?;
            }
            SqlPool::Sqlite(pool) => {
                sqlx::raw_sql(SQLITE_SCHEMA)
                    .execute(pool)
                    .await
                    .map_err(backend("create schema"))?;
            }
        }
        debug!(backend = ?self.kind(), "Schema ready");
        Ok(())
    }

    /// Close every pooled connection. Further calls are no-ops.
    pub async fn close(&self) {
        match self {
            SqlPool::Postgres(pool) => pool.close().await,
            SqlPool::Sqlite(pool) => pool.close().await,
        }
    }

    /// `true` once [`SqlPool::close`] has been called.
    pub fn is_closed(&self) -> bool {
        match self {
            SqlPool::Postgres(pool) => pool.is_closed(),
            SqlPool::Sqlite(pool) => pool.is_closed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_url() {
        assert_eq!(
            DatabaseKind::from_url("postgres://localhost/certs").unwrap(),
            DatabaseKind::Postgres
        );
        assert_eq!(
            DatabaseKind::from_url("postgresql://localhost/certs").unwrap(),
            DatabaseKind::Postgres
        );
        assert_eq!(
            DatabaseKind::from_url("sqlite::memory:").unwrap(),
            DatabaseKind::Sqlite
        );
        assert!(matches!(
            DatabaseKind::from_url("mysql://localhost/certs"),
            Err(StorageError::InvalidConfig(_))
        ));
        assert!(matches!(
            DatabaseKind::from_url(""),
            Err(StorageError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_sqlite_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("certs.db").display());
        let pool = SqlPool::connect(&StorageConfig::new(url)).await.unwrap();
        assert_eq!(pool.kind(), DatabaseKind::Sqlite);

        let SqlPool::Sqlite(inner) = &pool else {
            panic!("expected SQLite pool");
        };
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'certmagic_%' ORDER BY name",
        )
        .fetch_all(inner)
        .await
        .unwrap();
        assert_eq!(
            tables,
            vec![
                ("certmagic_data".to_string(),),
                ("certmagic_locks".to_string(),)
            ]
        );

        pool.close().await;
        assert!(pool.is_closed());
        pool.close().await;
    }

    #[tokio::test]
    async fn test_connect_unreachable_postgres_fails() {
        let config = StorageConfig::new("postgres://certkv@127.0.0.1:1/certs")
            .with_query_timeout("1s")
            .unwrap();
        let err = SqlPool::connect(&config).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend { .. }));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let err = SqlPool::connect(&StorageConfig::new("")).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfig(_)));
    }
}
