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

//! SQL-based lease manager (PostgreSQL and SQLite).
//!
//! ## Schema
//! ```sql
//! -- PostgreSQL
//! CREATE TABLE certmagic_locks (
//!     key TEXT PRIMARY KEY,
//!     expires TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
//! );
//! ```
//!
//! SQLite stores `expires` as Unix epoch milliseconds from the database clock.
//!
//! ## Acquisition
//! One transaction whose only statement is a conditional upsert:
//!
//! ```sql
//! INSERT INTO certmagic_locks (key, expires) VALUES ($1, now + lease)
//! ON CONFLICT (key) DO UPDATE SET expires = EXCLUDED.expires
//! WHERE certmagic_locks.expires <= now
//! ```
//!
//! A row is written only when none exists or the existing one has expired.
//! Zero affected rows means an unexpired lease is in place. The row lock
//! taken by the upsert serializes racing acquirers, so exactly one of them
//! observes an affected row.

use crate::{Lease, LeaseLocker};
use async_trait::async_trait;
use certkv_common::clock::from_epoch_millis;
use certkv_common::error::backend;
use certkv_common::{sqlite_now_millis, with_deadline, SqlPool, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, instrument};

/// SQL-backed lease manager.
///
/// Holds only a pool handle and its timeouts; clones share the pool.
#[derive(Debug, Clone)]
pub struct SqlLeaseManager {
    pool: SqlPool,
    lock_timeout: Duration,
    query_timeout: Duration,
}

impl SqlLeaseManager {
    /// Create a lease manager over an already connected pool.
    ///
    /// `lock_timeout` is the lease duration granted by [`LeaseLocker::acquire`];
    /// `query_timeout` bounds every call.
    pub fn new(pool: SqlPool, lock_timeout: Duration, query_timeout: Duration) -> Self {
        Self {
            pool,
            lock_timeout,
            query_timeout,
        }
    }

    /// Lease duration granted by [`LeaseLocker::acquire`].
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Deadline applied to every call.
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Acquire `key` for `lease`, giving up after `deadline`.
    ///
    /// The new expiry is `backend now + lease`. On `Locked`, timeout or any
    /// backend error the transaction is rolled back and no lease is granted.
    #[instrument(skip(self), fields(lock_key = %key))]
    pub async fn acquire_with(
        &self,
        key: &str,
        lease: Duration,
        deadline: Duration,
    ) -> StorageResult<()> {
        with_deadline(deadline, "acquire lease", async {
            let granted = match &self.pool {
                SqlPool::Postgres(pool) => {
                    let mut tx = pool.begin().await.map_err(backend("begin tx"))?;
                    let affected = sqlx::query(
                        r#"INSERT INTO certmagic_locks (key, expires)
                           VALUES ($1, CURRENT_TIMESTAMP + make_interval(secs => $2))
                           ON CONFLICT (key) DO UPDATE SET expires = EXCLUDED.expires
                           WHERE certmagic_locks.expires <= CURRENT_TIMESTAMP"#,
                    )
                    .bind(key)
                    .bind(lease.as_secs_f64())
                    .execute(&mut *tx)
                    .await
                    .map_err(backend("upsert lease"))?
                    .rows_affected();

                    if affected == 0 {
                        tx.rollback().await.map_err(backend("rollback tx"))?;
                        false
                    } else {
                        tx.commit().await.map_err(backend("commit tx"))?;
                        true
                    }
                }
                SqlPool::Sqlite(pool) => {
                    let lease_millis = i64::try_from(lease.as_millis()).map_err(|_| {
                        StorageError::InvalidConfig(format!("lease duration too large: {lease:?}"))
                    })?;

                    let mut tx = pool.begin().await.map_err(backend("begin tx"))?;
                    let affected = sqlx::query(concat!(
                        "INSERT INTO certmagic_locks (key, expires) VALUES (?1, ",
                        sqlite_now_millis!(),
                        " + ?2) ON CONFLICT(key) DO UPDATE SET expires = excluded.expires",
                        " WHERE certmagic_locks.expires <= ",
                        sqlite_now_millis!()
                    ))
                    .bind(key)
                    .bind(lease_millis)
                    .execute(&mut *tx)
                    .await
                    .map_err(backend("upsert lease"))?
                    .rows_affected();

                    if affected == 0 {
                        tx.rollback().await.map_err(backend("rollback tx"))?;
                        false
                    } else {
                        tx.commit().await.map_err(backend("commit tx"))?;
                        true
                    }
                }
            };

            if !granted {
                debug!("Lease held by another acquirer");
                return Err(StorageError::Locked(key.to_string()));
            }
            debug!(lease_ms = lease.as_millis() as u64, "Lease acquired");
            Ok(())
        })
        .await
    }

    /// Current lease row for `key`, if any.
    ///
    /// An expired row that no acquirer has replaced yet is returned with
    /// `active == false`.
    #[instrument(skip(self), fields(lock_key = %key))]
    pub async fn lease(&self, key: &str) -> StorageResult<Option<Lease>> {
        with_deadline(self.query_timeout, "inspect lease", async {
            match &self.pool {
                SqlPool::Postgres(pool) => {
                    let row = sqlx::query(
                        r#"SELECT expires::TIMESTAMPTZ AS expires,
                                  expires > CURRENT_TIMESTAMP AS active
                           FROM certmagic_locks WHERE key = $1"#,
                    )
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(backend("select lease"))?;

                    row.map(|row| {
                        Ok::<_, StorageError>(Lease {
                            key: key.to_string(),
                            expires: row
                                .try_get::<DateTime<Utc>, _>("expires")
                                .map_err(backend("decode expires"))?,
                            active: row.try_get::<bool, _>("active").map_err(backend("decode active"))?,
                        })
                    })
                    .transpose()
                }
                SqlPool::Sqlite(pool) => {
                    let row = sqlx::query(concat!(
                        "SELECT expires, expires > ",
                        sqlite_now_millis!(),
                        " AS active FROM certmagic_locks WHERE key = ?1"
                    ))
                    .bind(key)
                    .fetch_optional(pool)
                    .await
                    .map_err(backend("select lease"))?;

                    row.map(|row| {
                        let millis = row.try_get::<i64, _>("expires").map_err(backend("decode expires"))?;
                        let active = row.try_get::<i64, _>("active").map_err(backend("decode active"))?;
                        Ok::<_, StorageError>(Lease {
                            key: key.to_string(),
                            expires: from_epoch_millis(millis)?,
                            active: active != 0,
                        })
                    })
                    .transpose()
                }
            }
        })
        .await
    }
}

#[async_trait]
impl LeaseLocker for SqlLeaseManager {
    async fn acquire(&self, key: &str) -> StorageResult<()> {
        self.acquire_with(key, self.lock_timeout, self.query_timeout).await
    }

    #[instrument(skip(self), fields(lock_key = %key))]
    async fn release(&self, key: &str) -> StorageResult<()> {
        with_deadline(self.query_timeout, "release lease", async {
            let released = match &self.pool {
                SqlPool::Postgres(pool) => sqlx::query("DELETE FROM certmagic_locks WHERE key = $1")
                    .bind(key)
                    .execute(pool)
                    .await
                    .map_err(backend("delete lease"))?
                    .rows_affected(),
                SqlPool::Sqlite(pool) => sqlx::query("DELETE FROM certmagic_locks WHERE key = ?1")
                    .bind(key)
                    .execute(pool)
                    .await
                    .map_err(backend("delete lease"))?
                    .rows_affected(),
            };
            debug!(released, "Lease released");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certkv_common::StorageConfig;

    async fn memory_manager() -> SqlLeaseManager {
        let config = StorageConfig::new("sqlite::memory:");
        let pool = SqlPool::connect(&config).await.unwrap();
        SqlLeaseManager::new(pool, config.lock_timeout, config.query_timeout)
    }

    #[tokio::test]
    async fn test_acquire_then_locked() {
        let leases = memory_manager().await;

        leases.acquire("issue_cert_a").await.unwrap();
        let err = leases.acquire("issue_cert_a").await.unwrap_err();
        assert!(err.is_locked());
    }

    #[tokio::test]
    async fn test_lease_snapshot() {
        let leases = memory_manager().await;
        assert!(leases.lease("k").await.unwrap().is_none());

        leases.acquire("k").await.unwrap();
        let lease = leases.lease("k").await.unwrap().unwrap();
        assert_eq!(lease.key, "k");
        assert!(lease.active);
        assert!(lease.expires > Utc::now());

        leases.release("k").await.unwrap();
        assert!(leases.lease("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_release_absent_is_ok() {
        let leases = memory_manager().await;
        leases.release("never-acquired").await.unwrap();
    }
}
