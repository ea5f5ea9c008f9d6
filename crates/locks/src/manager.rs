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

//! Lease locker trait for mutual exclusion between cooperating processes.

use async_trait::async_trait;
use certkv_common::StorageResult;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Trait for try-once, expiry-based exclusive leases.
///
/// ## Design
/// - **Acquire**: grant a lease if no unexpired one exists, else fail with
///   `StorageError::Locked`. Never waits; callers that want backoff loop
///   externally.
/// - **Release**: delete the lease unconditionally. There is no ownership
///   check, so a release must pair with a successful acquire.
/// - **Expiry**: an abandoned lease is superseded lazily by the next acquire
///   of the same key after its expiry. Nothing sweeps the table.
///
/// ## Example
/// ```rust,ignore
/// locker.acquire("issue_cert_example.com").await?;
/// let result = issue_certificate().await;
/// locker.release("issue_cert_example.com").await?;
/// result?;
/// ```
#[async_trait]
pub trait LeaseLocker: Send + Sync {
    /// Acquire the lease for `key` using the configured duration and deadline.
    ///
    /// ## Returns
    /// - `Ok(())`: lease granted
    /// - `Err(StorageError::Locked)`: an unexpired lease exists, including one
    ///   this caller already holds
    /// - `Err(StorageError::Backend)`: backend or commit failure; no lease was
    ///   granted
    async fn acquire(&self, key: &str) -> StorageResult<()>;

    /// Release the lease for `key`. Releasing an absent lease succeeds.
    async fn release(&self, key: &str) -> StorageResult<()>;
}

/// Snapshot of a lease row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lease {
    /// Protected resource
    pub key: String,
    /// Time after which the lease may be taken by another acquirer
    pub expires: DateTime<Utc>,
    /// `expires` was still in the future according to the backend clock
    pub active: bool,
}
