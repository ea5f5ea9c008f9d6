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

//! # certkv Leases
//!
//! ## Purpose
//! Short-lived named leases that let one process at a time perform a given
//! critical operation (certificate issuance, renewal) while many share the
//! same backend.
//!
//! ## Design Decisions
//! - **Try-once**: acquisition never queues or blocks on a holder
//! - **Backend clock**: expiry is computed and compared by the database, so
//!   clock skew between processes cannot produce two active holders
//! - **Lazy expiry**: a crashed holder's lease is overwritten by the next
//!   acquirer once expired; there is no background reaper
//! - **Separate keyspace**: lease keys live in their own table and never
//!   collide with stored data keys
//!
//! ## Examples
//! ```rust,no_run
//! use certkv_common::{SqlPool, StorageConfig};
//! use certkv_locks::{LeaseLocker, SqlLeaseManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StorageConfig::new("postgres://localhost/certs");
//! let pool = SqlPool::connect(&config).await?;
//! let leases = SqlLeaseManager::new(pool, config.lock_timeout, config.query_timeout);
//!
//! leases.acquire("renew_example.com").await?;
//! // ... critical section ...
//! leases.release("renew_example.com").await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod sql;

pub use manager::{Lease, LeaseLocker};
pub use sql::SqlLeaseManager;
