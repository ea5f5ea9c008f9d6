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

//! Backend clock helpers.
//!
//! Every "now" used by the store is read from the database, never from the
//! local process, so callers with skewed clocks agree on which lease is
//! active. SQLite has no timestamp-with-zone type; it stores Unix epoch
//! milliseconds produced by [`sqlite_now_millis!`].

use crate::{StorageError, StorageResult};
use chrono::{DateTime, Utc};

/// SQLite expression for the current Unix time in milliseconds.
///
/// Expands to a string literal so it can be spliced into queries with
/// `concat!`.
#[macro_export]
macro_rules! sqlite_now_millis {
    () => {
        "CAST(ROUND((julianday('now') - 2440587.5) * 86400000.0) AS INTEGER)"
    };
}

/// Convert epoch milliseconds read from SQLite into a UTC timestamp.
pub fn from_epoch_millis(millis: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        StorageError::backend(
            "decode timestamp",
            sqlx::Error::Decode(format!("timestamp out of range: {millis}").into()),
        )
    })
}
