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

//! Bounded-time execution of backend operations.

use crate::{StorageError, StorageResult};
use std::future::Future;
use std::time::Duration;

/// Run `op` under `deadline`, mapping expiry to a timeout-flavored
/// [`StorageError::Backend`].
///
/// On expiry the operation future is dropped. An open transaction inside it
/// is rolled back by the driver, so no partial write survives.
pub async fn with_deadline<T, F>(deadline: Duration, context: &'static str, op: F) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    match tokio::time::timeout(deadline, op).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(context, ?deadline, "Operation deadline exceeded");
            Err(StorageError::timeout(context, deadline))
        }
    }
}
