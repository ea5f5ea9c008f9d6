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

//! Lease table commands

use anyhow::{Context, Result};
use certkv::{CertStorage, LeaseLocker};
use tracing::warn;

pub async fn lock(storage: &CertStorage, key: &str) -> Result<()> {
    storage
        .acquire(key)
        .await
        .with_context(|| format!("Failed to lock {key}"))?;
    println!(
        "Locked {key} for {}",
        humantime::format_duration(storage.leases().lock_timeout())
    );
    Ok(())
}

pub async fn unlock(storage: &CertStorage, key: &str) -> Result<()> {
    if let Some(lease) = storage.lease(key).await? {
        if lease.active {
            warn!(lock_key = %key, expires = %lease.expires, "Clearing an active lease");
        }
    }
    storage
        .release(key)
        .await
        .with_context(|| format!("Failed to unlock {key}"))?;
    println!("Unlocked {key}");
    Ok(())
}

pub async fn show(storage: &CertStorage, key: &str) -> Result<()> {
    match storage.lease(key).await? {
        Some(lease) => println!("{}", serde_json::to_string_pretty(&lease)?),
        None => println!("No lease for {key}"),
    }
    Ok(())
}
