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

//! Data table commands

use anyhow::{bail, Context, Result};
use certkv::{CertStorage, KeyValueStore};
use std::io::Write;
use std::path::Path;

pub async fn get(storage: &CertStorage, key: &str, output: Option<&Path>) -> Result<()> {
    let value = storage
        .get(key)
        .await
        .with_context(|| format!("Failed to read {key}"))?;

    match output {
        Some(path) => tokio::fs::write(path, &value)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&value)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

pub async fn put(
    storage: &CertStorage,
    key: &str,
    value: Option<&str>,
    file: Option<&Path>,
) -> Result<()> {
    let bytes = match (value, file) {
        (_, Some(path)) => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (Some(value), None) => value.as_bytes().to_vec(),
        (None, None) => bail!("a value or --file is required"),
    };

    storage
        .put(key, &bytes)
        .await
        .with_context(|| format!("Failed to store {key}"))?;
    println!("Stored {key} ({} bytes)", bytes.len());
    Ok(())
}

pub async fn delete(storage: &CertStorage, key: &str) -> Result<()> {
    storage
        .delete(key)
        .await
        .with_context(|| format!("Failed to delete {key}"))?;
    println!("Deleted {key}");
    Ok(())
}

pub async fn exists(storage: &CertStorage, key: &str) -> Result<()> {
    let found = storage
        .try_exists(key)
        .await
        .with_context(|| format!("Failed to check {key}"))?;
    if !found {
        bail!("{key} does not exist");
    }
    println!("{key} exists");
    Ok(())
}

pub async fn list(storage: &CertStorage, prefix: &str, recursive: bool) -> Result<()> {
    let keys = storage
        .list(prefix, recursive)
        .await
        .context("Failed to list keys")?;
    for key in keys {
        println!("{key}");
    }
    Ok(())
}

pub async fn stat(storage: &CertStorage, key: &str) -> Result<()> {
    let info = storage
        .stat(key)
        .await
        .with_context(|| format!("Failed to stat {key}"))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
