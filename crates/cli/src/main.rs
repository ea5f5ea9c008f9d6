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

//! certkv CLI Tool
//!
//! ## Purpose
//! Operator tool for the shared certificate store:
//! - Read, write and enumerate stored keys
//! - Inspect, take and clear leases (e.g. after a crashed renewal)
//!
//! Connection settings come from flags or `CERTKV_*` environment variables.

use anyhow::{Context, Result};
use certkv::{CertStorage, StorageConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod data;
mod lease;

#[derive(Parser)]
#[command(name = "certkv")]
#[command(about = "certkv CLI - Inspect and manage shared certificate storage", long_about = None)]
struct Cli {
    /// Database URL (postgres://... or sqlite:...)
    #[arg(long, env = "CERTKV_CONNECTION_STRING", hide_env_values = true)]
    connection_string: String,

    /// Per-operation deadline (e.g. 3s, 500ms)
    #[arg(long, env = "CERTKV_QUERY_TIMEOUT")]
    query_timeout: Option<String>,

    /// Lease duration granted by `lock` (e.g. 60s, 2m)
    #[arg(long, env = "CERTKV_LOCK_TIMEOUT")]
    lock_timeout: Option<String>,

    /// Skip creating the tables on connect
    #[arg(long)]
    no_create_schema: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the value stored under a key
    Get {
        /// Key to read
        key: String,

        /// Write the value to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Store a value under a key, replacing any previous value
    Put {
        /// Key to write
        key: String,

        /// Value (UTF-8); use --file for binary content
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        value: Option<String>,

        /// Read the value from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Delete a key (succeeds if absent)
    Delete {
        /// Key to delete
        key: String,
    },

    /// Exit 0 if the key exists, 1 otherwise
    Exists {
        /// Key to check
        key: String,
    },

    /// List keys starting with a prefix
    List {
        /// Literal prefix (empty lists every key)
        #[arg(default_value = "")]
        prefix: String,

        /// Recursive listing (not supported by this store)
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show size and modification time of a key as JSON
    Stat {
        /// Key to inspect
        key: String,
    },

    /// Try once to take the lease for a key
    Lock {
        /// Lease name
        key: String,
    },

    /// Clear the lease for a key regardless of holder
    Unlock {
        /// Lease name
        key: String,
    },

    /// Show the lease row for a key as JSON
    Lease {
        /// Lease name
        key: String,
    },
}

impl Cli {
    fn storage_config(&self) -> Result<StorageConfig> {
        let mut config = StorageConfig::new(self.connection_string.clone())
            .with_ensure_schema(!self.no_create_schema);
        if let Some(timeout) = &self.query_timeout {
            config = config.with_query_timeout(timeout)?;
        }
        if let Some(timeout) = &self.lock_timeout {
            config = config.with_lock_timeout(timeout)?;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    certkv::telemetry::init_tracing()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize tracing")?;

    let config = cli.storage_config()?;
    let storage = CertStorage::connect(&config)
        .await
        .context("Failed to connect to storage")?;

    let result = run(&storage, cli.command).await;
    storage.close().await;
    result
}

async fn run(storage: &CertStorage, command: Commands) -> Result<()> {
    match command {
        Commands::Get { key, output } => data::get(storage, &key, output.as_deref()).await,
        Commands::Put { key, value, file } => {
            data::put(storage, &key, value.as_deref(), file.as_deref()).await
        }
        Commands::Delete { key } => data::delete(storage, &key).await,
        Commands::Exists { key } => data::exists(storage, &key).await,
        Commands::List { prefix, recursive } => data::list(storage, &prefix, recursive).await,
        Commands::Stat { key } => data::stat(storage, &key).await,
        Commands::Lock { key } => lease::lock(storage, &key).await,
        Commands::Unlock { key } => lease::unlock(storage, &key).await,
        Commands::Lease { key } => lease::show(storage, &key).await,
    }
}
