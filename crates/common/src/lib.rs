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

//! # certkv Common
//!
//! ## Purpose
//! Plumbing shared by the key-value store and the lease manager: the error
//! taxonomy, construction-time configuration, the SQL connection pool and
//! the bounded-time wrapper every operation runs under.
//!
//! ## Architecture Context
//! - **certkv-keyvalue**: data table CRUD and prefix enumeration
//! - **certkv-locks**: lease table acquisition and release
//! - **certkv**: capability object combining both over one pool
//!
//! Both components use one pool and one error type, so callers can apply the
//! same timeout and retry policy to either.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod deadline;
pub mod error;
pub mod pool;

pub use config::{StorageConfig, DEFAULT_LOCK_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_QUERY_TIMEOUT};
pub use deadline::with_deadline;
pub use error::{BackendFailure, StorageError, StorageResult};
pub use pool::{DatabaseKind, SqlPool, CONNECT_PROBE_TIMEOUT};
