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

//! Error taxonomy shared by the key-value store and the lease manager.
//!
//! Callers branch on the variant, never on message text. `NotFound` in
//! particular must stay distinguishable so "create if absent" logic works.

use std::time::Duration;
use thiserror::Error;

/// Result type for storage and lock operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage and lock operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Key not found (Get/Stat on an absent key)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// An unexpired lease already exists for the key
    #[error("Key is locked: {0}")]
    Locked(String),

    /// Operation not supported by this store
    #[error("Operation not supported: {0}")]
    Unsupported(String),

    /// Invalid construction-time configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transport, driver, transaction or timeout failure
    #[error("Backend error: {context}: {source}")]
    Backend {
        /// What the store was doing when the backend failed
        context: String,
        /// Underlying cause
        #[source]
        source: BackendFailure,
    },
}

/// Underlying cause of a [`StorageError::Backend`] failure.
#[derive(Error, Debug)]
pub enum BackendFailure {
    /// Error reported by the database driver
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    /// The operation deadline elapsed before the backend answered
    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),
}

impl StorageError {
    /// Wrap a driver error with the step that produced it.
    pub fn backend(context: impl Into<String>, err: sqlx::Error) -> Self {
        StorageError::Backend {
            context: context.into(),
            source: BackendFailure::Sql(err),
        }
    }

    /// Timeout-flavored backend failure.
    pub fn timeout(context: impl Into<String>, after: Duration) -> Self {
        StorageError::Backend {
            context: context.into(),
            source: BackendFailure::Timeout(after),
        }
    }

    /// `true` for [`StorageError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// `true` for [`StorageError::Locked`].
    pub fn is_locked(&self) -> bool {
        matches!(self, StorageError::Locked(_))
    }

    /// `true` when the backend did not answer within the deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            StorageError::Backend {
                source: BackendFailure::Timeout(_),
                ..
            }
        )
    }
}

/// Build a `map_err` adapter that tags driver errors with `context`.
///
/// ```rust
/// use certkv_common::error::backend;
/// # fn example(r: Result<(), sqlx::Error>) -> certkv_common::StorageResult<()> {
/// r.map_err(backend("commit tx"))?;
/// # Ok(())
/// # }
/// ```
pub fn backend(context: &'static str) -> impl FnOnce(sqlx::Error) -> StorageError {
    move |err| StorageError::backend(context, err)
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinguishable() {
        let not_found = StorageError::NotFound("abc".to_string());
        assert!(not_found.is_not_found());
        assert!(!not_found.is_locked());
        assert!(!not_found.is_timeout());

        let locked = StorageError::Locked("abc".to_string());
        assert!(locked.is_locked());
        assert!(!locked.is_not_found());
    }

    #[test]
    fn test_timeout_is_backend_failure() {
        let err = StorageError::timeout("get", Duration::from_secs(3));
        assert!(err.is_timeout());
        assert!(matches!(err, StorageError::Backend { .. }));
        assert!(err.to_string().contains("get"));
    }

    #[test]
    fn test_backend_error_keeps_cause() {
        let err = backend("select lock")(sqlx::Error::RowNotFound);
        let source = std::error::Error::source(&err).expect("cause is preserved");
        assert!(source.to_string().contains("no rows"));
        assert!(!err.is_timeout());
    }
}
