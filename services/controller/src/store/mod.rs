//! State store contract and adapters.
//!
//! The reconciler keeps its rollout state as named string parameters in an
//! external key-value store. The contract is deliberately small:
//!
//! - `get` returns `None` for a missing key; that is the "uninitialized"
//!   signal that triggers bootstrap, not an error
//! - writes are read-after-write consistent within a pass
//! - `write_batch` applies a set of writes; adapters with transactions apply
//!   it atomically
//! - a lease per pool serializes read-modify-write cycles across processes
//!
//! Two adapters ship with the controller: an embedded SQLite store and an
//! in-memory store for tests.

mod keys;
mod memory;
mod sqlite;

use std::time::Duration;

use async_trait::async_trait;
use bgpool_id::HolderId;
use thiserror::Error;

pub use keys::{StateKeys, DEFAULT_KEY_PREFIX};
pub use memory::InMemoryStateStore;
pub use sqlite::SqliteStateStore;

/// Errors from state store operations. All of them are fatal for a pass.
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("store {op} timed out after {timeout:?} ({key})")]
    Timeout {
        op: &'static str,
        key: String,
        timeout: Duration,
    },

    #[error("store lock poisoned")]
    Lock,
}

/// One write in a batch. `value: None` deletes the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamWrite {
    pub key: String,
    pub value: Option<String>,
}

impl ParamWrite {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

/// Key-value store holding rollout state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a parameter. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StateStoreError>;

    /// Write a parameter.
    async fn set(&self, key: &str, value: &str) -> Result<(), StateStoreError>;

    /// Remove a parameter. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StateStoreError>;

    /// Apply several writes.
    ///
    /// The default applies them in order and is not atomic.
    async fn write_batch(&self, writes: &[ParamWrite]) -> Result<(), StateStoreError> {
        for write in writes {
            match &write.value {
                Some(value) => self.set(&write.key, value).await?,
                None => self.delete(&write.key).await?,
            }
        }
        Ok(())
    }

    /// Take or renew the lease `name` for `holder`.
    ///
    /// Succeeds when no lease exists, the existing lease expired, or `holder`
    /// already owns it. Returns the current owner when the lease is taken.
    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: HolderId,
        ttl: Duration,
    ) -> Result<LeaseOutcome, StateStoreError>;

    /// Drop the lease `name` if `holder` owns it.
    async fn release_lease(&self, name: &str, holder: HolderId) -> Result<(), StateStoreError>;
}

/// Result of a lease acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseOutcome {
    Acquired,
    /// Held by someone else until it expires.
    Held { holder: String },
}

/// Milliseconds since the Unix epoch, used for lease expiry.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}
