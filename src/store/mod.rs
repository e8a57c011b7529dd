//! Key/value store backends
//!
//! The snapshot cache and the refresh coordinator only ever talk to a
//! [`KeyValueStore`]. Two backends exist:
//! - `memory`: process-local, volatile (single instance deployments, tests)
//! - `sqlite`: durable file database shared by every process on the host
//!
//! Mutual exclusion of refreshes relies on [`KeyValueStore::compare_and_set`]
//! being atomic, so every server instance must point at the same store.

mod memory;
mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::clock::Clock;
use crate::config::{StoreBackend, StoreConfig};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Backend failure
///
/// Every variant means "the store could not answer"; callers decide whether
/// that degrades to a miss (reads) or is surfaced (writes).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Durable, TTL-capable key/value backend
///
/// Expired records are invisible to every operation: `get` returns `None`
/// and `compare_and_set` with `expected = None` succeeds over them.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a live value
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a value, replacing any existing record
    ///
    /// `ttl = None` keeps the record until it is deleted or overwritten.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Remove a record. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically replace the value at `key` if it currently equals `expected`
    ///
    /// `expected = None` means "no live record". Returns `true` if the write
    /// happened.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    /// Physically drop expired records, returning how many were removed
    async fn purge_expired(&self) -> Result<u64, StoreError>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Compute the absolute expiry for a record written at `now`
///
/// A TTL too large to represent is treated as "never expires".
pub(crate) fn expiry_from(now: DateTime<Utc>, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl?).ok()?;
    now.checked_add_signed(ttl)
}

/// Open the backend selected in configuration
pub async fn open_store(
    config: &StoreConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory key/value store");
            Ok(Arc::new(MemoryStore::new(clock)))
        }
        StoreBackend::Sqlite => {
            let path = config.path.as_deref().ok_or_else(|| {
                StoreError::Unavailable("store.path is required for the sqlite backend".to_string())
            })?;
            let store = SqliteStore::connect(path, clock).await?;
            Ok(Arc::new(store))
        }
    }
}
