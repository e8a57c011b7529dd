//! In-process key/value store
//!
//! Volatile, cleared on restart. All mutations happen under one write lock,
//! which is what makes `compare_and_set` atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{KeyValueStore, StoreError, expiry_from};
use crate::clock::Clock;

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// Volatile key/value store
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, StoredValue>>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Number of records held, live or expired
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|value| value.is_live(now))
            .map(|value| value.bytes.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = expiry_from(self.clock.now(), ttl);
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            StoredValue {
                bytes: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        let current = entries
            .get(key)
            .filter(|stored| stored.is_live(now))
            .map(|stored| stored.bytes.as_slice());
        if current != expected {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            StoredValue {
                bytes: value.to_vec(),
                expires_at: expiry_from(now, ttl),
            },
        );
        Ok(true)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, value| value.is_live(now));
        Ok((before - entries.len()) as u64)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn store() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        ));
        (MemoryStore::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let (store, _clock) = store();

        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", b"v1", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v1".to_vec()));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        // idempotent
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let (store, clock) = store();
        store
            .set("k", b"v", Some(Duration::from_secs(10)))
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(9));
        assert!(store.get("k").await.unwrap().is_some());

        clock.advance(chrono::Duration::seconds(1));
        assert!(store.get("k").await.unwrap().is_none());

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_compare_and_set() {
        let (store, clock) = store();

        // absent -> value
        assert!(store.compare_and_set("k", None, b"a", None).await.unwrap());
        // absent expected but present
        assert!(!store.compare_and_set("k", None, b"b", None).await.unwrap());
        // wrong expectation
        assert!(!store.compare_and_set("k", Some(b"x"), b"b", None).await.unwrap());
        // matching expectation
        assert!(
            store
                .compare_and_set("k", Some(b"a"), b"b", Some(Duration::from_secs(5)))
                .await
                .unwrap()
        );
        assert_eq!(store.get("k").await.unwrap(), Some(b"b".to_vec()));

        // expired record counts as absent
        clock.advance(chrono::Duration::seconds(5));
        assert!(store.compare_and_set("k", None, b"c", None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"c".to_vec()));
    }
}
