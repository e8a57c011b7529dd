//! Snapshot cache
//!
//! Holds the four datasets of the subject plus the last-refresh marker on top
//! of a [`KeyValueStore`]. Every dataset is wrapped in a [`CacheRecord`]
//! envelope so its insertion time travels with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::dataset::{Dataset, last_refresh_key};
use super::models::{FollowerEntry, Post, Profile, Snapshot};
use super::validate::{self, ValidationError};
use crate::clock::Clock;
use crate::error::AppError;
use crate::metrics::{
    CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL, DATASET_SIZE, STORE_ERRORS_TOTAL,
    VALIDATION_FAILURES_TOTAL,
};
use crate::store::{KeyValueStore, StoreError};

// =============================================================================
// Cache Record
// =============================================================================

/// A dataset payload and the instant it was stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub stored_at: DateTime<Utc>,
    pub ttl_seconds: Option<u64>,
    pub payload: Value,
}

/// Envelope as read back; `storedAt` may be missing on foreign writes
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEnvelope {
    stored_at: Option<DateTime<Utc>>,
    ttl_seconds: Option<u64>,
    payload: Value,
}

impl CacheRecord {
    /// Decode stored bytes
    ///
    /// Bytes that are not an envelope, or an envelope without an insertion
    /// time, decode to `None` and are treated as absent.
    fn decode(bytes: &[u8]) -> Option<Self> {
        let envelope: StoredEnvelope = serde_json::from_slice(bytes).ok()?;
        Some(Self {
            stored_at: envelope.stored_at?,
            ttl_seconds: envelope.ttl_seconds,
            payload: envelope.payload,
        })
    }
}

// =============================================================================
// Lookup
// =============================================================================

/// Result of a typed dataset read
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Hit(T),
    Miss,
    /// Present but rejected by the validator; the raw payload is kept for debugging
    Invalid { raw: Value, reason: String },
}

impl<T> Lookup<T> {
    pub fn hit(self) -> Option<T> {
        match self {
            Lookup::Hit(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }

    pub fn into_result(self, dataset: Dataset) -> Result<T, AppError> {
        match self {
            Lookup::Hit(value) => Ok(value),
            Lookup::Miss => Err(AppError::NotCached(dataset)),
            Lookup::Invalid { raw, reason } => Err(AppError::InvalidPayload {
                dataset,
                reason,
                raw,
            }),
        }
    }
}

// =============================================================================
// Snapshot Cache
// =============================================================================

/// Time-bounded cache of the subject's snapshot
///
/// Datasets are written one by one; there is no transaction spanning them.
/// While a snapshot is being committed a reader may see the new profile next
/// to the old posts. Each single dataset is replaced atomically, so a reader
/// never sees a torn payload.
///
/// Staleness is decided by the last-refresh marker alone. Dataset records
/// carry their own store TTL which must be at least the maximum age, so a
/// fresh marker never points at evicted data.
pub struct SnapshotCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    subject: String,
    data_ttl: Duration,
    max_age: Duration,
}

impl SnapshotCache {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        subject: impl Into<String>,
        data_ttl: Duration,
        max_age: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            subject: subject.into(),
            data_ttl,
            max_age,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Read the record of a dataset
    pub async fn get_record(&self, dataset: Dataset) -> Result<Option<CacheRecord>, StoreError> {
        let bytes = self.store.get(&dataset.key(&self.subject)).await?;
        let record = bytes.as_deref().and_then(CacheRecord::decode);

        if record.is_some() {
            CACHE_HITS_TOTAL.with_label_values(&[dataset.as_str()]).inc();
        } else {
            if bytes.is_some() {
                tracing::warn!(%dataset, "Cached record has no insertion time; treating as miss");
            }
            CACHE_MISSES_TOTAL.with_label_values(&[dataset.as_str()]).inc();
        }

        Ok(record)
    }

    /// Read the raw payload of a dataset
    ///
    /// A missing key is `Ok(None)`; only an unreachable store is an error.
    pub async fn get(&self, dataset: Dataset) -> Result<Option<Value>, StoreError> {
        Ok(self.get_record(dataset).await?.map(|record| record.payload))
    }

    /// Store a dataset payload, replacing the previous one
    ///
    /// `ttl = None` uses the configured dataset TTL.
    pub async fn put(
        &self,
        dataset: Dataset,
        payload: &Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let ttl = ttl.unwrap_or(self.data_ttl);
        let record = CacheRecord {
            stored_at: self.clock.now(),
            ttl_seconds: Some(ttl.as_secs()),
            payload: payload.clone(),
        };
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| StoreError::Unavailable(format!("encoding {dataset} record: {e}")))?;

        self.store
            .set(&dataset.key(&self.subject), &bytes, Some(ttl))
            .await
            .inspect_err(|error| {
                STORE_ERRORS_TOTAL.with_label_values(&["set"]).inc();
                tracing::error!(%dataset, %error, "Failed to write dataset");
            })?;

        let size = payload.as_array().map_or(1, Vec::len);
        DATASET_SIZE
            .with_label_values(&[dataset.as_str()])
            .set(i64::try_from(size).unwrap_or(i64::MAX));

        tracing::debug!(%dataset, ttl_seconds = ttl.as_secs(), "Dataset stored");
        Ok(())
    }

    /// Remove a dataset; removing an absent one succeeds
    pub async fn delete(&self, dataset: Dataset) -> Result<(), StoreError> {
        self.store.delete(&dataset.key(&self.subject)).await
    }

    /// Instant of the last completed refresh
    ///
    /// `None` when never refreshed, when the marker is unreadable, or when the
    /// store cannot be reached.
    pub async fn last_refresh_time(&self) -> Option<DateTime<Utc>> {
        let bytes = match self.store.get(&last_refresh_key(&self.subject)).await {
            Ok(bytes) => bytes?,
            Err(error) => {
                STORE_ERRORS_TOTAL.with_label_values(&["get"]).inc();
                tracing::warn!(%error, "Failed to read last-refresh marker");
                return None;
            }
        };

        let text = String::from_utf8(bytes).ok()?;
        match DateTime::parse_from_rfc3339(text.trim()) {
            Ok(instant) => Some(instant.with_timezone(&Utc)),
            Err(error) => {
                tracing::warn!(%error, marker = %text, "Unparseable last-refresh marker");
                None
            }
        }
    }

    /// Whether the snapshot is due for a refresh
    ///
    /// Never refreshed is stale; otherwise stale once `now - lastRefresh`
    /// reaches `max_age`. A marker in the future counts as age zero.
    pub async fn is_stale(&self, max_age: Option<Duration>) -> bool {
        let Some(last_refresh) = self.last_refresh_time().await else {
            return true;
        };
        let max_age = max_age.unwrap_or(self.max_age);
        let age = (self.clock.now() - last_refresh)
            .to_std()
            .unwrap_or(Duration::ZERO);
        // Inclusive, unlike a strict `age > max_age`: the instant reported by
        // `next_eligible_at` must itself be stale.
        age >= max_age
    }

    /// Earliest instant a refresh may start, if a refresh has ever completed
    pub async fn next_eligible_at(&self) -> Option<DateTime<Utc>> {
        let last_refresh = self.last_refresh_time().await?;
        let max_age = chrono::Duration::from_std(self.max_age).ok()?;
        last_refresh.checked_add_signed(max_age)
    }

    /// Record that a complete snapshot was just written
    pub async fn mark_refreshed(&self) -> Result<(), StoreError> {
        let now = self.clock.now().to_rfc3339();
        self.store
            .set(&last_refresh_key(&self.subject), now.as_bytes(), None)
            .await
            .inspect_err(|_| {
                STORE_ERRORS_TOTAL.with_label_values(&["set"]).inc();
            })?;
        tracing::info!(subject = %self.subject, last_refresh = %now, "Snapshot marked refreshed");
        Ok(())
    }

    /// Write all four datasets, then mark the snapshot refreshed
    ///
    /// Stops at the first failed write; the marker is only moved when every
    /// dataset was stored.
    pub async fn commit_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        for dataset in Dataset::ALL {
            self.put(dataset, snapshot.payload(dataset), None).await?;
        }
        self.mark_refreshed().await
    }

    // =========================================================================
    // Typed accessors
    // =========================================================================

    async fn lookup<T>(
        &self,
        dataset: Dataset,
        check: impl FnOnce(&Value) -> Result<T, ValidationError>,
    ) -> Lookup<T> {
        let payload = match self.get(dataset).await {
            Ok(Some(payload)) => payload,
            Ok(None) => return Lookup::Miss,
            Err(error) => {
                STORE_ERRORS_TOTAL.with_label_values(&["get"]).inc();
                tracing::error!(%dataset, %error, "Store unavailable; treating as miss");
                return Lookup::Miss;
            }
        };

        match check(&payload) {
            Ok(value) => Lookup::Hit(value),
            Err(error) => {
                VALIDATION_FAILURES_TOTAL
                    .with_label_values(&[dataset.as_str()])
                    .inc();
                tracing::warn!(%dataset, reason = %error.reason, "Cached payload failed validation");
                Lookup::Invalid {
                    raw: payload,
                    reason: error.reason,
                }
            }
        }
    }

    pub async fn profile(&self) -> Lookup<Profile> {
        self.lookup(Dataset::Profile, validate::profile).await
    }

    pub async fn posts(&self) -> Lookup<Vec<Post>> {
        self.lookup(Dataset::Posts, validate::posts).await
    }

    pub async fn followers(&self) -> Lookup<Vec<FollowerEntry>> {
        self.lookup(Dataset::Followers, |raw| {
            validate::users(Dataset::Followers, raw)
        })
        .await
    }

    pub async fn following(&self) -> Lookup<Vec<FollowerEntry>> {
        self.lookup(Dataset::Following, |raw| {
            validate::users(Dataset::Following, raw)
        })
        .await
    }

    /// Validated posts, or an empty collection on miss or invalid data
    pub async fn posts_or_empty(&self) -> Vec<Post> {
        self.posts().await.hit().unwrap_or_default()
    }

    /// Whether any snapshot has been stored (the profile is always written first)
    pub async fn has_any_data(&self) -> bool {
        matches!(self.get(Dataset::Profile).await, Ok(Some(_)))
    }
}
