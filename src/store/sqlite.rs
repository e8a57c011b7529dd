//! SQLite key/value store
//!
//! One `kv_store` table; expiry is an epoch-millisecond column compared
//! against the injected clock, so a record is dead the moment its
//! `expires_at` is reached even before `purge_expired` removes it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{KeyValueStore, StoreError, expiry_from};
use crate::clock::Clock;

fn to_millis(instant: Option<DateTime<Utc>>) -> Option<i64> {
    instant.map(|instant| instant.timestamp_millis())
}

/// Durable key/value store backed by a SQLite file
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and run migrations
    pub async fn connect(path: &Path, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(sqlx::Error::Io(e)))?;
            }
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            StoreError::from(e)
        })?;

        tracing::info!(path = %path.display(), "SQLite key/value store ready");

        Ok(Self { pool, clock })
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let value = sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT value FROM kv_store WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(self.now_millis())
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError> {
        let expires_at = to_millis(expiry_from(self.clock.now(), ttl));

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE
            SET value = excluded.value, expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Single-statement conditional write
    ///
    /// SQLite serializes writers, so each statement below observes and
    /// replaces the row atomically.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let now_millis = now.timestamp_millis();
        let expires_at = to_millis(expiry_from(now, ttl));

        let result = match expected {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO kv_store (key, value, expires_at)
                    VALUES (?, ?, ?)
                    ON CONFLICT(key) DO UPDATE
                    SET value = excluded.value, expires_at = excluded.expires_at
                    WHERE kv_store.expires_at IS NOT NULL
                      AND kv_store.expires_at <= ?
                    "#,
                )
                .bind(key)
                .bind(value)
                .bind(expires_at)
                .bind(now_millis)
                .execute(&self.pool)
                .await?
            }
            Some(expected) => {
                sqlx::query(
                    r#"
                    UPDATE kv_store
                    SET value = ?, expires_at = ?
                    WHERE key = ?
                      AND value = ?
                      AND (expires_at IS NULL OR expires_at > ?)
                    "#,
                )
                .bind(value)
                .bind(expires_at)
                .bind(key)
                .bind(expected)
                .bind(now_millis)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected() == 1)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM kv_store WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(self.now_millis())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
