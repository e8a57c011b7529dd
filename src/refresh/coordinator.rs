//! Refresh state machine over the shared status record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use ulid::Ulid;

use super::job::{JobRequest, RefreshJob};
use super::{RefreshDecision, RefreshStatus, StatusView};
use crate::clock::Clock;
use crate::data::{SnapshotCache, Snapshot, refresh_status_key};
use crate::error::{AppError, Result};
use crate::metrics::{REFRESH_COMPLETIONS_TOTAL, REFRESH_REQUESTS_TOTAL, STORE_ERRORS_TOTAL};
use crate::store::{KeyValueStore, StoreError};

/// Longest failure reason kept in the status record, in characters
const MAX_REASON_CHARS: usize = 200;

/// Attempts at winning the status CAS before giving way to the other writer
const CAS_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum State {
    Running,
    Complete,
    Error,
}

/// Stored form of the status record; absence means idle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRecord {
    state: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    run_id: String,
    updated_at: DateTime<Utc>,
}

impl StatusRecord {
    fn is_running(&self, run_id: &str) -> bool {
        self.state == State::Running && self.run_id == run_id
    }

    fn status(&self) -> RefreshStatus {
        match self.state {
            State::Running => RefreshStatus::Running,
            State::Complete => RefreshStatus::Complete,
            State::Error => RefreshStatus::Error(self.reason.clone().unwrap_or_default()),
        }
    }
}

/// Status record as found in the store
///
/// The raw bytes are kept because they are the `expected` value of the
/// next compare-and-set.
struct Observed {
    raw: Option<Vec<u8>>,
    record: Option<StatusRecord>,
}

fn truncate_reason(reason: &str) -> String {
    reason.chars().take(MAX_REASON_CHARS).collect()
}

/// Grants refreshes and records their outcome
pub struct RefreshCoordinator {
    store: Arc<dyn KeyValueStore>,
    cache: Arc<SnapshotCache>,
    job: Arc<dyn RefreshJob>,
    clock: Arc<dyn Clock>,
    status_key: String,
    callback_url: Option<String>,
    running_ttl: Duration,
    outcome_ttl: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        cache: Arc<SnapshotCache>,
        job: Arc<dyn RefreshJob>,
        clock: Arc<dyn Clock>,
        running_ttl: Duration,
        outcome_ttl: Duration,
    ) -> Self {
        let status_key = refresh_status_key(cache.subject());
        Self {
            store,
            cache,
            job,
            clock,
            status_key,
            callback_url: None,
            running_ttl,
            outcome_ttl,
        }
    }

    /// URL handed to the job for its completion callback
    pub fn with_callback_url(mut self, callback_url: Option<String>) -> Self {
        self.callback_url = callback_url;
        self
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    async fn observe(&self) -> std::result::Result<Observed, StoreError> {
        let raw = self
            .store
            .get(&self.status_key)
            .await
            .inspect_err(|_| STORE_ERRORS_TOTAL.with_label_values(&["get"]).inc())?;

        let record = raw.as_deref().and_then(|bytes| {
            serde_json::from_slice::<StatusRecord>(bytes)
                .inspect_err(|error| tracing::warn!(%error, "Unreadable refresh status; treating as idle"))
                .ok()
        });

        Ok(Observed { raw, record })
    }

    async fn swap(
        &self,
        observed: &Observed,
        next: &StatusRecord,
        ttl: Duration,
    ) -> std::result::Result<bool, StoreError> {
        let bytes = serde_json::to_vec(next)
            .map_err(|e| StoreError::Unavailable(format!("encoding status record: {e}")))?;
        self.store
            .compare_and_set(&self.status_key, observed.raw.as_deref(), &bytes, Some(ttl))
            .await
            .inspect_err(|_| STORE_ERRORS_TOTAL.with_label_values(&["compare_and_set"]).inc())
    }

    /// Ask for a refresh
    ///
    /// Grants only when nothing is running and the snapshot is stale. A
    /// granted request dispatches the job and returns without waiting for it.
    /// A failed dispatch is recorded as `error` and returned as
    /// [`AppError::UpstreamJob`].
    pub async fn request_refresh(&self) -> Result<RefreshDecision> {
        for _ in 0..CAS_ATTEMPTS {
            let observed = self.observe().await?;

            if observed
                .record
                .as_ref()
                .is_some_and(|record| record.state == State::Running)
            {
                return Ok(self.decided(RefreshDecision::AlreadyRunning));
            }

            if !self.cache.is_stale(None).await {
                let next_eligible_at = self
                    .cache
                    .next_eligible_at()
                    .await
                    .unwrap_or_else(|| self.clock.now());
                return Ok(self.decided(RefreshDecision::Fresh { next_eligible_at }));
            }

            let running = StatusRecord {
                state: State::Running,
                reason: None,
                run_id: Ulid::new().to_string(),
                updated_at: self.clock.now(),
            };

            if self.swap(&observed, &running, self.running_ttl).await? {
                return self.dispatch(running.run_id).await;
            }

            tracing::debug!("Refresh status changed underneath; re-reading");
        }

        // Every attempt lost to another writer, which therefore holds the run.
        Ok(self.decided(RefreshDecision::AlreadyRunning))
    }

    fn decided(&self, decision: RefreshDecision) -> RefreshDecision {
        REFRESH_REQUESTS_TOTAL
            .with_label_values(&[decision.outcome()])
            .inc();
        tracing::info!(outcome = decision.outcome(), "Refresh requested");
        decision
    }

    async fn dispatch(&self, run_id: String) -> Result<RefreshDecision> {
        let request = JobRequest {
            run_id: run_id.clone(),
            subject: self.cache.subject().to_string(),
            callback_url: self.callback_url.clone(),
        };

        match self.job.dispatch(&request).await {
            Ok(()) => Ok(self.decided(RefreshDecision::Granted { run_id })),
            Err(error) => {
                let reason = error.to_string();
                REFRESH_REQUESTS_TOTAL
                    .with_label_values(&["dispatch_failed"])
                    .inc();
                tracing::error!(%run_id, %reason, "Refresh job dispatch failed");

                if let Err(store_error) = self.finish(&run_id, Err(reason.as_str())).await {
                    tracing::error!(%run_id, error = %store_error, "Failed to record dispatch failure");
                }
                Err(AppError::UpstreamJob(reason))
            }
        }
    }

    /// Move `run_id` from running to its terminal state
    ///
    /// Returns `false` when the current record is not that run.
    async fn finish(
        &self,
        run_id: &str,
        outcome: std::result::Result<(), &str>,
    ) -> std::result::Result<bool, StoreError> {
        let observed = self.observe().await?;
        if !observed.record.as_ref().is_some_and(|record| record.is_running(run_id)) {
            tracing::warn!(
                %run_id,
                current = ?observed.record.as_ref().map(|record| &record.run_id),
                "Ignoring outcome of a run that is no longer current"
            );
            return Ok(false);
        }

        let (state, reason) = match outcome {
            Ok(()) => (State::Complete, None),
            Err(reason) => (State::Error, Some(truncate_reason(reason))),
        };
        let next = StatusRecord {
            state,
            reason,
            run_id: run_id.to_string(),
            updated_at: self.clock.now(),
        };

        let applied = self.swap(&observed, &next, self.outcome_ttl).await?;
        if applied {
            let label = if state == State::Complete { "complete" } else { "error" };
            REFRESH_COMPLETIONS_TOTAL.with_label_values(&[label]).inc();
            tracing::info!(%run_id, status = label, "Refresh finished");
        }
        Ok(applied)
    }

    async fn is_current(&self, run_id: &str) -> std::result::Result<bool, StoreError> {
        Ok(self
            .observe()
            .await?
            .record
            .is_some_and(|record| record.is_running(run_id)))
    }

    /// The job finished and wrote the snapshot itself
    ///
    /// The run is completed before the marker moves, so a run that has
    /// already expired never advances it.
    pub async fn report_success(&self, run_id: &str) -> Result<bool> {
        if !self.finish(run_id, Ok(())).await? {
            return Ok(false);
        }

        if let Err(error) = self.cache.mark_refreshed().await {
            let reason = format!("marking refreshed failed: {error}");
            if let Err(store_error) = self.demote(run_id, &reason).await {
                tracing::error!(%run_id, error = %store_error, "Failed to record marker failure");
            }
            return Err(error.into());
        }
        Ok(true)
    }

    /// Turn a completed `run_id` into an error outcome
    async fn demote(&self, run_id: &str, reason: &str) -> std::result::Result<bool, StoreError> {
        let observed = self.observe().await?;
        if !observed
            .record
            .as_ref()
            .is_some_and(|record| record.state == State::Complete && record.run_id == run_id)
        {
            return Ok(false);
        }

        let next = StatusRecord {
            state: State::Error,
            reason: Some(truncate_reason(reason)),
            run_id: run_id.to_string(),
            updated_at: self.clock.now(),
        };
        self.swap(&observed, &next, self.outcome_ttl).await
    }

    /// The job failed
    pub async fn report_failure(&self, run_id: &str, reason: &str) -> Result<bool> {
        Ok(self.finish(run_id, Err(reason)).await?)
    }

    /// The job delivered its snapshot; commit it and complete the run
    ///
    /// A snapshot from a run that is no longer current is discarded.
    pub async fn ingest(&self, run_id: &str, snapshot: &Snapshot) -> Result<bool> {
        if !self.is_current(run_id).await? {
            tracing::warn!(%run_id, "Discarding snapshot of a run that is no longer current");
            return Ok(false);
        }

        match self.cache.commit_snapshot(snapshot).await {
            Ok(()) => Ok(self.finish(run_id, Ok(())).await?),
            Err(error) => {
                let reason = format!("committing snapshot failed: {error}");
                if let Err(store_error) = self.finish(run_id, Err(reason.as_str())).await {
                    tracing::error!(%run_id, error = %store_error, "Failed to record commit failure");
                }
                Err(error.into())
            }
        }
    }

    /// Current status with cache freshness
    ///
    /// An unreachable store reads as idle and stale.
    pub async fn get_status(&self) -> Result<StatusView> {
        let observed = match self.observe().await {
            Ok(observed) => observed,
            Err(error) => {
                tracing::error!(%error, "Store unavailable; reporting idle status");
                Observed { raw: None, record: None }
            }
        };
        let last_refresh = self.cache.last_refresh_time().await;

        let (status, run_id, updated_at) = match observed.record {
            Some(record) => (record.status(), Some(record.run_id), Some(record.updated_at)),
            None => (RefreshStatus::Idle, None, None),
        };

        Ok(StatusView {
            status,
            run_id,
            updated_at,
            is_stale: self.cache.is_stale(None).await,
            last_refresh,
            next_eligible_at: self.cache.next_eligible_at().await,
        })
    }
}
