//! Refresh coordination
//!
//! A single status record per subject, mutated only by compare-and-set,
//! guarantees that at most one refresh is in flight across every process
//! sharing the store.
//!
//! ```text
//!  idle ──(stale, CAS)──▶ running ──success──▶ complete ──(ttl)──▶ idle
//!   ▲                        │  └──failure───▶ error    ──(ttl)──▶ idle
//!   └─────────(ttl)──────────┘
//! ```

mod coordinator;
mod job;

pub use coordinator::RefreshCoordinator;
pub use job::{HttpRefreshJob, JobError, JobRequest, RefreshJob};

#[cfg(test)]
pub use job::MockRefreshJob;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Observable refresh state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshStatus {
    Idle,
    Running,
    Complete,
    Error(String),
}

impl fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running => f.write_str("running"),
            Self::Complete => f.write_str("complete"),
            Self::Error(reason) => write!(f, "error:{reason}"),
        }
    }
}

impl Serialize for RefreshStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Answer to a refresh request
///
/// Rejections are ordinary outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshDecision {
    /// The caller won the transition to running and the job was dispatched
    Granted { run_id: String },
    /// Another refresh is in flight
    AlreadyRunning,
    /// The snapshot is younger than the maximum age
    Fresh { next_eligible_at: DateTime<Utc> },
}

impl RefreshDecision {
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Granted { .. } => "granted",
            Self::AlreadyRunning => "already_running",
            Self::Fresh { .. } => "fresh",
        }
    }
}

/// Status plus cache freshness, as reported to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub status: RefreshStatus,
    pub run_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_stale: bool,
    pub last_refresh: Option<DateTime<Utc>>,
    pub next_eligible_at: Option<DateTime<Utc>>,
}
