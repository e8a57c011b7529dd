//! API layer
//!
//! HTTP handlers for:
//! - Cached datasets and statistics
//! - Refresh requests, status and job callbacks
//! - Metrics (Prometheus)

mod auth;
mod data;
pub mod metrics;
mod refresh;

pub use data::{StatsResponse, VALIDATION_FAILED_HEADER, data_router};
pub use metrics::metrics_router;
pub use refresh::{CallbackRequest, refresh_router};
