//! CoolFollowers - snapshot cache, refresh coordination and analytics for a
//! single-owner social profile dashboard
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Dataset and stats endpoints                               │
//! │  - Refresh request / status / callback                       │
//! └─────────────────────────────────────────────────────────────┘
//!                │                               │
//! ┌──────────────────────────────┐ ┌────────────────────────────┐
//! │      RefreshCoordinator      │ │         Analytics          │
//! │  - CAS status record         │ │  - pure functions on posts │
//! │  - external job dispatch     │ └────────────────────────────┘
//! └──────────────────────────────┘
//!                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SnapshotCache                           │
//! │  - four datasets + last-refresh marker, validated reads      │
//! └─────────────────────────────────────────────────────────────┘
//!                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     KeyValueStore                            │
//! │  - memory or SQLite (sqlx), per-key TTL, compare-and-set     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `refresh`: refresh state machine and job dispatch
//! - `analytics`: statistics over the post corpus
//! - `data`: datasets, models, validator and snapshot cache
//! - `store`: key/value backends
//! - `clock`: time source
//! - `config`: Configuration management
//! - `error`: Error types

pub mod analytics;
pub mod api;
pub mod clock;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod refresh;
pub mod store;

use std::sync::Arc;

use clock::{Clock, SystemClock};
use refresh::{HttpRefreshJob, RefreshCoordinator, RefreshJob};
use store::KeyValueStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Backing key/value store
    pub store: Arc<dyn KeyValueStore>,

    /// Snapshot cache over the store
    pub cache: Arc<data::SnapshotCache>,

    /// Refresh coordinator over the same store
    pub coordinator: Arc<RefreshCoordinator>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Open the configured key/value store
    /// 2. Build the HTTP job dispatcher
    /// 3. Wire cache and coordinator
    ///
    /// # Errors
    /// Returns error if the store cannot be opened or the HTTP client fails to build
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store = store::open_store(&config.store, clock.clone()).await?;
        tracing::info!(backend = store.backend_name(), "Store opened");

        let job = HttpRefreshJob::new(&config.refresh)
            .map_err(|e| error::AppError::Internal(e.into()))?;

        Ok(Self::from_parts(config, store, clock, Arc::new(job)))
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        config: config::AppConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        job: Arc<dyn RefreshJob>,
    ) -> Self {
        let cache = Arc::new(data::SnapshotCache::new(
            store.clone(),
            clock.clone(),
            config.subject.username.clone(),
            config.cache.data_ttl(),
            config.cache.max_age(),
        ));

        let coordinator = RefreshCoordinator::new(
            store.clone(),
            cache.clone(),
            job,
            clock,
            config.refresh.running_ttl(),
            config.refresh.outcome_ttl(),
        )
        .with_callback_url(config.refresh.callback_url.clone());

        Self {
            config: Arc::new(config),
            store,
            cache,
            coordinator: Arc::new(coordinator),
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/data", api::data_router())
        .nest("/api/refresh", api::refresh_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(api::metrics_router())
}

async fn health_check() -> &'static str {
    "OK"
}
