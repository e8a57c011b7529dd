//! CoolFollowers binary entry point

use coolfollowers::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Load configuration from file and environment
/// 3. Initialize AppState
/// 4. Build Axum router
/// 5. Start background tasks (expired record sweep)
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("COOLFOLLOWERS__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "coolfollowers=info,tower_http=debug".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting CoolFollowers...");

    // 2. Initialize metrics
    coolfollowers::metrics::init_metrics();

    // 3. Load configuration
    let config = config::AppConfig::load()?;
    tracing::info!(
        subject = %config.subject.username,
        backend = ?config.store.backend,
        max_age_seconds = config.cache.max_age_seconds,
        "Configuration loaded"
    );

    // 4. Initialize application state
    let state = AppState::new(config.clone()).await?;

    // 5. Build Axum router
    let app = coolfollowers::build_router(state.clone());

    // 6. Start background tasks
    spawn_purge_task(state);

    // 7. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Spawn background task dropping expired store records
///
/// Expired records are already invisible; this only reclaims their space.
fn spawn_purge_task(state: AppState) {
    let interval_secs = state.config.store.purge_interval_seconds.max(1);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

        // Skip the immediate first tick.
        interval.tick().await;

        loop {
            interval.tick().await;

            match state.store.purge_expired().await {
                Ok(0) => tracing::debug!("No expired records to purge"),
                Ok(removed) => tracing::info!(removed, "Purged expired records"),
                Err(error) => tracing::error!(%error, "Expired record purge failed"),
            }
        }
    });

    tracing::info!(interval_secs, "Purge task spawned");
}
