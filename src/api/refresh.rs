//! Refresh endpoints

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::auth::JobCaller;
use crate::AppState;
use crate::data::Snapshot;
use crate::error::AppError;
use crate::refresh::{RefreshDecision, StatusView};

/// Largest callback body accepted; snapshots carry every post and follower
const MAX_CALLBACK_BYTES: usize = 64 * 1024 * 1024;

/// Create refresh router
///
/// Routes:
/// - GET /api/refresh - Current status
/// - POST /api/refresh - Request a refresh
/// - POST /api/refresh/callback - Outcome reported by the refresh job
pub fn refresh_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_status).post(request_refresh))
        .route(
            "/callback",
            post(refresh_callback).layer(DefaultBodyLimit::max(MAX_CALLBACK_BYTES)),
        )
}

/// GET /api/refresh
async fn get_status(State(state): State<AppState>) -> Result<Json<StatusView>, AppError> {
    Ok(Json(state.coordinator.get_status().await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub granted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_eligible_at: Option<DateTime<Utc>>,
}

/// POST /api/refresh
///
/// 202 when granted, 409 while another refresh runs, 200 while the data is
/// still fresh. A job that cannot be dispatched is a 502.
async fn request_refresh(State(state): State<AppState>) -> Result<Response, AppError> {
    let decision = state.coordinator.request_refresh().await?;

    let (status, body) = match decision {
        RefreshDecision::Granted { run_id } => (
            StatusCode::ACCEPTED,
            RefreshResponse {
                granted: true,
                run_id: Some(run_id),
                reason: None,
                next_eligible_at: None,
            },
        ),
        RefreshDecision::AlreadyRunning => (
            StatusCode::CONFLICT,
            RefreshResponse {
                granted: false,
                run_id: None,
                reason: Some("already-running"),
                next_eligible_at: None,
            },
        ),
        RefreshDecision::Fresh { next_eligible_at } => (
            StatusCode::OK,
            RefreshResponse {
                granted: false,
                run_id: None,
                reason: Some("fresh"),
                next_eligible_at: Some(next_eligible_at),
            },
        ),
    };

    Ok((status, Json(body)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    pub run_id: String,
    pub success: bool,
    pub error: Option<String>,
    /// Present when the job hands over the data instead of writing it itself
    pub snapshot: Option<Snapshot>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub applied: bool,
}

/// POST /api/refresh/callback
async fn refresh_callback(
    State(state): State<AppState>,
    _caller: JobCaller,
    Json(request): Json<CallbackRequest>,
) -> Result<Json<CallbackResponse>, AppError> {
    if request.run_id.trim().is_empty() {
        return Err(AppError::Validation("runId must not be empty".to_string()));
    }

    let coordinator = &state.coordinator;
    let applied = match (request.success, request.snapshot) {
        (true, Some(snapshot)) => coordinator.ingest(&request.run_id, &snapshot).await?,
        (true, None) => coordinator.report_success(&request.run_id).await?,
        (false, _) => {
            let reason = request.error.as_deref().unwrap_or("refresh job failed");
            coordinator.report_failure(&request.run_id, reason).await?
        }
    };

    tracing::info!(run_id = %request.run_id, success = request.success, applied, "Refresh callback handled");
    Ok(Json(CallbackResponse { applied }))
}
