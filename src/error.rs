//! Error types for CoolFollowers
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//!
//! Rejected refresh requests (already running, still fresh) are not errors;
//! they are ordinary [`crate::refresh::RefreshDecision`] values.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::data::Dataset;
use crate::store::StoreError;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// No cached data for a dataset (404)
    #[error("No {0} data cached. Trigger a refresh first.")]
    NotCached(Dataset),

    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Malformed request (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Cached payload does not match the expected shape (500)
    ///
    /// Carries the raw payload so it can be inspected.
    #[error("Invalid {dataset} data in cache: {reason}")]
    InvalidPayload {
        dataset: Dataset,
        reason: String,
        raw: serde_json::Value,
    },

    /// Backing store unreachable (503)
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    /// External refresh job could not be started (502)
    #[error("Refresh job failed: {0}")]
    UpstreamJob(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error (500)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type) = match &self {
            AppError::NotCached(_) => (StatusCode::NOT_FOUND, self.to_string(), "not_cached"),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), "unauthorized"),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation"),
            AppError::InvalidPayload { dataset, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Invalid {dataset} data in cache"),
                "invalid_payload",
            ),
            AppError::Store(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Store unavailable".to_string(),
                "store",
            ),
            AppError::UpstreamJob(msg) => (StatusCode::BAD_GATEWAY, msg.clone(), "upstream_job"),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config"),
            AppError::Serialization(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Serialization error".to_string(),
                "serialization",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
            ),
        };

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = match self {
            AppError::InvalidPayload { raw, .. } => Json(serde_json::json!({
                "error": error_message,
                "data": raw,
            })),
            _ => Json(serde_json::json!({
                "error": error_message,
            })),
        };

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
