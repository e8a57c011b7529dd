//! Callback authentication
//!
//! The refresh job proves itself with the shared `refresh.callback_token`
//! as a bearer token. Without a configured token the callback is open.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};

use crate::AppState;
use crate::error::AppError;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Compare without stopping at the first differing byte
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (presented, expected) = (presented.as_bytes(), expected.as_bytes());
    let mut diff = presented.len() ^ expected.len();
    for (index, byte) in expected.iter().enumerate() {
        let other = presented.get(index).copied().unwrap_or(0);
        diff |= usize::from(byte ^ other);
    }
    diff == 0
}

/// Extractor that admits only the refresh job
#[derive(Debug, Clone, Copy)]
pub struct JobCaller;

#[async_trait]
impl<S> FromRequestParts<S> for JobCaller
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let Some(expected) = state.config.refresh.callback_token.as_deref() else {
            return Ok(JobCaller);
        };

        match bearer_token(&parts.headers) {
            Some(presented) if tokens_match(presented, expected) => Ok(JobCaller),
            Some(_) => {
                tracing::warn!("Refresh callback presented a wrong token");
                Err(AppError::Unauthorized)
            }
            None => Err(AppError::Unauthorized),
        }
    }
}
