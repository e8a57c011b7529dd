//! External fetch job dispatch
//!
//! The job runs out of process. Dispatch only starts it; the job reports
//! back later through the refresh callback endpoint.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::RefreshConfig;

/// Body posted to the job endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub run_id: String,
    pub subject: String,
    pub callback_url: Option<String>,
}

/// The job could not be started
#[derive(Debug, Error)]
pub enum JobError {
    #[error("refresh job endpoint is not configured")]
    NotConfigured,

    #[error("refresh job request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("refresh job endpoint answered {0}")]
    Status(reqwest::StatusCode),
}

/// Starts the external fetch job
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RefreshJob: Send + Sync {
    /// Fire the job and return once it has been accepted
    async fn dispatch(&self, request: &JobRequest) -> Result<(), JobError>;
}

/// Dispatches the job with an HTTP POST
pub struct HttpRefreshJob {
    client: reqwest::Client,
    job_url: Option<String>,
}

impl HttpRefreshJob {
    pub fn new(config: &RefreshConfig) -> Result<Self, JobError> {
        Self::with_timeout(config.job_url.clone(), config.dispatch_timeout())
    }

    pub fn with_timeout(job_url: Option<String>, timeout: Duration) -> Result<Self, JobError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("coolfollowers/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client, job_url })
    }
}

#[async_trait]
impl RefreshJob for HttpRefreshJob {
    async fn dispatch(&self, request: &JobRequest) -> Result<(), JobError> {
        let job_url = self.job_url.as_deref().ok_or(JobError::NotConfigured)?;

        let response = self.client.post(job_url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, run_id = %request.run_id, "Refresh job endpoint rejected dispatch");
            return Err(JobError::Status(status));
        }

        tracing::info!(run_id = %request.run_id, subject = %request.subject, "Refresh job dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JobRequest {
        JobRequest {
            run_id: "01HQ0000000000000000000000".to_string(),
            subject: "maker".to_string(),
            callback_url: Some("http://127.0.0.1:8080/api/refresh/callback".to_string()),
        }
    }

    #[tokio::test]
    async fn test_missing_job_url_fails_dispatch() {
        let job = HttpRefreshJob::with_timeout(None, Duration::from_secs(1)).unwrap();
        let error = job.dispatch(&request()).await.unwrap_err();
        assert!(matches!(error, JobError::NotConfigured));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_dispatch() {
        // bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let job = HttpRefreshJob::with_timeout(
            Some(format!("http://{addr}/api/ig-refresh")),
            Duration::from_secs(2),
        )
        .unwrap();
        let error = job.dispatch(&request()).await.unwrap_err();
        assert!(matches!(error, JobError::Transport(_)));
    }

    #[test]
    fn test_request_wire_format() {
        let body = serde_json::to_value(request()).unwrap();
        assert_eq!(body["runId"], "01HQ0000000000000000000000");
        assert_eq!(body["subject"], "maker");
        assert!(body["callbackUrl"].is_string());
    }
}
