//! Common test utilities for E2E tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use coolfollowers::clock::{Clock, ManualClock};
use coolfollowers::refresh::{JobError, JobRequest, RefreshJob};
use coolfollowers::store::{KeyValueStore, MemoryStore, SqliteStore};
use coolfollowers::{AppState, config};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const SUBJECT: &str = "anipottsbuilds";
pub const CALLBACK_TOKEN: &str = "test-callback-token";

static METRICS: Once = Once::new();

/// Refresh job that records dispatches instead of calling out
#[derive(Default)]
pub struct RecordingJob {
    pub requests: Mutex<Vec<JobRequest>>,
    pub fail: AtomicBool,
}

impl RecordingJob {
    pub fn dispatched(&self) -> Vec<JobRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_run_id(&self) -> String {
        self.dispatched().last().expect("a dispatched job").run_id.clone()
    }
}

#[async_trait]
impl RefreshJob for RecordingJob {
    async fn dispatch(&self, request: &JobRequest) -> Result<(), JobError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(JobError::NotConfigured);
        }
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub job: Arc<RecordingJob>,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

fn test_config(temp_dir: &TempDir, backend: config::StoreBackend) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
        },
        subject: config::SubjectConfig {
            username: SUBJECT.to_string(),
        },
        store: config::StoreConfig {
            backend,
            path: Some(temp_dir.path().join("store.db")),
            purge_interval_seconds: 600,
        },
        cache: config::CacheConfig {
            data_ttl_seconds: 86_400,
            max_age_seconds: 3_600,
        },
        refresh: config::RefreshConfig {
            job_url: None,
            callback_url: Some("http://127.0.0.1/api/refresh/callback".to_string()),
            callback_token: Some(CALLBACK_TOKEN.to_string()),
            running_ttl_seconds: 300,
            outcome_ttl_seconds: 60,
            dispatch_timeout_seconds: 5,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

impl TestServer {
    /// Create a new test server backed by the in-memory store
    pub async fn new() -> Self {
        Self::with_backend(config::StoreBackend::Memory).await
    }

    /// Create a new test server backed by a SQLite file
    pub async fn with_sqlite() -> Self {
        Self::with_backend(config::StoreBackend::Sqlite).await
    }

    async fn with_backend(backend: config::StoreBackend) -> Self {
        METRICS.call_once(coolfollowers::metrics::init_metrics);

        // Create temporary directory for the SQLite store
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir, backend);

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let store: Arc<dyn KeyValueStore> = match backend {
            config::StoreBackend::Memory => Arc::new(MemoryStore::new(clock.clone())),
            config::StoreBackend::Sqlite => Arc::new(
                SqliteStore::connect(config.store.path.as_deref().unwrap(), clock.clone())
                    .await
                    .unwrap(),
            ),
        };
        let job = Arc::new(RecordingJob::default());

        // Initialize app state
        let state = AppState::from_parts(config, store, clock.clone() as Arc<dyn Clock>, job.clone());

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = coolfollowers::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            clock,
            job,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Advance the server clock
    pub fn advance(&self, seconds: i64) {
        self.clock.advance(chrono::Duration::seconds(seconds));
    }

    pub async fn request_refresh(&self) -> reqwest::Response {
        self.client
            .post(self.url("/api/refresh"))
            .send()
            .await
            .unwrap()
    }

    /// Post a job callback with the configured token
    pub async fn callback(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/refresh/callback"))
            .bearer_auth(CALLBACK_TOKEN)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Run a full refresh cycle delivering `snapshot`
    pub async fn refresh_with(&self, snapshot: Value) {
        let response = self.request_refresh().await;
        assert_eq!(response.status(), 202);

        let response = self
            .callback(json!({
                "runId": self.job.last_run_id(),
                "success": true,
                "snapshot": snapshot,
            }))
            .await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["applied"], true);
    }
}

/// Snapshot in the extended payload shape
pub fn sample_snapshot() -> Value {
    json!({
        "profile": {
            "username": SUBJECT,
            "userid": "4242",
            "fullName": "Ani Potts",
            "biography": "Building things #maker",
            "profilePicUrl": "https://cdn.example.com/avatar.jpg",
            "isVerified": false,
            "isPrivate": false,
            "followersCount": 1000,
            "followingCount": 150,
            "postsCount": 3,
            "lastUpdated": "2024-06-01T11:00:00Z"
        },
        "posts": [
            {
                "id": "1",
                "shortcode": "AAA",
                "typename": "GraphImage",
                "caption": "Bench day #woodwork #maker",
                "mediaUrl": "https://cdn.example.com/1.jpg",
                "likeCount": 100,
                "commentCount": 10,
                "timestamp": "2024-05-05T18:00:00Z"
            },
            {
                "id": "2",
                "shortcode": "BBB",
                "typename": "GraphVideo",
                "caption": "Timelapse #woodwork",
                "mediaUrl": "https://cdn.example.com/2.jpg",
                "videoUrl": "https://cdn.example.com/2.mp4",
                "videoViewCount": 5000,
                "likeCount": 50,
                "commentCount": 5,
                "timestamp": "2024-04-10T09:00:00Z"
            },
            {
                "id": "3",
                "shortcode": "CCC",
                "mediaType": "carousel",
                "mediaUrls": ["https://cdn.example.com/3a.jpg", "https://cdn.example.com/3b.jpg"],
                "likeCount": 30,
                "commentCount": 0,
                "timestamp": "2024-05-19T18:30:00Z"
            }
        ],
        "followers": [
            {"username": "fan_one", "fullName": "Fan One", "isVerified": true},
            {"username": "fan_two"}
        ],
        "following": [
            {"username": "toolmaker", "isPrivate": true}
        ]
    })
}
