//! Dataset and statistics endpoints
//!
//! Handlers only translate cache lookups and analytics results into HTTP.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::AppState;
use crate::analytics::{self, AggregateStats, EngagementSummary, HashtagStat, Metric, TimingStats};
use crate::data::{Dataset, Lookup, Post, Profile};
use crate::error::AppError;

/// Set on list responses whose cached payload failed validation
pub const VALIDATION_FAILED_HEADER: HeaderName = HeaderName::from_static("x-validation-failed");

const TOP_POSTS: usize = 10;

/// Create data router
///
/// Routes:
/// - GET /api/data/profile
/// - GET /api/data/posts
/// - GET /api/data/followers
/// - GET /api/data/following
/// - GET /api/data/stats
pub fn data_router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/posts", get(get_posts))
        .route("/followers", get(get_followers))
        .route("/following", get(get_following))
        .route("/stats", get(get_stats))
}

/// Validated list, or the raw payload flagged as invalid
fn list_response<T: Serialize>(dataset: Dataset, lookup: Lookup<Vec<T>>) -> Result<Response, AppError> {
    match lookup {
        Lookup::Hit(items) => Ok(Json(items).into_response()),
        Lookup::Miss => Err(AppError::NotCached(dataset)),
        Lookup::Invalid { raw, .. } => Ok((
            StatusCode::OK,
            [(VALIDATION_FAILED_HEADER, HeaderValue::from_static("true"))],
            Json(raw),
        )
            .into_response()),
    }
}

/// GET /api/data/profile
///
/// An invalid profile is a server error; the body still carries the raw data.
async fn get_profile(State(state): State<AppState>) -> Result<Json<Profile>, AppError> {
    let profile = state.cache.profile().await.into_result(Dataset::Profile)?;
    Ok(Json(profile))
}

/// GET /api/data/posts
async fn get_posts(State(state): State<AppState>) -> Result<Response, AppError> {
    list_response(Dataset::Posts, state.cache.posts().await)
}

/// GET /api/data/followers
async fn get_followers(State(state): State<AppState>) -> Result<Response, AppError> {
    list_response(Dataset::Followers, state.cache.followers().await)
}

/// GET /api/data/following
async fn get_following(State(state): State<AppState>) -> Result<Response, AppError> {
    list_response(Dataset::Following, state.cache.following().await)
}

// =============================================================================
// Stats
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub username: String,
    pub followers_count: u64,
    pub following_count: u64,
    pub posts_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub count: usize,
    pub post_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPosts {
    pub by_likes: Vec<Post>,
    pub by_comments: Vec<Post>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSummary {
    pub last_refresh: Option<DateTime<Utc>>,
    pub is_stale: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub profile: Option<ProfileSummary>,
    pub aggregate: AggregateStats,
    pub engagement: EngagementSummary,
    pub timing: TimingStats,
    pub hashtags: Vec<HashtagStat>,
    pub months: BTreeMap<String, MonthSummary>,
    pub top_posts: TopPosts,
    pub cache: CacheSummary,
}

/// GET /api/data/stats
///
/// Missing or invalid data yields empty statistics rather than an error.
async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let (profile, posts, last_refresh, is_stale) = tokio::join!(
        state.cache.profile(),
        state.cache.posts_or_empty(),
        state.cache.last_refresh_time(),
        state.cache.is_stale(None),
    );
    let profile = profile.hit();

    let months = analytics::group_by_month(&posts)
        .into_iter()
        .map(|(month, bucket)| {
            let summary = MonthSummary {
                count: bucket.count,
                post_ids: bucket.posts.into_iter().map(|post| post.id).collect(),
            };
            (month, summary)
        })
        .collect();

    Json(StatsResponse {
        profile: profile.as_ref().map(|profile| ProfileSummary {
            username: profile.username.clone(),
            followers_count: profile.followers_count,
            following_count: profile.following_count,
            posts_count: profile.posts_count.unwrap_or(0),
        }),
        aggregate: analytics::aggregate_stats(&posts),
        engagement: analytics::engagement_summary(&posts, profile.as_ref()),
        timing: analytics::timing_stats(&posts),
        hashtags: analytics::hashtag_stats(&posts),
        months,
        top_posts: TopPosts {
            by_likes: analytics::top_by_metric(&posts, Metric::Likes, TOP_POSTS),
            by_comments: analytics::top_by_metric(&posts, Metric::Comments, TOP_POSTS),
        },
        cache: CacheSummary {
            last_refresh,
            is_stale,
        },
    })
}
