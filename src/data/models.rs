//! Data models
//!
//! Canonical, validated shapes of the cached datasets. Raw payloads in
//! either of the two upstream schema variants are normalized into these by
//! [`super::validate`]; nothing downstream branches on the payload variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Users
// =============================================================================

/// A follower, followee, liker or comment author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub username: String,
    pub full_name: Option<String>,
    pub profile_pic_url: Option<String>,
    pub is_verified: bool,
    pub is_private: bool,
}

/// Entry of the followers and following collections
pub type FollowerEntry = UserSummary;

// =============================================================================
// Profile
// =============================================================================

/// The subject's profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub username: String,
    pub user_id: Option<String>,
    pub full_name: String,
    pub biography: String,
    pub external_url: Option<String>,
    pub profile_pic_url: String,
    pub is_private: bool,
    pub is_verified: bool,
    pub is_business_account: bool,
    pub business_category: Option<String>,
    pub followers_count: u64,
    pub following_count: u64,
    pub posts_count: Option<u64>,
    pub igtv_count: u64,
    pub biography_hashtags: Vec<String>,
    pub biography_mentions: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

// =============================================================================
// Posts
// =============================================================================

/// Media type of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Carousel,
}

/// One media reference; a carousel has several
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub url: String,
    pub is_video: bool,
    pub video_url: Option<String>,
}

/// Media descriptor of a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub kind: MediaKind,
    pub items: Vec<MediaItem>,
    /// Seconds, for videos
    pub video_duration: Option<f64>,
}

/// Tagged location of a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: String,
    pub name: String,
    pub slug: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

/// A comment and its replies
///
/// Finite tree: replies deeper than [`super::validate::MAX_COMMENT_DEPTH`]
/// are dropped during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub text: String,
    /// As scraped; not always RFC 3339
    pub timestamp: String,
    pub likes_count: u64,
    pub owner: UserSummary,
    pub replies: Vec<Comment>,
}

impl Comment {
    /// Depth of this comment's reply tree (a comment without replies is 1)
    pub fn depth(&self) -> usize {
        1 + self.replies.iter().map(Comment::depth).max().unwrap_or(0)
    }
}

/// A post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub shortcode: String,
    pub caption: Option<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub tagged_users: Vec<String>,
    pub media: Media,
    pub like_count: u64,
    pub comment_count: u64,
    pub video_view_count: Option<u64>,
    pub location: Option<Location>,
    pub permalink: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_pinned: bool,
    pub is_sponsored: bool,
    pub likers: Vec<UserSummary>,
    pub comments: Vec<Comment>,
}

// =============================================================================
// Snapshot
// =============================================================================

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

/// A complete refresh result as delivered by the fetch job
///
/// Payloads stay raw: they are validated when read, not when written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub profile: Value,
    pub posts: Value,
    #[serde(default = "empty_array")]
    pub followers: Value,
    #[serde(default = "empty_array")]
    pub following: Value,
}

impl Snapshot {
    pub fn payload(&self, dataset: super::Dataset) -> &Value {
        use super::Dataset;

        match dataset {
            Dataset::Profile => &self.profile,
            Dataset::Posts => &self.posts,
            Dataset::Followers => &self.followers,
            Dataset::Following => &self.following,
        }
    }
}
