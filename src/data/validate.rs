//! Payload validation and normalization
//!
//! Upstream payloads come in two shapes:
//! - legacy: `mediaType` (image/video/carousel), `mediaUrls`, `bio`
//! - extended: `typename` (GraphImage/GraphVideo/GraphSidecar),
//!   `sidecarItems`, `mediaUrl`, `captionHashtags`, `biography`
//!
//! Both are accepted here and folded into the canonical models. A payload
//! that cannot be interpreted yields a [`ValidationError`]; nothing is
//! coerced silently.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::Dataset;
use super::models::*;

/// Deepest comment nesting kept: a comment and one level of replies
pub const MAX_COMMENT_DEPTH: usize = 2;

/// A payload that does not match the expected shape
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{dataset} payload rejected: {reason}")]
pub struct ValidationError {
    pub dataset: Dataset,
    pub reason: String,
}

impl ValidationError {
    fn new(dataset: Dataset, reason: impl Into<String>) -> Self {
        Self {
            dataset,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Raw shapes
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    username: String,
    full_name: Option<String>,
    profile_pic_url: Option<String>,
    is_verified: Option<bool>,
    is_private: Option<bool>,
}

impl From<RawUser> for UserSummary {
    fn from(raw: RawUser) -> Self {
        Self {
            username: raw.username,
            full_name: raw.full_name,
            profile_pic_url: raw.profile_pic_url,
            is_verified: raw.is_verified.unwrap_or(false),
            is_private: raw.is_private.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProfile {
    username: String,
    userid: Option<String>,
    full_name: String,
    biography: Option<String>,
    bio: Option<String>,
    external_url: Option<String>,
    profile_pic_url: String,
    is_private: Option<bool>,
    is_verified: Option<bool>,
    is_business_account: Option<bool>,
    business_category: Option<String>,
    followers_count: u64,
    following_count: u64,
    posts_count: Option<u64>,
    igtv_count: Option<u64>,
    biography_hashtags: Option<Vec<String>>,
    biography_mentions: Option<Vec<String>>,
    last_updated: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocation {
    id: String,
    name: String,
    slug: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSidecarItem {
    is_video: bool,
    display_url: String,
    video_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComment {
    id: String,
    text: String,
    timestamp: String,
    likes_count: Option<u64>,
    owner: RawUser,
    replies: Option<Vec<RawComment>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPost {
    id: String,
    shortcode: String,
    typename: Option<String>,
    caption: Option<String>,
    caption_hashtags: Option<Vec<String>>,
    caption_mentions: Option<Vec<String>>,
    tagged_users: Option<Vec<String>>,
    media_type: Option<String>,
    media_url: Option<String>,
    media_urls: Option<Vec<String>>,
    video_url: Option<String>,
    video_duration: Option<f64>,
    sidecar_items: Option<Vec<RawSidecarItem>>,
    like_count: u64,
    comment_count: u64,
    video_view_count: Option<u64>,
    location: Option<RawLocation>,
    permalink: Option<String>,
    timestamp: String,
    is_video: Option<bool>,
    is_pinned: Option<bool>,
    is_sponsored: Option<bool>,
    likers: Option<Vec<RawUser>>,
    comments: Option<Vec<RawComment>>,
}

// =============================================================================
// Normalization helpers
// =============================================================================

fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| format!("timestamp {value:?} is not RFC 3339: {e}"))
}

/// Extract `#tag` / `@name` tokens from free text, lowercased and deduplicated
pub fn extract_tokens(text: &str, sigil: char) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != sigil {
            continue;
        }
        let mut token = String::new();
        while let Some(&(_, next)) = chars.peek() {
            if next.is_alphanumeric() || next == '_' || (sigil == '@' && next == '.') {
                token.extend(next.to_lowercase());
                chars.next();
            } else {
                break;
            }
        }
        let token = token.trim_end_matches('.').to_string();
        if !token.is_empty() && !tokens.contains(&token) {
            tokens.push(token);
        }
    }

    tokens
}

fn media_kind(raw: &RawPost) -> Result<MediaKind, String> {
    if let Some(typename) = raw.typename.as_deref() {
        return match typename {
            "GraphImage" => Ok(MediaKind::Image),
            "GraphVideo" => Ok(MediaKind::Video),
            "GraphSidecar" => Ok(MediaKind::Carousel),
            other => Err(format!("unknown typename {other:?}")),
        };
    }

    if let Some(media_type) = raw.media_type.as_deref() {
        return match media_type {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "carousel" => Ok(MediaKind::Carousel),
            other => Err(format!("unknown mediaType {other:?}")),
        };
    }

    if raw.sidecar_items.as_ref().is_some_and(|items| !items.is_empty()) {
        Ok(MediaKind::Carousel)
    } else if raw.is_video.unwrap_or(false) {
        Ok(MediaKind::Video)
    } else {
        Ok(MediaKind::Image)
    }
}

fn media_items(raw: &mut RawPost, kind: MediaKind) -> Vec<MediaItem> {
    if let Some(sidecar) = raw.sidecar_items.take().filter(|items| !items.is_empty()) {
        return sidecar
            .into_iter()
            .map(|item| MediaItem {
                url: item.display_url,
                is_video: item.is_video,
                video_url: item.video_url,
            })
            .collect();
    }

    let is_video = kind == MediaKind::Video;
    let video_url = if is_video { raw.video_url.clone() } else { None };

    let urls = match raw.media_urls.take().filter(|urls| !urls.is_empty()) {
        Some(urls) => urls,
        None => raw.media_url.take().into_iter().collect(),
    };

    urls.into_iter()
        .map(|url| MediaItem {
            url,
            is_video,
            video_url: video_url.clone(),
        })
        .collect()
}

fn normalize_comment(raw: RawComment, depth: usize) -> Comment {
    let replies = if depth >= MAX_COMMENT_DEPTH {
        if raw.replies.as_ref().is_some_and(|replies| !replies.is_empty()) {
            tracing::debug!(comment_id = %raw.id, "Dropping replies beyond depth cap");
        }
        Vec::new()
    } else {
        raw.replies
            .unwrap_or_default()
            .into_iter()
            .map(|reply| normalize_comment(reply, depth + 1))
            .collect()
    };

    Comment {
        id: raw.id,
        text: raw.text,
        timestamp: raw.timestamp,
        likes_count: raw.likes_count.unwrap_or(0),
        owner: raw.owner.into(),
        replies,
    }
}

fn normalize_post(mut raw: RawPost) -> Result<Post, String> {
    let timestamp = parse_instant(&raw.timestamp)?;
    let kind = media_kind(&raw)?;
    let items = media_items(&mut raw, kind);

    let hashtags = match raw.caption_hashtags.take().filter(|tags| !tags.is_empty()) {
        Some(tags) => tags,
        None => raw
            .caption
            .as_deref()
            .map(|caption| extract_tokens(caption, '#'))
            .unwrap_or_default(),
    };
    let mentions = match raw.caption_mentions.take().filter(|names| !names.is_empty()) {
        Some(names) => names,
        None => raw
            .caption
            .as_deref()
            .map(|caption| extract_tokens(caption, '@'))
            .unwrap_or_default(),
    };

    let comments = raw
        .comments
        .unwrap_or_default()
        .into_iter()
        .map(|comment| normalize_comment(comment, 1))
        .collect();

    Ok(Post {
        id: raw.id,
        shortcode: raw.shortcode,
        caption: raw.caption,
        hashtags,
        mentions,
        tagged_users: raw.tagged_users.unwrap_or_default(),
        media: Media {
            kind,
            items,
            video_duration: raw.video_duration,
        },
        like_count: raw.like_count,
        comment_count: raw.comment_count,
        video_view_count: raw.video_view_count,
        location: raw.location.map(|location| Location {
            id: location.id,
            name: location.name,
            slug: location.slug,
            lat: location.lat,
            lng: location.lng,
        }),
        permalink: raw.permalink,
        timestamp,
        is_pinned: raw.is_pinned.unwrap_or(false),
        is_sponsored: raw.is_sponsored.unwrap_or(false),
        likers: raw
            .likers
            .unwrap_or_default()
            .into_iter()
            .map(UserSummary::from)
            .collect(),
        comments,
    })
}

fn as_array(dataset: Dataset, raw: &Value) -> Result<&Vec<Value>, ValidationError> {
    raw.as_array()
        .ok_or_else(|| ValidationError::new(dataset, "expected an array"))
}

// =============================================================================
// Public entry points
// =============================================================================

/// Validate a profile payload
pub fn profile(raw: &Value) -> Result<Profile, ValidationError> {
    let raw = RawProfile::deserialize(raw)
        .map_err(|e| ValidationError::new(Dataset::Profile, e.to_string()))?;
    let last_updated =
        parse_instant(&raw.last_updated).map_err(|e| ValidationError::new(Dataset::Profile, e))?;

    Ok(Profile {
        username: raw.username,
        user_id: raw.userid,
        full_name: raw.full_name,
        biography: raw.biography.or(raw.bio).unwrap_or_default(),
        external_url: raw.external_url,
        profile_pic_url: raw.profile_pic_url,
        is_private: raw.is_private.unwrap_or(false),
        is_verified: raw.is_verified.unwrap_or(false),
        is_business_account: raw.is_business_account.unwrap_or(false),
        business_category: raw.business_category,
        followers_count: raw.followers_count,
        following_count: raw.following_count,
        posts_count: raw.posts_count,
        igtv_count: raw.igtv_count.unwrap_or(0),
        biography_hashtags: raw.biography_hashtags.unwrap_or_default(),
        biography_mentions: raw.biography_mentions.unwrap_or_default(),
        last_updated,
    })
}

/// Validate a posts payload
pub fn posts(raw: &Value) -> Result<Vec<Post>, ValidationError> {
    as_array(Dataset::Posts, raw)?
        .iter()
        .enumerate()
        .map(|(index, item)| {
            RawPost::deserialize(item)
                .map_err(|e| e.to_string())
                .and_then(normalize_post)
                .map_err(|reason| ValidationError::new(Dataset::Posts, format!("posts[{index}]: {reason}")))
        })
        .collect()
}

/// Validate a followers or following payload
pub fn users(dataset: Dataset, raw: &Value) -> Result<Vec<FollowerEntry>, ValidationError> {
    as_array(dataset, raw)?
        .iter()
        .enumerate()
        .map(|(index, item)| {
            RawUser::deserialize(item)
                .map(UserSummary::from)
                .map_err(|e| ValidationError::new(dataset, format!("{dataset}[{index}]: {e}")))
        })
        .collect()
}
