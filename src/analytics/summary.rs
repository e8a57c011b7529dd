//! Engagement and content mix summary for the stats view

use serde::Serialize;

use super::stats::{HashtagStat, aggregate_stats, hashtag_stats, saturating_total};
use crate::data::{MediaKind, Post, Profile};

const TOP_HASHTAGS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMix {
    pub image_posts: usize,
    pub video_posts: usize,
    pub carousel_posts: usize,
    pub posts_with_location: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementSummary {
    pub total_likes: u64,
    pub total_comments: u64,
    pub total_video_views: u64,
    pub avg_likes_per_post: u64,
    pub avg_comments_per_post: u64,
    /// Average interactions per post as a percentage of followers
    pub engagement_rate: f64,
    pub content: ContentMix,
    pub top_hashtags: Vec<HashtagStat>,
}

/// `((likes + comments) / posts / followers) * 100`, two decimals
fn engagement_rate(interactions: u64, posts: usize, followers: u64) -> f64 {
    if posts == 0 || followers == 0 {
        return 0.0;
    }
    let rate = interactions as f64 / posts as f64 / followers as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

pub fn engagement_summary(posts: &[Post], profile: Option<&Profile>) -> EngagementSummary {
    let aggregate = aggregate_stats(posts);

    let mut content = ContentMix::default();
    for post in posts {
        match post.media.kind {
            MediaKind::Image => content.image_posts += 1,
            MediaKind::Video => content.video_posts += 1,
            MediaKind::Carousel => content.carousel_posts += 1,
        }
        if post.location.is_some() {
            content.posts_with_location += 1;
        }
    }

    let mut top_hashtags = hashtag_stats(posts);
    top_hashtags.truncate(TOP_HASHTAGS);

    EngagementSummary {
        total_likes: aggregate.total_likes,
        total_comments: aggregate.total_comments,
        total_video_views: saturating_total(posts.iter().filter_map(|post| post.video_view_count)),
        avg_likes_per_post: aggregate.avg_likes,
        avg_comments_per_post: aggregate.avg_comments,
        engagement_rate: engagement_rate(
            aggregate.total_likes.saturating_add(aggregate.total_comments),
            posts.len(),
            profile.map_or(0, |profile| profile.followers_count),
        ),
        content,
        top_hashtags,
    }
}
