//! Analytics over the cached post corpus
//!
//! Pure functions: no I/O, no clock, deterministic for a given input, and
//! safe to call on an empty collection. All calendar math is UTC.

mod stats;
mod summary;
mod timing;

pub use stats::{
    AggregateStats, HashtagStat, Metric, MonthBucket, aggregate_stats, group_by_month,
    hashtag_stats, top_by_metric,
};
pub use summary::{ContentMix, EngagementSummary, engagement_summary};
pub use timing::{DAY_NAMES, DayBucket, HourBucket, TimingBucket, TimingStats, timing_stats};

#[cfg(test)]
pub(crate) fn test_post(id: &str, likes: u64, comments: u64, timestamp: &str) -> crate::data::Post {
    use crate::data::{Media, MediaKind, Post};

    Post {
        id: id.to_string(),
        shortcode: format!("sc{id}"),
        caption: None,
        hashtags: Vec::new(),
        mentions: Vec::new(),
        tagged_users: Vec::new(),
        media: Media {
            kind: MediaKind::Image,
            items: Vec::new(),
            video_duration: None,
        },
        like_count: likes,
        comment_count: comments,
        video_view_count: None,
        location: None,
        permalink: None,
        timestamp: chrono::DateTime::parse_from_rfc3339(timestamp)
            .unwrap()
            .with_timezone(&chrono::Utc),
        is_pinned: false,
        is_sponsored: false,
        likers: Vec::new(),
        comments: Vec::new(),
    }
}
