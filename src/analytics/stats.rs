//! Aggregates, rankings, monthly buckets and hashtag statistics

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::data::Post;

/// Integer mean rounded half up
pub(crate) fn rounded_mean(sum: u64, count: usize) -> u64 {
    if count == 0 {
        return 0;
    }
    let (sum, count) = (u128::from(sum), count as u128);
    ((2 * sum + count) / (2 * count)) as u64
}

/// Sum that saturates at `u64::MAX` instead of overflowing
pub(crate) fn saturating_total(values: impl IntoIterator<Item = u64>) -> u64 {
    values.into_iter().fold(0, u64::saturating_add)
}

fn median(mut values: Vec<u64>) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        ((u128::from(values[mid - 1]) + u128::from(values[mid]) + 1) / 2) as u64
    }
}

/// Engagement totals over a post collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    pub total_posts: usize,
    pub total_likes: u64,
    pub total_comments: u64,
    pub avg_likes: u64,
    pub avg_comments: u64,
    pub median_likes: u64,
}

pub fn aggregate_stats(posts: &[Post]) -> AggregateStats {
    if posts.is_empty() {
        return AggregateStats::default();
    }

    let total_likes = saturating_total(posts.iter().map(|post| post.like_count));
    let total_comments = saturating_total(posts.iter().map(|post| post.comment_count));

    AggregateStats {
        total_posts: posts.len(),
        total_likes,
        total_comments,
        avg_likes: rounded_mean(total_likes, posts.len()),
        avg_comments: rounded_mean(total_comments, posts.len()),
        median_likes: median(posts.iter().map(|post| post.like_count).collect()),
    }
}

/// Ranking metric for [`top_by_metric`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Likes,
    Comments,
}

impl Metric {
    fn of(self, post: &Post) -> u64 {
        match self {
            Metric::Likes => post.like_count,
            Metric::Comments => post.comment_count,
        }
    }
}

/// The `n` best posts by `metric`; ties keep their input order
pub fn top_by_metric(posts: &[Post], metric: Metric, n: usize) -> Vec<Post> {
    let mut ranked: Vec<&Post> = posts.iter().collect();
    // sort_by_key is stable
    ranked.sort_by_key(|post| std::cmp::Reverse(metric.of(post)));
    ranked.into_iter().take(n).cloned().collect()
}

/// Posts published in one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBucket {
    pub count: usize,
    pub posts: Vec<Post>,
}

/// Group posts by `YYYY-MM` of their UTC timestamp
///
/// Keys iterate in chronological order; posts keep encounter order.
pub fn group_by_month(posts: &[Post]) -> BTreeMap<String, MonthBucket> {
    let mut buckets: BTreeMap<String, MonthBucket> = BTreeMap::new();
    for post in posts {
        let bucket = buckets
            .entry(post.timestamp.format("%Y-%m").to_string())
            .or_insert_with(|| MonthBucket {
                count: 0,
                posts: Vec::new(),
            });
        bucket.count += 1;
        bucket.posts.push(post.clone());
    }
    buckets
}

/// Usage and performance of one hashtag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashtagStat {
    pub tag: String,
    /// Posts carrying the tag
    pub count: usize,
    pub avg_likes: u64,
}

/// Per-hashtag post count and average likes, most used first
///
/// Equal counts keep the order in which tags first appear.
pub fn hashtag_stats(posts: &[Post]) -> Vec<HashtagStat> {
    let mut order: Vec<&str> = Vec::new();
    let mut totals: HashMap<&str, (usize, u64)> = HashMap::new();

    for post in posts {
        let mut seen = HashSet::new();
        for tag in &post.hashtags {
            if !seen.insert(tag.as_str()) {
                continue;
            }
            let entry = totals.entry(tag.as_str()).or_insert_with(|| {
                order.push(tag.as_str());
                (0, 0)
            });
            entry.0 += 1;
            entry.1 = entry.1.saturating_add(post.like_count);
        }
    }

    let mut stats: Vec<HashtagStat> = order
        .into_iter()
        .map(|tag| {
            let (count, likes) = totals[tag];
            HashtagStat {
                tag: tag.to_string(),
                count,
                avg_likes: rounded_mean(likes, count),
            }
        })
        .collect();
    stats.sort_by_key(|stat| std::cmp::Reverse(stat.count));
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::test_post;

    #[test]
    fn test_aggregate_saturates_huge_counts() {
        let posts = vec![
            test_post("1", u64::MAX, u64::MAX, "2024-01-01T00:00:00Z"),
            test_post("2", 1, 1, "2024-01-02T00:00:00Z"),
        ];
        let stats = aggregate_stats(&posts);
        assert_eq!(stats.total_likes, u64::MAX);
        assert_eq!(stats.total_comments, u64::MAX);
        assert_eq!(stats.avg_likes, u64::MAX / 2 + 1);
        assert_eq!(stats.median_likes, u64::MAX / 2 + 1);

        let mut tagged = posts.clone();
        for post in &mut tagged {
            post.hashtags = vec!["big".to_string()];
        }
        assert_eq!(hashtag_stats(&tagged)[0].count, 2);
    }

    #[test]
    fn test_aggregate_stats() {
        let posts = vec![
            test_post("1", 10, 1, "2024-01-01T00:00:00Z"),
            test_post("2", 20, 2, "2024-01-02T00:00:00Z"),
            test_post("3", 30, 4, "2024-01-03T00:00:00Z"),
        ];
        let stats = aggregate_stats(&posts);
        assert_eq!(stats.total_posts, 3);
        assert_eq!(stats.total_likes, 60);
        assert_eq!(stats.total_comments, 7);
        assert_eq!(stats.avg_likes, 20);
        // 7 / 3 = 2.33
        assert_eq!(stats.avg_comments, 2);
        assert_eq!(stats.median_likes, 20);
    }

    #[test]
    fn test_median_even_and_empty() {
        let posts = vec![
            test_post("1", 20, 0, "2024-01-01T00:00:00Z"),
            test_post("2", 10, 0, "2024-01-02T00:00:00Z"),
        ];
        assert_eq!(aggregate_stats(&posts).median_likes, 15);
        assert_eq!(aggregate_stats(&[]), AggregateStats::default());
    }

    #[test]
    fn test_rounding_half_up() {
        assert_eq!(rounded_mean(5, 2), 3);
        assert_eq!(rounded_mean(7, 2), 4);
        assert_eq!(rounded_mean(4, 3), 1);
        assert_eq!(rounded_mean(0, 0), 0);
        assert_eq!(median(vec![10, 11]), 11);
    }

    #[test]
    fn test_top_by_metric_is_stable() {
        let posts = vec![
            test_post("a", 5, 3, "2024-01-01T00:00:00Z"),
            test_post("b", 9, 3, "2024-01-01T00:00:00Z"),
            test_post("c", 5, 1, "2024-01-01T00:00:00Z"),
            test_post("d", 9, 0, "2024-01-01T00:00:00Z"),
        ];

        let ids = |ranked: Vec<Post>| ranked.into_iter().map(|post| post.id).collect::<Vec<_>>();
        assert_eq!(ids(top_by_metric(&posts, Metric::Likes, 10)), ["b", "d", "a", "c"]);
        assert_eq!(ids(top_by_metric(&posts, Metric::Comments, 2)), ["a", "b"]);
        assert!(top_by_metric(&posts, Metric::Likes, 0).is_empty());
        assert!(top_by_metric(&[], Metric::Likes, 5).is_empty());
    }

    #[test]
    fn test_group_by_month() {
        let posts = vec![
            test_post("1", 0, 0, "2024-02-29T23:59:59Z"),
            test_post("2", 0, 0, "2024-03-01T00:00:00Z"),
            // 23:30 in UTC-2 is already March in UTC
            test_post("3", 0, 0, "2024-02-29T23:30:00-02:00"),
            test_post("4", 0, 0, "2023-12-15T12:00:00Z"),
        ];
        let buckets = group_by_month(&posts);

        assert_eq!(
            buckets.keys().collect::<Vec<_>>(),
            ["2023-12", "2024-02", "2024-03"]
        );
        assert_eq!(buckets["2024-03"].count, 2);
        assert_eq!(buckets["2024-03"].posts[0].id, "2");
        assert_eq!(buckets["2024-03"].posts[1].id, "3");
        assert_eq!(buckets.values().map(|bucket| bucket.count).sum::<usize>(), posts.len());
        assert!(group_by_month(&[]).is_empty());
    }

    #[test]
    fn test_hashtag_stats() {
        let mut first = test_post("1", 100, 10, "2024-01-01T00:00:00Z");
        first.hashtags = vec!["a".into()];
        let mut second = test_post("2", 50, 5, "2024-01-02T00:00:00Z");
        second.hashtags = vec!["a".into(), "b".into()];
        let mut third = test_post("3", 10, 0, "2024-01-03T00:00:00Z");
        third.hashtags = vec!["c".into(), "c".into()];

        let stats = hashtag_stats(&[first, second.clone()]);
        assert_eq!(
            stats,
            vec![
                HashtagStat { tag: "a".into(), count: 2, avg_likes: 75 },
                HashtagStat { tag: "b".into(), count: 1, avg_likes: 50 },
            ]
        );

        // "c" twice in one post counts once; equal counts keep first appearance
        let stats = hashtag_stats(&[third, second]);
        let tags: Vec<_> = stats.iter().map(|stat| (stat.tag.as_str(), stat.count)).collect();
        assert_eq!(tags, [("c", 1), ("a", 1), ("b", 1)]);
        assert!(hashtag_stats(&[]).is_empty());
    }
}
