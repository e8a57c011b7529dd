//! Day-of-week and hour-of-day posting analysis (UTC)

use chrono::{Datelike, Timelike};
use serde::Serialize;

use super::stats::rounded_mean;
use crate::data::Post;

/// Weekday names in bucket order
pub const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBucket {
    pub count: usize,
    pub avg_likes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    pub day: &'static str,
    #[serde(flatten)]
    pub bucket: TimingBucket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourBucket {
    pub hour: u32,
    #[serde(flatten)]
    pub bucket: TimingBucket,
}

/// Posting activity by weekday and hour
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingStats {
    /// Sunday first
    pub by_day: Vec<DayBucket>,
    /// Hours 0 through 23
    pub by_hour: Vec<HourBucket>,
    pub best_day: Option<&'static str>,
    pub best_hour: Option<u32>,
}

#[derive(Default, Clone, Copy)]
struct Tally {
    count: usize,
    likes: u64,
}

impl Tally {
    fn bucket(self) -> TimingBucket {
        TimingBucket {
            count: self.count,
            avg_likes: rounded_mean(self.likes, self.count),
        }
    }
}

/// Index of the non-empty bucket with the highest average; first wins ties
fn best(buckets: &[TimingBucket]) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (index, bucket) in buckets.iter().enumerate() {
        if bucket.count == 0 {
            continue;
        }
        if best.is_none_or(|(_, avg)| bucket.avg_likes > avg) {
            best = Some((index, bucket.avg_likes));
        }
    }
    best.map(|(index, _)| index)
}

pub fn timing_stats(posts: &[Post]) -> TimingStats {
    let mut days = [Tally::default(); 7];
    let mut hours = [Tally::default(); 24];

    for post in posts {
        let day = post.timestamp.weekday().num_days_from_sunday() as usize;
        let hour = post.timestamp.hour() as usize;
        for tally in [&mut days[day], &mut hours[hour]] {
            tally.count += 1;
            tally.likes = tally.likes.saturating_add(post.like_count);
        }
    }

    let day_buckets: Vec<TimingBucket> = days.iter().map(|tally| tally.bucket()).collect();
    let hour_buckets: Vec<TimingBucket> = hours.iter().map(|tally| tally.bucket()).collect();

    TimingStats {
        best_day: best(&day_buckets).map(|index| DAY_NAMES[index]),
        best_hour: best(&hour_buckets).map(|index| index as u32),
        by_day: DAY_NAMES
            .iter()
            .zip(day_buckets)
            .map(|(&day, bucket)| DayBucket { day, bucket })
            .collect(),
        by_hour: (0u32..)
            .zip(hour_buckets)
            .map(|(hour, bucket)| HourBucket { hour, bucket })
            .collect(),
    }
}
