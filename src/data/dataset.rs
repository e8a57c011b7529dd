//! The four named datasets and their store keys

use std::fmt;

const KEY_PREFIX: &str = "ig";

/// One of the four snapshot datasets held for the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Profile,
    Posts,
    Followers,
    Following,
}

impl Dataset {
    /// Every dataset, in the order a snapshot is committed
    pub const ALL: [Dataset; 4] = [
        Dataset::Profile,
        Dataset::Posts,
        Dataset::Followers,
        Dataset::Following,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Posts => "posts",
            Self::Followers => "followers",
            Self::Following => "following",
        }
    }

    /// Store key scoped by subject, e.g. `ig:posts:alice`
    pub fn key(&self, subject: &str) -> String {
        format!("{}:{}:{}", KEY_PREFIX, self.as_str(), subject)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store key of the last-refresh marker
pub fn last_refresh_key(subject: &str) -> String {
    format!("{}:last_refresh:{}", KEY_PREFIX, subject)
}

/// Store key of the refresh status record
pub fn refresh_status_key(subject: &str) -> String {
    format!("{}:refresh_status:{}", KEY_PREFIX, subject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_distinct_and_scoped() {
        let keys: HashSet<String> = Dataset::ALL
            .iter()
            .map(|dataset| dataset.key("alice"))
            .chain([last_refresh_key("alice"), refresh_status_key("alice")])
            .collect();
        assert_eq!(keys.len(), 6);
        assert!(keys.iter().all(|key| key.ends_with(":alice")));
        assert_eq!(Dataset::Following.key("bob"), "ig:following:bob");
    }
}
