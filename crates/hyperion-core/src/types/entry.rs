//! Stored entry type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A persisted value plus the bookkeeping the store keeps for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntry<T> {
    /// The cached value
    pub value: T,
    /// When the value was written
    pub cached_at: DateTime<Utc>,
    /// Number of reads served
    #[serde(default)]
    pub reads: u64,
}

impl<T> CachedEntry<T> {
    pub fn new(value: T, cached_at: DateTime<Utc>) -> Self {
        Self {
            value,
            cached_at,
            reads: 0,
        }
    }

    /// Age of the entry relative to `now`; zero if `now` is earlier
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.cached_at).to_std().unwrap_or_default()
    }

    /// Whether the entry is at least `max_age` old
    pub fn is_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) >= max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_entry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entry = CachedEntry::new("test".to_string(), now);
        assert_eq!(entry.value, "test");
        assert_eq!(entry.reads, 0);
        assert_eq!(entry.age(now), Duration::ZERO);
    }

    #[test]
    fn test_entry_age() {
        let cached = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let entry = CachedEntry::new(1, cached);

        assert_eq!(entry.age(later), Duration::from_secs(86_400));
        assert!(entry.is_older_than(Duration::from_secs(86_400), later));
        assert!(!entry.is_older_than(Duration::from_secs(86_401), later));
        // clock skew never yields a negative age
        assert_eq!(entry.age(cached - chrono::TimeDelta::hours(1)), Duration::ZERO);
    }
}
