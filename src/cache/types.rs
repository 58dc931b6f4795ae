// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Strong types for cache and failure metadata

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unix timestamp in milliseconds
///
/// Stamped on cache entries when they are written and on failure records when
/// a request fails, so that cooldowns can be measured against wall-clock time.
///
/// # Examples
///
/// ```
/// use poolbatch::TimestampMillis;
/// use std::time::Duration;
///
/// let ts = TimestampMillis::now();
/// assert!(!ts.is_older_than(Duration::from_secs(60)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimestampMillis(u128);

impl TimestampMillis {
    /// Creates a new timestamp representing the current time
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(millis)
    }

    /// Creates a timestamp from a raw millisecond value
    pub const fn from_millis(millis: u128) -> Self {
        Self(millis)
    }

    /// Raw milliseconds since the Unix epoch
    pub const fn as_millis(&self) -> u128 {
        self.0
    }

    /// Age of this timestamp relative to now, zero if it lies in the future
    pub fn age_since_now(&self) -> Duration {
        let age_millis = Self::now().0.saturating_sub(self.0);
        Duration::from_millis(u64::try_from(age_millis).unwrap_or(u64::MAX))
    }

    /// Checks if this timestamp is older than the given duration
    pub fn is_older_than(&self, duration: Duration) -> bool {
        self.age_since_now() > duration
    }
}

impl Default for TimestampMillis {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now_millis() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis()
    }

    #[test]
    fn timestamp_millis_age() {
        let past = TimestampMillis::from_millis(now_millis() - 5000);

        let age = past.age_since_now();
        assert!(age >= Duration::from_millis(5000));
        assert!(age < Duration::from_millis(6000));
    }

    #[test]
    fn timestamp_millis_age_future() {
        let future = TimestampMillis::from_millis(now_millis() + 5000);
        assert_eq!(future.age_since_now(), Duration::ZERO);
    }

    #[test]
    fn timestamp_millis_is_older_than() {
        let past = TimestampMillis::from_millis(now_millis() - 5000);

        assert!(past.is_older_than(Duration::from_millis(4000)));
        assert!(!past.is_older_than(Duration::from_millis(6000)));
    }

    #[test]
    fn timestamp_millis_serialization() {
        let ts = TimestampMillis::from_millis(1234567890);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "1234567890");

        let deserialized: TimestampMillis = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, ts);
    }
}
