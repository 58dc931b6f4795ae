// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Result cache keyed by serialized call.
//!
//! An entry holds the string-encoded result fields of one call together with
//! the block they were observed at. Entries do not expire: a value stays valid
//! until a fresher write supersedes it or the cache is purged (on connection
//! changes). Block-based freshness is enforced on write, see [`CallCache::put`].

use alloy_primitives::BlockNumber;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::calls::CallKey;

pub mod types;

pub use types::TimestampMillis;

/// Last known result of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Ordered, string-encoded result fields
    pub results: Vec<String>,
    /// Block the results were read at
    pub block_number: BlockNumber,
    /// When the entry was written
    pub stored_at: TimestampMillis,
}

/// Statistics about cache usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups that found an entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Writes rejected because the cached entry came from a newer block
    pub stale_writes: u64,
    /// Number of times the cache was purged
    pub purges: u64,
    /// Current number of entries
    pub entries: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate as a percentage (0.0 to 100.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={}, misses={}, stale_writes={}, purges={}, entries={}, hit_rate={:.1}%",
            self.hits,
            self.misses,
            self.stale_writes,
            self.purges,
            self.entries,
            self.hit_rate()
        )
    }
}

/// In-memory map from serialized call to its last known result.
///
/// Owned by the [`Store`](crate::Store); only the dispatcher writes to it.
#[derive(Debug, Default)]
pub struct CallCache {
    entries: HashMap<CallKey, CacheEntry>,
    stats: CacheStats,
}

impl CallCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a call, counting the hit or miss
    pub fn get(&mut self, key: &CallKey) -> Option<&CacheEntry> {
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.hits += 1;
                Some(entry)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Looks up a call without touching statistics
    pub fn peek(&self, key: &CallKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Stores the results of a call observed at `block_number`.
    ///
    /// An entry from a newer block is kept and the write is dropped; an
    /// entry from the same or an older block is overwritten. Returns whether
    /// the write was applied.
    pub fn put(&mut self, key: CallKey, results: Vec<String>, block_number: BlockNumber) -> bool {
        if let Some(existing) = self.entries.get(&key) {
            if existing.block_number > block_number {
                debug!(
                    key = %key,
                    cached_block = existing.block_number,
                    block_number,
                    "Dropping stale cache write"
                );
                self.stats.stale_writes += 1;
                return false;
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                results,
                block_number,
                stored_at: TimestampMillis::now(),
            },
        );
        self.stats.entries = self.entries.len();
        true
    }

    /// Removes every entry
    pub fn purge(&mut self) {
        debug!(entries = self.entries.len(), "Purging call cache");
        self.entries.clear();
        self.stats.purges += 1;
        self.stats.entries = 0;
    }

    /// Current statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of cached calls
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::{OffChainCall, OffChainKind};

    fn key(n: u32) -> CallKey {
        OffChainCall::new(OffChainKind::PriceStats).arg(n).key()
    }

    fn results(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn get_after_put_returns_entry() {
        let mut cache = CallCache::new();
        assert!(cache.get(&key(1)).is_none());

        assert!(cache.put(key(1), results(&["42"]), 100));
        let entry = cache.get(&key(1)).unwrap();
        assert_eq!(entry.results, results(&["42"]));
        assert_eq!(entry.block_number, 100);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn entries_survive_block_advances() {
        let mut cache = CallCache::new();
        cache.put(key(1), results(&["7"]), 100);

        // Nothing is keyed on the current block; the entry stays until overwritten
        assert_eq!(cache.get(&key(1)).unwrap().block_number, 100);
        cache.put(key(1), results(&["8"]), 101);
        assert_eq!(cache.get(&key(1)).unwrap().results, results(&["8"]));
    }

    #[test]
    fn older_block_does_not_replace_newer_entry() {
        let mut cache = CallCache::new();
        cache.put(key(1), results(&["new"]), 200);

        assert!(!cache.put(key(1), results(&["old"]), 199));
        assert_eq!(cache.peek(&key(1)).unwrap().results, results(&["new"]));
        assert_eq!(cache.stats().stale_writes, 1);

        assert!(cache.put(key(1), results(&["same-block"]), 200));
    }

    #[test]
    fn purge_clears_everything() {
        let mut cache = CallCache::new();
        for n in 0..5 {
            cache.put(key(n), results(&["x"]), 1);
        }
        assert_eq!(cache.len(), 5);

        cache.purge();

        assert!(cache.is_empty());
        assert_eq!(cache.stats().purges, 1);
        assert_eq!(cache.stats().entries, 0);
        assert!(cache.get(&key(0)).is_none());
    }

    #[test]
    fn hit_rate() {
        let mut cache = CallCache::new();
        cache.get(&key(1));
        cache.put(key(1), results(&["1"]), 1);
        cache.get(&key(1));
        cache.get(&key(1));
        cache.get(&key(1));

        assert_eq!(cache.stats().hit_rate(), 75.0);
    }
}
