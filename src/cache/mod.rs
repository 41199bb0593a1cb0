// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Single-flight result cache.
//!
//! Each canonical key maps to one shared [`MemoFuture`]. An entry moves
//! through `Absent -> Pending -> Fulfilled` and only ever leaves the cache
//! when its call fails:
//!
//! - a miss stores a new pending handle before the caller gets it back
//! - a hit hands out a clone of the stored handle, pending or settled
//! - a failed call removes its own entry before any awaiter sees the error,
//!   so the next call with equal arguments starts fresh
//!
//! There is no expiry and no size limit.

use serde::{Deserialize, Serialize};
use std::fmt;

mod flight;

pub use flight::MemoFuture;
pub(crate) use flight::{FlightCache, Lookup};

/// Statistics about a memoized function's cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Calls served by an existing handle
    pub hits: u64,
    /// Calls that started a new invocation
    pub misses: u64,
    /// Entries removed because their invocation failed
    pub evictions: u64,
    /// Entries currently cached
    pub entries: usize,
    /// Cached entries whose invocation has not settled yet
    pub pending: usize,
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
            "hits={}, misses={}, evictions={}, entries={}, pending={}, hit_rate={:.1}%",
            self.hits,
            self.misses,
            self.evictions,
            self.entries,
            self.pending,
            self.hit_rate()
        )
    }
}
