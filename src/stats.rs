//! Statistics tracking for the entity cache
//!
//! Counts how lookups were resolved so that callers can tell how much
//! network work a series of evaluations caused.

use serde::{Deserialize, Serialize};

/// Counters collected by an [`EntityCache`](crate::cache::EntityCache).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from a fresh entry
    pub hits: usize,

    /// Fetches started because no fresh entry existed
    pub misses: usize,

    /// Lookups that found an entry older than the TTL
    pub expired: usize,

    /// Fetch results dropped because the cache was cleared meanwhile
    pub discarded: usize,

    /// Fetches that returned an error
    pub failed_fetches: usize,
}

impl CacheStats {
    /// Create a new `CacheStats` with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub(crate) fn record_expired(&mut self) {
        self.expired += 1;
    }

    pub(crate) fn record_discarded(&mut self) {
        self.discarded += 1;
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed_fetches += 1;
    }

    /// Total number of resolved lookups
    pub fn lookups(&self) -> usize {
        self.hits + self.misses
    }

    /// Fraction of lookups answered without fetching
    ///
    /// Returns `None` before the first lookup.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> Option<f64> {
        match self.lookups() {
            0 => None,
            n => Some(self.hits as f64 / n as f64),
        }
    }

    /// Get a formatted string summary of the statistics
    pub fn summary_string(&self) -> String {
        format!(
            "CacheStats {{ hits: {}, misses: {}, expired: {}, discarded: {}, failed: {} }}",
            self.hits, self.misses, self.expired, self.discarded, self.failed_fetches
        )
    }
}
