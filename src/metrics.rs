//! Operation counters for the cache façade.
//!
//! Counters are plain integers mutated under the cache lock, so recording
//! costs one increment and snapshots are consistent. Enabled by the
//! `metrics` feature.

/// Live counters owned by the cache.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
    pub(crate) expired: u64,
    pub(crate) evicted: u64,
}

impl CacheMetrics {
    #[inline]
    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    #[inline]
    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
    }

    #[inline]
    pub(crate) fn record_expired(&mut self, count: usize) {
        self.expired += count as u64;
    }

    #[inline]
    pub(crate) fn record_evicted(&mut self, count: usize) {
        self.evicted += count as u64;
    }
}

/// Point-in-time copy of the counters plus cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    /// Lookups that returned a live value.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Entries dropped because their TTL lapsed.
    pub expired: u64,
    /// Entries dropped by the replacement policy.
    pub evicted: u64,
    /// Entries resident at snapshot time.
    pub len: usize,
    /// Configured capacity.
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let mut metrics = CacheMetrics::default();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_expired(3);
        metrics.record_evicted(1);

        assert_eq!(metrics.hits, 2);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.expired, 3);
        assert_eq!(metrics.evicted, 1);
    }
}
