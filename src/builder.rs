//! Cache construction.
//!
//! A [`CacheBuilder`] collects the capacity, the replacement policy and the
//! epoch granularity, then [`build`](CacheBuilder::build)s the cache and
//! starts its sweeper bound to the supplied [`CancellationToken`].
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use tickcache::{CacheBuilder, CachePolicy, CancellationToken};
//!
//! let token = CancellationToken::new();
//! let cache = CacheBuilder::new(100)
//!     .policy(CachePolicy::Lfu)
//!     .granularity(Duration::from_millis(100))
//!     .build::<u64, String>(token.clone());
//!
//! cache.insert(1, "hello".to_string());
//! assert_eq!(cache.get(&1), Some("hello".to_string()));
//! token.cancel();
//! ```

use std::hash::Hash;
use std::time::Duration;

use crate::cache::Cache;
use crate::sync::CancellationToken;

/// Default epoch granularity: one second.
pub const DEFAULT_GRANULARITY: Duration = Duration::from_secs(1);

/// Available replacement policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Discard the least recently used entry first.
    #[default]
    Lru,
    /// Discard the least frequently used entry first.
    Lfu,
    /// Adaptive replacement: balances recency against frequency.
    Arc,
    /// Never discard; entries leave only by TTL or explicit removal.
    NoEviction,
}

/// Builder for [`Cache`] instances.
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    capacity: usize,
    policy: CachePolicy,
    granularity: Duration,
}

impl CacheBuilder {
    /// Starts a builder for a cache holding up to `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; a cache that can hold nothing is a
    /// configuration error.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive, got 0");
        Self {
            capacity,
            policy: CachePolicy::default(),
            granularity: DEFAULT_GRANULARITY,
        }
    }

    /// Selects the replacement policy. Defaults to [`CachePolicy::Lru`].
    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the epoch tick length. Defaults to [`DEFAULT_GRANULARITY`].
    ///
    /// Expiry resolution is coarsened to this duration: a TTL is rounded up
    /// to whole ticks and the sweeper wakes once per tick.
    pub fn granularity(mut self, granularity: Duration) -> Self {
        self.granularity = granularity;
        self
    }

    /// Builds the cache and spawns its background sweeper.
    ///
    /// The sweeper runs until `token` is cancelled or every handle to the
    /// cache is dropped. After cancellation the cache stays usable but no
    /// longer expires entries on its own.
    pub fn build<K, V>(self, token: CancellationToken) -> Cache<K, V>
    where
        K: Clone + Eq + Hash + Send + 'static,
        V: Send + 'static,
    {
        Cache::spawn(self.capacity, self.policy, self.granularity, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let builder = CacheBuilder::new(10);
        assert_eq!(builder.capacity, 10);
        assert_eq!(builder.policy, CachePolicy::Lru);
        assert_eq!(builder.granularity, DEFAULT_GRANULARITY);
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn zero_capacity_panics() {
        let _ = CacheBuilder::new(0);
    }

    #[test]
    fn all_policies_build_working_caches() {
        let policies = [
            CachePolicy::Lru,
            CachePolicy::Lfu,
            CachePolicy::Arc,
            CachePolicy::NoEviction,
        ];

        for policy in policies {
            let token = CancellationToken::new();
            let cache = CacheBuilder::new(10)
                .policy(policy)
                .build::<u64, String>(token.clone());

            cache.insert(1, "one".to_string());
            cache.insert(2, "two".to_string());
            assert_eq!(cache.get(&1), Some("one".to_string()), "{policy:?}");
            assert_eq!(cache.get(&3), None, "{policy:?}");
            assert_eq!(cache.len(), 2, "{policy:?}");

            cache.insert(1, "ONE".to_string());
            assert_eq!(cache.get(&1), Some("ONE".to_string()), "{policy:?}");

            cache.remove(&1);
            assert_eq!(cache.len(), 1, "{policy:?}");
            token.cancel();
        }
    }

    #[test]
    fn capacity_enforced_for_replacing_policies() {
        for policy in [CachePolicy::Lru, CachePolicy::Lfu, CachePolicy::Arc] {
            let token = CancellationToken::new();
            let cache = CacheBuilder::new(2).policy(policy).build::<u64, u64>(token);

            for i in 0..10 {
                cache.insert(i, i);
            }
            assert_eq!(cache.len(), 2, "{policy:?}");
        }
    }
}
