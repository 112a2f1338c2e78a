//! Epoch-indexed expiry buckets.
//!
//! Time is coarsened to integer ticks of a configured granularity. Each
//! bucket holds the keys that fall due at one tick, so the sweeper can drop
//! a whole tick's worth of keys in one step and an insertion finds its
//! bucket with a single hash probe.
//!
//! ```text
//!   current_epoch = 7, granularity = 1s
//!
//!   buckets: { 8 → [k3],  9 → [k1, k4],  12 → [k2] }
//!                 ▲            ▲
//!                 │            └── k4 placed with ttl ≤ 2s at slot 1
//!                 └── due on the next tick
//! ```
//!
//! Every bound key remembers its `(epoch, slot)` coordinates on the cache
//! side, which makes re-binding and unbinding O(1) probes plus an O(bucket)
//! tail shift. [`unplace`](TtlBuckets::unplace) returns the keys whose slot
//! moved during that shift so the caller can patch their coordinates.

use std::time::Duration;

use rustc_hash::FxHashMap;

/// Mapping from epoch tick to the keys expiring at that tick.
///
/// The epoch counter only moves through [`advance`](Self::advance); the
/// structure itself never reads the wall clock.
#[derive(Debug)]
pub struct TtlBuckets<K> {
    granularity: Duration,
    current_epoch: u64,
    buckets: FxHashMap<u64, Vec<K>>,
}

impl<K> TtlBuckets<K>
where
    K: Clone,
{
    /// Creates an empty bucket map with the given tick length.
    pub fn new(granularity: Duration) -> Self {
        Self {
            granularity,
            current_epoch: 0,
            buckets: FxHashMap::default(),
        }
    }

    /// Tick length.
    #[inline]
    pub fn granularity(&self) -> Duration {
        self.granularity
    }

    /// Current epoch tick.
    #[inline]
    pub fn current_epoch(&self) -> u64 {
        self.current_epoch
    }

    /// Total number of bound keys across all buckets.
    pub fn bound_len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Binds `key` to the bucket `⌈ttl / granularity⌉` ticks from now and
    /// returns its `(epoch, slot)` coordinates.
    ///
    /// The tick count is rounded up and never less than one, so a TTL
    /// shorter than one granularity still survives until the next tick.
    pub fn place(&mut self, key: K, ttl: Duration) -> (u64, usize) {
        let epoch = self.current_epoch + self.ticks(ttl);
        let bucket = self.buckets.entry(epoch).or_default();
        bucket.push(key);
        (epoch, bucket.len() - 1)
    }

    /// Releases the binding at `(epoch, slot)`.
    ///
    /// The bucket tail is shifted left over the vacated slot; the shifted
    /// keys are returned in their new slot order starting at `slot`, so the
    /// caller can renumber the entries that own them. An emptied bucket is
    /// removed from the map entirely.
    pub fn unplace(&mut self, epoch: u64, slot: usize) -> Vec<K> {
        let Some(bucket) = self.buckets.get_mut(&epoch) else {
            debug_assert!(false, "unplace of unknown epoch {epoch}");
            return Vec::new();
        };
        debug_assert!(slot < bucket.len(), "unplace slot {slot} out of range");
        if slot >= bucket.len() {
            return Vec::new();
        }

        bucket.remove(slot);
        if bucket.is_empty() {
            self.buckets.remove(&epoch);
            return Vec::new();
        }
        bucket[slot..].to_vec()
    }

    /// Advances the epoch by one tick and returns the new value.
    #[inline]
    pub fn advance(&mut self) -> u64 {
        self.current_epoch += 1;
        self.current_epoch
    }

    /// Drains every bucket whose index is at or below the current epoch.
    ///
    /// All due buckets are visited, including any that sit below a gap; the
    /// returned keys are all equally overdue so their order carries no
    /// meaning.
    pub fn take_due(&mut self) -> Vec<K> {
        let due: Vec<u64> = self
            .buckets
            .keys()
            .filter(|&&epoch| epoch <= self.current_epoch)
            .copied()
            .collect();

        let mut keys = Vec::new();
        for epoch in due {
            if let Some(bucket) = self.buckets.remove(&epoch) {
                keys.extend(bucket);
            }
        }
        keys
    }

    /// Drops every binding without touching the epoch.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    fn ticks(&self, ttl: Duration) -> u64 {
        let granularity = self.granularity.as_nanos().max(1);
        ttl.as_nanos().div_ceil(granularity).max(1) as u64
    }

    /// Validates that no bucket is empty. Test and debug builds only.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        for (epoch, bucket) in &self.buckets {
            assert!(!bucket.is_empty(), "empty bucket retained at epoch {epoch}");
        }
    }

    /// Every `(epoch, slot, key)` binding currently held. Test and debug
    /// builds only.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_snapshot_bindings(&self) -> Vec<(u64, usize, K)> {
        let mut bindings = Vec::with_capacity(self.bound_len());
        for (&epoch, bucket) in &self.buckets {
            for (slot, key) in bucket.iter().enumerate() {
                bindings.push((epoch, slot, key.clone()));
            }
        }
        bindings
    }
}
