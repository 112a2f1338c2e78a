//! # Replacement policy contract
//!
//! Every replacement engine in [`crate::policy`] implements the single
//! [`ReplacementPolicy`] trait. The cache façade owns exactly one policy and
//! drives it under its lock; policies know nothing about time, capacity
//! enforcement, or each other.
//!
//! ```text
//!                  ┌──────────────────────────────────────────┐
//!                  │         ReplacementPolicy<K, V>          │
//!                  │                                          │
//!                  │  insert(K, V) → Vec<(K, V)>  (displaced) │
//!                  │  lookup(&K) → Option<&V>     (an access) │
//!                  │  peek_mut(&K) → Option<&mut V> (silent)  │
//!                  │  remove(&K) → Option<V>                  │
//!                  │  evict(n) → Vec<(K, V)>                  │
//!                  │  len() → usize                           │
//!                  └───────┬──────────┬──────────┬────────┬───┘
//!                          │          │          │        │
//!                     LruPolicy  LfuPolicy  ArcPolicy  NoEvictionPolicy
//! ```
//!
//! ## Contract summary
//!
//! | Operation  | Reorders? | Notes                                          |
//! |------------|-----------|------------------------------------------------|
//! | `insert`   | no*       | re-set replaces the value in place             |
//! | `lookup`   | yes       | bumps recency (LRU/ARC) or frequency (LFU)     |
//! | `peek_mut` | no        | bookkeeping access, standing untouched         |
//! | `remove`   | -         | idempotent, absent key is a no-op              |
//! | `evict`    | -         | removes up to `n` victims by the policy's rule |
//!
//! *ARC is the exception: re-setting a key resident in its recency list
//! promotes it to the frequency list, which is part of the ARC algorithm
//! itself rather than of this contract.
//!
//! The `insert`/`lookup` asymmetry is deliberate: re-setting an existing key
//! updates its *value* but not its *standing*, so a writer refreshing data
//! cannot keep a cold entry alive.

/// A capacity-replacement engine over opaque values.
///
/// The façade stores its own entry bookkeeping inside `V`; policies move
/// values, never clone them. Victim entries flow back to the caller from
/// [`insert`](Self::insert), [`remove`](Self::remove) and
/// [`evict`](Self::evict) so the caller can release any external state bound
/// to them.
pub trait ReplacementPolicy<K, V> {
    /// Inserts `key` or, if present, replaces its value in place.
    ///
    /// Replacing does not touch the entry's recency or frequency standing
    /// (ARC promotes instead, see the module docs). The policy never
    /// enforces capacity here; the returned vector holds entries the policy
    /// displaced as a side effect of admission (only ARC produces any).
    fn insert(&mut self, key: K, value: V) -> Vec<(K, V)>;

    /// Returns the value for `key`, recording the access.
    ///
    /// This is the only read that updates eviction order.
    fn lookup(&mut self, key: &K) -> Option<&V>;

    /// Returns the value for `key` without recording an access.
    ///
    /// Used by the façade for bookkeeping edits that must not perturb the
    /// eviction order.
    fn peek_mut(&mut self, key: &K) -> Option<&mut V>;

    /// Removes `key`, returning its entry. Absent keys are a no-op.
    fn remove(&mut self, key: &K) -> Option<V>;

    /// Removes up to `count` entries chosen by the policy's own rule.
    ///
    /// Returns the victims; fewer than `count` if the policy runs dry.
    fn evict(&mut self, count: usize) -> Vec<(K, V)>;

    /// Number of live entries.
    fn len(&self) -> usize;

    /// Returns `true` if the policy holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
