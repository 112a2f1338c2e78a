//! # Cache façade
//!
//! Binds one replacement policy and the TTL bucket map under a single spin
//! lock, and owns the background sweeper that advances the epoch clock.
//!
//! ```text
//!   caller threads                        sweeper thread
//!        │                                     │ every granularity:
//!        ▼                                     ▼
//!   ┌─────────────────────── SpinLock ─────────────────────────┐
//!   │                                                          │
//!   │   Engine (LRU | LFU | ARC | NoEviction)                  │
//!   │     key → Entry { value, epoch, slot }                   │
//!   │                                                          │
//!   │   TtlBuckets                                             │
//!   │     epoch tick → [keys due at that tick]                 │
//!   │     current_epoch (advanced only by the sweeper)         │
//!   └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifetime rules
//!
//! - An entry leaves the cache through exactly one of: explicit
//!   [`remove`](Cache::remove), policy eviction on overflow, or expiry.
//! - On overflow the cascade frees space **expired-first**: all due buckets
//!   are swept before the policy picks victims. A key with a TTL goes on
//!   schedule; a hot-but-stale entry cannot outlive an eviction round.
//! - Expiry is coarse: a TTL is rounded up to whole epoch ticks, and the
//!   sweeper advances the epoch first, then sweeps every bucket at or below
//!   it.
//!
//! ## Bookkeeping invariants
//!
//! Every entry with a finite epoch owns exactly one `(epoch, slot)`
//! coordinate into the bucket map, and every key in a bucket belongs to a
//! live entry. All removal paths release the binding, and because releasing
//! shifts the bucket tail left, the shifted keys get their `slot` patched in
//! the same critical section.
//!
//! ## Sharing
//!
//! [`Cache`] is a cloneable handle. Values are cloned out on
//! [`get`](Cache::get); nothing borrowed from the cache escapes the lock.
//! For values that are expensive to clone, store `Arc<T>`.
//!
//! The sweeper exits when its [`CancellationToken`] is cancelled or when
//! the last cache handle is dropped, whichever comes first. A cache whose
//! sweeper has exited keeps serving lookups but no longer expires entries.

use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use crate::builder::CachePolicy;
use crate::ds::TtlBuckets;
#[cfg(feature = "metrics")]
use crate::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::policy::{ArcPolicy, LfuPolicy, LruPolicy, NoEvictionPolicy};
use crate::sync::{CancellationToken, SpinLock};
use crate::traits::ReplacementPolicy;

/// Epoch sentinel for entries without a TTL.
const NO_EXPIRY: u64 = u64::MAX;

/// A cached value plus its expiry coordinates.
#[derive(Debug)]
struct Entry<V> {
    value: V,
    /// Bucket index, or [`NO_EXPIRY`].
    epoch: u64,
    /// Position inside the bucket; unused without a TTL.
    slot: usize,
}

impl<V> Entry<V> {
    fn pinned(value: V) -> Self {
        Self {
            value,
            epoch: NO_EXPIRY,
            slot: 0,
        }
    }

    fn expiring(value: V, epoch: u64, slot: usize) -> Self {
        Self { value, epoch, slot }
    }

    fn binding(&self) -> Option<(u64, usize)> {
        (self.epoch != NO_EXPIRY).then_some((self.epoch, self.slot))
    }
}

/// Runtime-selected replacement engine.
enum Engine<K, V>
where
    K: Clone + Eq + Hash,
{
    Lru(LruPolicy<K, Entry<V>>),
    Lfu(LfuPolicy<K, Entry<V>>),
    Arc(ArcPolicy<K, Entry<V>>),
    NoEviction(NoEvictionPolicy<K, Entry<V>>),
}

impl<K, V> ReplacementPolicy<K, Entry<V>> for Engine<K, V>
where
    K: Clone + Eq + Hash,
{
    fn insert(&mut self, key: K, value: Entry<V>) -> Vec<(K, Entry<V>)> {
        match self {
            Engine::Lru(lru) => lru.insert(key, value),
            Engine::Lfu(lfu) => lfu.insert(key, value),
            Engine::Arc(arc) => arc.insert(key, value),
            Engine::NoEviction(none) => none.insert(key, value),
        }
    }

    fn lookup(&mut self, key: &K) -> Option<&Entry<V>> {
        match self {
            Engine::Lru(lru) => lru.lookup(key),
            Engine::Lfu(lfu) => lfu.lookup(key),
            Engine::Arc(arc) => arc.lookup(key),
            Engine::NoEviction(none) => none.lookup(key),
        }
    }

    fn peek_mut(&mut self, key: &K) -> Option<&mut Entry<V>> {
        match self {
            Engine::Lru(lru) => lru.peek_mut(key),
            Engine::Lfu(lfu) => lfu.peek_mut(key),
            Engine::Arc(arc) => arc.peek_mut(key),
            Engine::NoEviction(none) => none.peek_mut(key),
        }
    }

    fn remove(&mut self, key: &K) -> Option<Entry<V>> {
        match self {
            Engine::Lru(lru) => lru.remove(key),
            Engine::Lfu(lfu) => lfu.remove(key),
            Engine::Arc(arc) => arc.remove(key),
            Engine::NoEviction(none) => none.remove(key),
        }
    }

    fn evict(&mut self, count: usize) -> Vec<(K, Entry<V>)> {
        match self {
            Engine::Lru(lru) => lru.evict(count),
            Engine::Lfu(lfu) => lfu.evict(count),
            Engine::Arc(arc) => arc.evict(count),
            Engine::NoEviction(none) => none.evict(count),
        }
    }

    fn len(&self) -> usize {
        match self {
            Engine::Lru(lru) => lru.len(),
            Engine::Lfu(lfu) => lfu.len(),
            Engine::Arc(arc) => arc.len(),
            Engine::NoEviction(none) => none.len(),
        }
    }
}

/// Everything guarded by the cache lock.
struct CacheInner<K, V>
where
    K: Clone + Eq + Hash,
{
    engine: Engine<K, V>,
    ttl: TtlBuckets<K>,
    capacity: usize,
    #[cfg(feature = "metrics")]
    metrics: CacheMetrics,
}

impl<K, V> CacheInner<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Releases the bucket binding at `(epoch, slot)` and renumbers the
    /// entries whose keys shifted into the vacated slots.
    fn release_binding(
        ttl: &mut TtlBuckets<K>,
        engine: &mut Engine<K, V>,
        epoch: u64,
        slot: usize,
    ) {
        for (offset, key) in ttl.unplace(epoch, slot).into_iter().enumerate() {
            if let Some(entry) = engine.peek_mut(&key) {
                entry.slot = slot + offset;
            }
        }
    }

    /// Removes every key in a due bucket from the engine. Returns the
    /// number of entries that actually expired.
    fn sweep_due(&mut self) -> usize {
        let mut removed = 0;
        for key in self.ttl.take_due() {
            if self.engine.remove(&key).is_some() {
                removed += 1;
            }
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_expired(removed);
        removed
    }

    /// One sweeper tick: advance the epoch, then expire everything due.
    fn tick(&mut self) {
        self.ttl.advance();
        self.sweep_due();
    }

    /// The eviction cascade: expire first, then ask the policy for the
    /// remainder.
    fn reclaim(&mut self, need: usize) {
        let expired = self.sweep_due();
        if expired >= need {
            return;
        }

        let victims = self.engine.evict(need - expired);
        #[cfg(feature = "metrics")]
        self.metrics.record_evicted(victims.len());
        for (_, entry) in victims {
            if let Some((epoch, slot)) = entry.binding() {
                Self::release_binding(&mut self.ttl, &mut self.engine, epoch, slot);
            }
        }
    }

    /// Hands an entry to the engine, releasing bindings of anything the
    /// engine displaced, then restores the capacity bound.
    fn admit(&mut self, key: K, entry: Entry<V>) {
        for (_, displaced) in self.engine.insert(key, entry) {
            if let Some((epoch, slot)) = displaced.binding() {
                Self::release_binding(&mut self.ttl, &mut self.engine, epoch, slot);
            }
        }

        let overflow = self.engine.len().saturating_sub(self.capacity);
        if overflow > 0 {
            self.reclaim(overflow);
        }
    }

    /// Validates the engine/bucket bookkeeping. Test builds only.
    #[cfg(test)]
    fn debug_validate_invariants(&mut self) {
        self.ttl.debug_validate_invariants();
        match &self.engine {
            Engine::Lru(lru) => lru.debug_validate_invariants(),
            Engine::Lfu(lfu) => lfu.debug_validate_invariants(),
            Engine::Arc(arc) => arc.debug_validate_invariants(),
            Engine::NoEviction(_) => {},
        }

        // Every bucket key must map to a live entry that points back at its
        // own coordinates.
        let snapshot = self.ttl.debug_snapshot_bindings();
        let mut bound = 0usize;
        for (epoch, slot, key) in snapshot {
            bound += 1;
            let entry = self
                .engine
                .peek_mut(&key)
                .expect("bucket key without a live entry");
            assert_eq!((entry.epoch, entry.slot), (epoch, slot), "stale binding");
        }
        assert!(bound <= self.engine.len(), "more bindings than entries");
    }
}

/// Shared handle to an expiring, capacity-bounded cache.
///
/// Construct through [`crate::builder::CacheBuilder`]; see the
/// [module docs](self) for the lifetime and sharing rules.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tickcache::{CacheBuilder, CachePolicy, CancellationToken};
///
/// let token = CancellationToken::new();
/// let cache = CacheBuilder::new(2)
///     .policy(CachePolicy::Lru)
///     .build::<&str, i32>(token.clone());
///
/// cache.insert("a", 1);
/// cache.insert_with_ttl("b", 2, Duration::from_secs(60));
/// assert_eq!(cache.get(&"a"), Some(1));
///
/// token.cancel();
/// ```
pub struct Cache<K, V>
where
    K: Clone + Eq + Hash,
{
    inner: Arc<SpinLock<CacheInner<K, V>>>,
}

impl<K, V> Clone for Cache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    /// Builds the cache and spawns its sweeper thread.
    pub(crate) fn spawn(
        capacity: usize,
        policy: CachePolicy,
        granularity: Duration,
        token: CancellationToken,
    ) -> Self {
        let engine = match policy {
            CachePolicy::Lru => Engine::Lru(LruPolicy::new(capacity)),
            CachePolicy::Lfu => Engine::Lfu(LfuPolicy::new(capacity)),
            CachePolicy::Arc => Engine::Arc(ArcPolicy::new(capacity)),
            CachePolicy::NoEviction => Engine::NoEviction(NoEvictionPolicy::new(capacity)),
        };

        let inner = Arc::new(SpinLock::new(CacheInner {
            engine,
            ttl: TtlBuckets::new(granularity),
            capacity,
            #[cfg(feature = "metrics")]
            metrics: CacheMetrics::default(),
        }));

        let state = Arc::downgrade(&inner);
        thread::spawn(move || run_sweeper(state, token, granularity));

        Self { inner }
    }
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Stores `value` under `key` without an expiry.
    ///
    /// An existing entry keeps its eviction standing: only the value (and
    /// any previous TTL binding) is replaced. May evict one entry through
    /// the expired-first cascade if the cache was full.
    pub fn insert(&self, key: K, value: V) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let binding = inner.engine.peek_mut(&key).and_then(|entry| entry.binding());
        if let Some((epoch, slot)) = binding {
            CacheInner::release_binding(&mut inner.ttl, &mut inner.engine, epoch, slot);
        }
        inner.admit(key, Entry::pinned(value));
    }

    /// Stores `value` under `key`, expiring `ttl` from now.
    ///
    /// The TTL is rounded up to whole epoch ticks and is at least one tick.
    /// Re-setting a key replaces its previous expiry entirely.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let binding = inner.engine.peek_mut(&key).and_then(|entry| entry.binding());
        if let Some((epoch, slot)) = binding {
            CacheInner::release_binding(&mut inner.ttl, &mut inner.engine, epoch, slot);
        }
        let (epoch, slot) = inner.ttl.place(key.clone(), ttl);
        inner.admit(key, Entry::expiring(value, epoch, slot));
    }

    /// Returns the value for `key`, or `None` if absent or expired.
    ///
    /// A hit counts as an access for the replacement policy. An entry whose
    /// epoch has already passed is treated as absent and removed on the
    /// spot instead of waiting for the sweeper.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let current = inner.ttl.current_epoch();

        let Some(entry) = inner.engine.lookup(key) else {
            #[cfg(feature = "metrics")]
            inner.metrics.record_miss();
            return None;
        };

        if entry.epoch == NO_EXPIRY || entry.epoch > current {
            let value = entry.value.clone();
            #[cfg(feature = "metrics")]
            inner.metrics.record_hit();
            return Some(value);
        }

        // Due but not yet swept: expire it now.
        let binding = entry.binding();
        inner.engine.remove(key);
        if let Some((epoch, slot)) = binding {
            CacheInner::release_binding(&mut inner.ttl, &mut inner.engine, epoch, slot);
        }
        #[cfg(feature = "metrics")]
        {
            inner.metrics.record_expired(1);
            inner.metrics.record_miss();
        }
        None
    }

    /// Removes `key` if present. Removing an absent key is a no-op.
    pub fn remove(&self, key: &K) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(entry) = inner.engine.remove(key)
            && let Some((epoch, slot)) = entry.binding()
        {
            CacheInner::release_binding(&mut inner.ttl, &mut inner.engine, epoch, slot);
        }
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.lock().engine.len()
    }

    /// Returns `true` if no entries are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity in entries.
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Length of one epoch tick.
    pub fn granularity(&self) -> Duration {
        self.inner.lock().ttl.granularity()
    }

    /// Copies out the operation counters.
    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        let guard = self.inner.lock();
        CacheMetricsSnapshot {
            hits: guard.metrics.hits,
            misses: guard.metrics.misses,
            expired: guard.metrics.expired,
            evicted: guard.metrics.evicted,
            len: guard.engine.len(),
            capacity: guard.capacity,
        }
    }

    /// Runs one sweeper tick synchronously. Test builds only.
    #[cfg(test)]
    fn debug_tick(&self) {
        self.inner.lock().tick();
    }

    #[cfg(test)]
    fn debug_validate_invariants(&self) {
        self.inner.lock().debug_validate_invariants();
    }
}

impl<K, V> std::fmt::Debug for Cache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.inner.lock();
        f.debug_struct("Cache")
            .field("len", &guard.engine.len())
            .field("capacity", &guard.capacity)
            .field("current_epoch", &guard.ttl.current_epoch())
            .finish_non_exhaustive()
    }
}

/// Sweeper loop: one tick per granularity until cancelled or orphaned.
fn run_sweeper<K, V>(
    state: Weak<SpinLock<CacheInner<K, V>>>,
    token: CancellationToken,
    granularity: Duration,
) where
    K: Clone + Eq + Hash,
{
    loop {
        thread::sleep(granularity);
        if token.is_cancelled() {
            return;
        }
        // The cache may have been dropped while we slept.
        let Some(state) = state.upgrade() else { return };
        state.lock().tick();
    }
}
