//! # Least Frequently Used (LFU) replacement policy
//!
//! Entries live in frequency buckets chained in ascending order, with a
//! permanent head bucket at frequency 0 that receives fresh insertions.
//! Each bucket keeps its members in an ordered list (newest at the front),
//! so same-frequency eviction removes the oldest member first.
//!
//! ```text
//!   bucket chain:  [ freq 0 ] ──► [ freq 2 ] ──► [ freq 5 ]
//!                     │  │            │              │
//!                   members        members        members
//!                  (new keys)
//!
//!   lookup(k): move k from its bucket at freq f to the neighbouring
//!              bucket at f + 1, creating it on demand; an emptied
//!              bucket (except freq 0) is dropped.
//!   evict(n):  scan the chain from the head, draining bucket tails
//!              until n victims are collected.
//! ```
//!
//! ## Operations
//!
//! | Operation  | Time     | Notes                                      |
//! |------------|----------|--------------------------------------------|
//! | `insert`   | O(1)     | new keys attach to the freq-0 bucket       |
//! | `lookup`   | O(1)     | bucket hop is a single neighbour step      |
//! | `remove`   | O(1)     | unlink from bucket + index                 |
//! | `evict(n)` | O(n + b) | b = buckets scanned                        |
//!
//! Re-setting an existing key replaces the value but does **not** change
//! its frequency; only `lookup` does.
//!
//! Member storage is a slot arena (`Vec` plus free list) with list links by
//! slot index, so the policy contains no raw pointers.

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::traits::ReplacementPolicy;

#[derive(Debug)]
struct Item<K, V> {
    key: K,
    value: V,
    freq: u64,
}

#[derive(Debug)]
struct Slot<K, V> {
    item: Option<Item<K, V>>,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Default)]
struct BucketList {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

#[derive(Debug, Default)]
struct Bucket {
    list: BucketList,
    prev: Option<u64>,
    next: Option<u64>,
}

/// LFU replacement engine.
///
/// # Example
///
/// ```
/// use tickcache::policy::lfu::LfuPolicy;
/// use tickcache::traits::ReplacementPolicy;
///
/// let mut lfu: LfuPolicy<&str, i32> = LfuPolicy::new(16);
/// lfu.insert("cold", 1);
/// lfu.insert("hot", 2);
/// lfu.lookup(&"hot");
///
/// // "cold" still sits in the frequency-0 bucket and is evicted first.
/// assert_eq!(lfu.evict(1), vec![("cold", 1)]);
/// ```
#[derive(Debug)]
pub struct LfuPolicy<K, V>
where
    K: Clone + Eq + Hash,
{
    slots: Vec<Slot<K, V>>,
    free_list: Vec<usize>,
    index: FxHashMap<K, usize>,
    buckets: FxHashMap<u64, Bucket>,
}

impl<K, V> LfuPolicy<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Creates an empty policy, pre-sizing the arena for `capacity` keys.
    ///
    /// The frequency-0 bucket exists from construction and is never
    /// dropped.
    pub fn new(capacity: usize) -> Self {
        let mut buckets = FxHashMap::default();
        buckets.insert(0, Bucket::default());
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            buckets,
        }
    }

    /// Current access frequency of `key`, if present.
    pub fn frequency(&self, key: &K) -> Option<u64> {
        let idx = *self.index.get(key)?;
        self.slots[idx].item.as_ref().map(|item| item.freq)
    }

    fn allocate_slot(&mut self, item: Item<K, V>) -> usize {
        if let Some(idx) = self.free_list.pop() {
            self.slots[idx] = Slot {
                item: Some(item),
                prev: None,
                next: None,
            };
            idx
        } else {
            self.slots.push(Slot {
                item: Some(item),
                prev: None,
                next: None,
            });
            self.slots.len() - 1
        }
    }

    fn free_slot(&mut self, idx: usize) -> Item<K, V> {
        let item = self.slots[idx].item.take().expect("lfu item missing");
        self.slots[idx].prev = None;
        self.slots[idx].next = None;
        self.free_list.push(idx);
        item
    }

    fn list_push_front(slots: &mut [Slot<K, V>], list: &mut BucketList, idx: usize) {
        let old_head = list.head;
        slots[idx].prev = None;
        slots[idx].next = old_head;
        if let Some(head_idx) = old_head {
            slots[head_idx].prev = Some(idx);
        } else {
            list.tail = Some(idx);
        }
        list.head = Some(idx);
        list.len += 1;
    }

    fn list_remove(slots: &mut [Slot<K, V>], list: &mut BucketList, idx: usize) {
        let prev = slots[idx].prev;
        let next = slots[idx].next;
        if let Some(prev_idx) = prev {
            slots[prev_idx].next = next;
        } else {
            list.head = next;
        }
        if let Some(next_idx) = next {
            slots[next_idx].prev = prev;
        } else {
            list.tail = prev;
        }
        slots[idx].prev = None;
        slots[idx].next = None;
        list.len -= 1;
    }

    fn list_pop_back(slots: &mut [Slot<K, V>], list: &mut BucketList) -> Option<usize> {
        let idx = list.tail?;
        Self::list_remove(slots, list, idx);
        Some(idx)
    }

    /// Removes the bucket at `freq` from the chain, splicing its neighbours.
    fn unlink_bucket(&mut self, freq: u64) {
        debug_assert_ne!(freq, 0, "the freq-0 bucket is permanent");
        let Some(bucket) = self.buckets.remove(&freq) else {
            return;
        };
        if let Some(prev_freq) = bucket.prev
            && let Some(prev) = self.buckets.get_mut(&prev_freq)
        {
            prev.next = bucket.next;
        }
        if let Some(next_freq) = bucket.next
            && let Some(next) = self.buckets.get_mut(&next_freq)
        {
            next.prev = bucket.prev;
        }
    }

    /// Detaches `idx` from the bucket at `freq`, dropping the bucket if it
    /// emptied (frequency 0 stays).
    fn detach_from_bucket(&mut self, freq: u64, idx: usize) {
        let slots = &mut self.slots;
        let emptied = {
            let bucket = self.buckets.get_mut(&freq).expect("lfu bucket missing");
            Self::list_remove(slots, &mut bucket.list, idx);
            bucket.list.len == 0
        };
        if emptied && freq != 0 {
            self.unlink_bucket(freq);
        }
    }

    /// Keys in eviction order (lowest frequency first, oldest first within a
    /// bucket). Test and debug builds only.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_snapshot_keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.index.len());
        let mut cursor = Some(0u64);
        while let Some(freq) = cursor {
            let bucket = &self.buckets[&freq];
            // Tail-first within the bucket: the next victim leads.
            let mut current = bucket.list.tail;
            while let Some(idx) = current {
                let slot = &self.slots[idx];
                keys.push(slot.item.as_ref().expect("lfu item missing").key.clone());
                current = slot.prev;
            }
            cursor = bucket.next;
        }
        keys
    }

    /// Validates chain ordering and index consistency. Test and debug
    /// builds only.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        assert!(self.buckets.contains_key(&0), "freq-0 bucket missing");

        let mut seen = 0usize;
        let mut cursor = Some(0u64);
        let mut prev_freq: Option<u64> = None;
        while let Some(freq) = cursor {
            let bucket = &self.buckets[&freq];
            assert_eq!(bucket.prev, prev_freq, "bucket chain prev link broken");
            if let Some(prev) = prev_freq {
                assert!(prev < freq, "bucket chain not ascending");
            }
            assert!(
                freq == 0 || bucket.list.len > 0,
                "empty bucket retained at freq {freq}"
            );

            let mut count = 0usize;
            let mut current = bucket.list.head;
            while let Some(idx) = current {
                let slot = &self.slots[idx];
                let item = slot.item.as_ref().expect("lfu item missing");
                assert_eq!(item.freq, freq, "item frequency disagrees with bucket");
                assert_eq!(
                    self.index.get(&item.key),
                    Some(&idx),
                    "index disagrees with bucket membership"
                );
                count += 1;
                current = slot.next;
            }
            assert_eq!(count, bucket.list.len, "bucket length mismatch");

            seen += count;
            prev_freq = Some(freq);
            cursor = bucket.next;
        }
        assert_eq!(seen, self.index.len(), "bucket chain misses indexed items");
        assert_eq!(
            self.buckets.len(),
            {
                let mut n = 0;
                let mut cursor = Some(0u64);
                while let Some(freq) = cursor {
                    n += 1;
                    cursor = self.buckets[&freq].next;
                }
                n
            },
            "bucket map holds buckets outside the chain"
        );
    }
}

impl<K, V> ReplacementPolicy<K, V> for LfuPolicy<K, V>
where
    K: Clone + Eq + Hash,
{
    fn insert(&mut self, key: K, value: V) -> Vec<(K, V)> {
        if let Some(&idx) = self.index.get(&key) {
            // Re-set: replace the value, frequency stays.
            let item = self.slots[idx].item.as_mut().expect("lfu item missing");
            item.value = value;
            return Vec::new();
        }

        let idx = self.allocate_slot(Item {
            key: key.clone(),
            value,
            freq: 0,
        });
        let slots = &mut self.slots;
        let bucket = self.buckets.get_mut(&0).expect("freq-0 bucket missing");
        Self::list_push_front(slots, &mut bucket.list, idx);
        self.index.insert(key, idx);
        Vec::new()
    }

    fn lookup(&mut self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        let freq = self.slots[idx].item.as_ref().expect("lfu item missing").freq;
        let next_freq = freq + 1;

        // Capture the neighbourhood before the old bucket can disappear.
        let old_next = self.buckets.get(&freq).and_then(|bucket| bucket.next);
        let survived = {
            let slots = &mut self.slots;
            let bucket = self.buckets.get_mut(&freq).expect("lfu bucket missing");
            Self::list_remove(slots, &mut bucket.list, idx);
            bucket.list.len > 0 || freq == 0
        };
        let old_prev = self.buckets.get(&freq).and_then(|bucket| bucket.prev);
        if !survived {
            self.unlink_bucket(freq);
        }

        if !self.buckets.contains_key(&next_freq) {
            let prev = if survived { Some(freq) } else { old_prev };
            self.buckets.insert(
                next_freq,
                Bucket {
                    list: BucketList::default(),
                    prev,
                    next: old_next,
                },
            );
            if let Some(prev_freq) = prev
                && let Some(bucket) = self.buckets.get_mut(&prev_freq)
            {
                bucket.next = Some(next_freq);
            }
            if let Some(next) = old_next
                && let Some(bucket) = self.buckets.get_mut(&next)
            {
                bucket.prev = Some(next_freq);
            }
        }

        let slots = &mut self.slots;
        let bucket = self.buckets.get_mut(&next_freq).expect("lfu bucket missing");
        Self::list_push_front(slots, &mut bucket.list, idx);
        let item = self.slots[idx].item.as_mut().expect("lfu item missing");
        item.freq = next_freq;
        Some(&self.slots[idx].item.as_ref().expect("lfu item missing").value)
    }

    fn peek_mut(&mut self, key: &K) -> Option<&mut V> {
        let idx = *self.index.get(key)?;
        self.slots[idx].item.as_mut().map(|item| &mut item.value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.index.remove(key)?;
        let freq = self.slots[idx].item.as_ref().expect("lfu item missing").freq;
        self.detach_from_bucket(freq, idx);
        Some(self.free_slot(idx).value)
    }

    fn evict(&mut self, count: usize) -> Vec<(K, V)> {
        let mut victims = Vec::with_capacity(count.min(self.index.len()));
        let mut cursor = Some(0u64);

        while victims.len() < count {
            let Some(freq) = cursor else { break };
            let next = self.buckets.get(&freq).and_then(|bucket| bucket.next);

            while victims.len() < count {
                let idx = {
                    let slots = &mut self.slots;
                    let Some(bucket) = self.buckets.get_mut(&freq) else {
                        break;
                    };
                    match Self::list_pop_back(slots, &mut bucket.list) {
                        Some(idx) => idx,
                        None => break,
                    }
                };
                let item = self.free_slot(idx);
                self.index.remove(&item.key);
                victims.push((item.key, item.value));
            }

            let emptied = self
                .buckets
                .get(&freq)
                .is_some_and(|bucket| bucket.list.len == 0);
            if emptied && freq != 0 {
                self.unlink_bucket(freq);
            }
            cursor = next;
        }
        victims
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_attaches_to_zero_bucket() {
        let mut lfu = LfuPolicy::new(8);
        lfu.insert("a", 1);
        lfu.insert("b", 2);

        assert_eq!(lfu.frequency(&"a"), Some(0));
        assert_eq!(lfu.frequency(&"b"), Some(0));
        assert_eq!(lfu.len(), 2);
        lfu.debug_validate_invariants();
    }

    #[test]
    fn lookup_increments_frequency() {
        let mut lfu = LfuPolicy::new(8);
        lfu.insert("a", 1);

        assert_eq!(lfu.lookup(&"a"), Some(&1));
        assert_eq!(lfu.frequency(&"a"), Some(1));
        lfu.lookup(&"a");
        lfu.lookup(&"a");
        assert_eq!(lfu.frequency(&"a"), Some(3));
        lfu.debug_validate_invariants();
    }

    #[test]
    fn frequency_is_monotonic_over_lookups() {
        let mut lfu = LfuPolicy::new(8);
        lfu.insert("a", 1);
        lfu.insert("b", 2);

        let mut last = lfu.frequency(&"a").unwrap();
        for _ in 0..10 {
            lfu.lookup(&"a");
            let freq = lfu.frequency(&"a").unwrap();
            assert!(freq > last, "frequency must not decrease");
            last = freq;
        }
        // "b" was never looked up and stays at 0.
        assert_eq!(lfu.frequency(&"b"), Some(0));
    }

    #[test]
    fn reset_preserves_frequency() {
        let mut lfu = LfuPolicy::new(8);
        lfu.insert("a", 1);
        lfu.lookup(&"a");
        lfu.lookup(&"a");

        lfu.insert("a", 42);
        assert_eq!(lfu.frequency(&"a"), Some(2));
        assert_eq!(lfu.lookup(&"a"), Some(&42));
        lfu.debug_validate_invariants();
    }

    #[test]
    fn evict_takes_lowest_frequency_first() {
        let mut lfu = LfuPolicy::new(8);
        lfu.insert("cold", 1);
        lfu.insert("warm", 2);
        lfu.insert("hot", 3);
        lfu.lookup(&"warm");
        lfu.lookup(&"hot");
        lfu.lookup(&"hot");

        assert_eq!(lfu.evict(1), vec![("cold", 1)]);
        assert_eq!(lfu.evict(1), vec![("warm", 2)]);
        assert_eq!(lfu.evict(1), vec![("hot", 3)]);
        assert!(lfu.is_empty());
        lfu.debug_validate_invariants();
    }

    #[test]
    fn evict_ties_remove_oldest_member() {
        let mut lfu = LfuPolicy::new(8);
        lfu.insert("first", 1);
        lfu.insert("second", 2);
        lfu.insert("third", 3);

        // All at frequency 0: insertion order decides.
        assert_eq!(
            lfu.evict(3),
            vec![("first", 1), ("second", 2), ("third", 3)]
        );
    }

    #[test]
    fn evict_spans_buckets() {
        let mut lfu = LfuPolicy::new(8);
        lfu.insert("a", 1);
        lfu.insert("b", 2);
        lfu.lookup(&"b");

        let victims = lfu.evict(2);
        assert_eq!(victims, vec![("a", 1), ("b", 2)]);
        lfu.debug_validate_invariants();
    }

    #[test]
    fn emptied_bucket_is_dropped() {
        let mut lfu = LfuPolicy::new(8);
        lfu.insert("a", 1);
        lfu.lookup(&"a"); // a now alone in bucket 1
        lfu.lookup(&"a"); // bucket 1 empties and must disappear

        assert_eq!(lfu.frequency(&"a"), Some(2));
        lfu.debug_validate_invariants();
    }

    #[test]
    fn bucket_chain_with_gap() {
        let mut lfu = LfuPolicy::new(8);
        lfu.insert("a", 1);
        for _ in 0..5 {
            lfu.lookup(&"a");
        }
        lfu.insert("b", 2);
        lfu.lookup(&"b");

        // Chain is 0 → 1 → 5; promoting b to 2 inserts between 1 and 5.
        lfu.lookup(&"b");
        assert_eq!(lfu.frequency(&"b"), Some(2));
        assert_eq!(lfu.frequency(&"a"), Some(5));
        lfu.debug_validate_invariants();
    }

    #[test]
    fn remove_unlinks_and_reuses_slot() {
        let mut lfu = LfuPolicy::new(8);
        lfu.insert("a", 1);
        lfu.lookup(&"a");

        assert_eq!(lfu.remove(&"a"), Some(1));
        assert_eq!(lfu.remove(&"a"), None);
        assert!(lfu.is_empty());

        lfu.insert("b", 2);
        assert_eq!(lfu.len(), 1);
        lfu.debug_validate_invariants();
    }

    #[test]
    fn peek_mut_does_not_touch_frequency() {
        let mut lfu = LfuPolicy::new(8);
        lfu.insert("a", 1);

        *lfu.peek_mut(&"a").unwrap() = 9;
        assert_eq!(lfu.frequency(&"a"), Some(0));
        assert_eq!(lfu.lookup(&"a"), Some(&9));
    }

    #[test]
    fn empty_policy_operations() {
        let mut lfu: LfuPolicy<u32, u32> = LfuPolicy::new(4);
        assert!(lfu.is_empty());
        assert_eq!(lfu.lookup(&1), None);
        assert_eq!(lfu.remove(&1), None);
        assert!(lfu.evict(3).is_empty());
        lfu.debug_validate_invariants();
    }
}
