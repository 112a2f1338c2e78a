//! # Least Recently Used (LRU) replacement policy
//!
//! A doubly linked recency list plus a key index. The list is ordered
//! most-recent-first; victims are unlinked from the tail.
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │  FxHashMap<K, NonNull<Node>>   (index)                       │
//!   │     "a" ──┐       "b" ──┐      "c" ──┐                       │
//!   └───────────┼─────────────┼────────────┼──────────────────────-┘
//!               ▼             ▼            ▼
//!   head ──► [ a ] ◄──► [ b ] ◄──► [ c ] ◄── tail
//!            (MRU)                 (LRU → evicted first)
//! ```
//!
//! ## Operations
//!
//! | Operation  | Time | Effect on order                          |
//! |------------|------|------------------------------------------|
//! | `insert`   | O(1) | new key at head; re-set stays in place   |
//! | `lookup`   | O(1) | moves the node to the head               |
//! | `remove`   | O(1) | unlinks the node                         |
//! | `evict(n)` | O(n) | unlinks `n` tail nodes                   |
//!
//! Note the asymmetry: only `lookup` refreshes recency. Re-setting a key's
//! value leaves its position untouched, so writers cannot keep a cold entry
//! alive (see [`crate::traits`]).
//!
//! ## Safety
//!
//! Nodes are heap-allocated and tracked through `NonNull` pointers owned
//! exclusively by this struct; the index is the only other reference to
//! them, and every unlink path deallocates exactly once.

use std::hash::Hash;
use std::ptr::NonNull;

use rustc_hash::FxHashMap;

use crate::traits::ReplacementPolicy;

/// Node in the recency list.
///
/// Pointers first for cache locality on list traversal.
#[repr(C)]
struct Node<K, V> {
    prev: Option<NonNull<Node<K, V>>>,
    next: Option<NonNull<Node<K, V>>>,
    key: K,
    value: V,
}

/// LRU replacement engine.
///
/// # Example
///
/// ```
/// use tickcache::policy::lru::LruPolicy;
/// use tickcache::traits::ReplacementPolicy;
///
/// let mut lru: LruPolicy<&str, i32> = LruPolicy::new(16);
/// lru.insert("a", 1);
/// lru.insert("b", 2);
///
/// // Accessing "a" makes "b" the eviction victim.
/// lru.lookup(&"a");
/// let victims = lru.evict(1);
/// assert_eq!(victims, vec![("b", 2)]);
/// ```
pub struct LruPolicy<K, V>
where
    K: Clone + Eq + Hash,
{
    map: FxHashMap<K, NonNull<Node<K, V>>>,
    head: Option<NonNull<Node<K, V>>>,
    tail: Option<NonNull<Node<K, V>>>,
}

// SAFETY: the raw pointers only reference heap nodes owned by this struct.
unsafe impl<K, V> Send for LruPolicy<K, V>
where
    K: Clone + Eq + Hash + Send,
    V: Send,
{
}

// SAFETY: shared access never mutates through the pointers; exclusive
// access is required for every mutation.
unsafe impl<K, V> Sync for LruPolicy<K, V>
where
    K: Clone + Eq + Hash + Sync,
    V: Sync,
{
}

impl<K, V> LruPolicy<K, V>
where
    K: Clone + Eq + Hash,
{
    /// Creates an empty policy, pre-sizing the index for `capacity` keys.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            map: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            head: None,
            tail: None,
        }
    }

    /// Detach a node from the list without removing it from the index.
    #[inline(always)]
    fn detach(&mut self, node_ptr: NonNull<Node<K, V>>) {
        unsafe {
            let node = node_ptr.as_ref();
            let prev = node.prev;
            let next = node.next;

            match prev {
                Some(mut p) => p.as_mut().next = next,
                None => self.head = next,
            }

            match next {
                Some(mut n) => n.as_mut().prev = prev,
                None => self.tail = prev,
            }
        }
    }

    /// Attach a node at the head (MRU position).
    #[inline(always)]
    fn attach_front(&mut self, mut node_ptr: NonNull<Node<K, V>>) {
        unsafe {
            let node = node_ptr.as_mut();
            node.prev = None;
            node.next = self.head;

            match self.head {
                Some(mut h) => h.as_mut().prev = Some(node_ptr),
                None => self.tail = Some(node_ptr),
            }

            self.head = Some(node_ptr);
        }
    }

    /// Pop the tail node (LRU victim).
    #[inline(always)]
    fn pop_tail(&mut self) -> Option<Box<Node<K, V>>> {
        let tail_ptr = self.tail?;
        self.detach(tail_ptr);
        // SAFETY: detached; the index entry is removed by the caller, so
        // this box is the unique owner from here on.
        Some(unsafe { Box::from_raw(tail_ptr.as_ptr()) })
    }

    /// Keys in recency order, MRU first. Test and debug builds only.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_snapshot_keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.map.len());
        let mut current = self.head;
        while let Some(node_ptr) = current {
            unsafe {
                let node = node_ptr.as_ref();
                keys.push(node.key.clone());
                current = node.next;
            }
        }
        keys
    }

    /// Validates list/index consistency. Test and debug builds only.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let mut count = 0usize;
        let mut current = self.head;
        while let Some(node_ptr) = current {
            count += 1;
            assert!(count <= self.map.len(), "cycle detected in LRU list");
            unsafe {
                let node = node_ptr.as_ref();
                assert!(
                    self.map.contains_key(&node.key),
                    "LRU node key missing from index"
                );
                current = node.next;
            }
        }
        assert_eq!(count, self.map.len(), "LRU list length mismatch");
    }
}

impl<K, V> ReplacementPolicy<K, V> for LruPolicy<K, V>
where
    K: Clone + Eq + Hash,
{
    fn insert(&mut self, key: K, value: V) -> Vec<(K, V)> {
        if let Some(&node_ptr) = self.map.get(&key) {
            // Re-set: replace the value in place, keep the position.
            unsafe {
                (*node_ptr.as_ptr()).value = value;
            }
            return Vec::new();
        }

        let node = Box::new(Node {
            prev: None,
            next: None,
            key: key.clone(),
            value,
        });
        let node_ptr = NonNull::from(Box::leak(node));
        self.map.insert(key, node_ptr);
        self.attach_front(node_ptr);
        Vec::new()
    }

    fn lookup(&mut self, key: &K) -> Option<&V> {
        let node_ptr = *self.map.get(key)?;
        self.detach(node_ptr);
        self.attach_front(node_ptr);
        // SAFETY: the node stays alive for as long as the index holds it,
        // which outlives the returned borrow of self.
        Some(unsafe { &(*node_ptr.as_ptr()).value })
    }

    fn peek_mut(&mut self, key: &K) -> Option<&mut V> {
        let node_ptr = *self.map.get(key)?;
        // SAFETY: as in lookup; no list surgery here.
        Some(unsafe { &mut (*node_ptr.as_ptr()).value })
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let node_ptr = self.map.remove(key)?;
        self.detach(node_ptr);
        // SAFETY: detached and unindexed; unique owner.
        let node = unsafe { Box::from_raw(node_ptr.as_ptr()) };
        Some(node.value)
    }

    fn evict(&mut self, count: usize) -> Vec<(K, V)> {
        let mut victims = Vec::with_capacity(count.min(self.map.len()));
        for _ in 0..count {
            let Some(node) = self.pop_tail() else { break };
            self.map.remove(&node.key);
            victims.push((node.key, node.value));
        }
        victims
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

impl<K, V> Drop for LruPolicy<K, V>
where
    K: Clone + Eq + Hash,
{
    fn drop(&mut self) {
        while self.pop_tail().is_some() {}
    }
}

impl<K, V> std::fmt::Debug for LruPolicy<K, V>
where
    K: Clone + Eq + Hash + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruPolicy")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
