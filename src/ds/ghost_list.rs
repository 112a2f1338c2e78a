//! Keys-only LRU history list.
//!
//! A ghost list remembers keys that were recently evicted without retaining
//! their values. The ARC policy keeps two of them (B1 and B2) to detect
//! "would have hit" accesses and steer its adaptation target.
//!
//! ## Operations
//!
//! | Operation    | Time  | Notes                                   |
//! |--------------|-------|-----------------------------------------|
//! | `record`     | O(1)  | push at MRU, drops LRU tail at capacity |
//! | `contains`   | O(1)  | index probe, order untouched            |
//! | `remove`     | O(1)  | unlink by key                           |
//! | `trim_to`    | O(k)  | drop LRU tail down to a bound           |
//!
//! Recording a key that is already present moves it to the MRU position
//! rather than duplicating it.

use std::hash::Hash;
use std::ptr::NonNull;

use rustc_hash::FxHashMap;

/// Node in the ghost linked list.
#[repr(C)]
struct Node<K> {
    prev: Option<NonNull<Node<K>>>,
    next: Option<NonNull<Node<K>>>,
    key: K,
}

/// Bounded LRU list of bare keys.
///
/// # Example
///
/// ```
/// use tickcache::ds::GhostList;
///
/// let mut ghosts: GhostList<&str> = GhostList::new(2);
/// ghosts.record("a");
/// ghosts.record("b");
/// ghosts.record("c"); // capacity 2: "a" falls off the tail
///
/// assert!(!ghosts.contains(&"a"));
/// assert!(ghosts.contains(&"b"));
/// assert!(ghosts.contains(&"c"));
/// ```
pub struct GhostList<K>
where
    K: Clone + Eq + Hash,
{
    map: FxHashMap<K, NonNull<Node<K>>>,
    head: Option<NonNull<Node<K>>>,
    tail: Option<NonNull<Node<K>>>,
    capacity: usize,
}

// SAFETY: the raw pointers only reference heap nodes owned by this struct,
// so the list moves between threads whenever K does.
unsafe impl<K> Send for GhostList<K> where K: Clone + Eq + Hash + Send {}
unsafe impl<K> Sync for GhostList<K> where K: Clone + Eq + Hash + Sync {}

impl<K> GhostList<K>
where
    K: Clone + Eq + Hash,
{
    /// Creates an empty ghost list that retains at most `capacity` keys.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            map: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            head: None,
            tail: None,
            capacity,
        }
    }

    /// Number of remembered keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if no keys are remembered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Maximum number of keys retained.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if `key` is remembered. Does not touch the order.
    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Remembers `key` at the MRU position.
    ///
    /// A key that is already present is moved to MRU instead of duplicated.
    /// At capacity the LRU tail is dropped first.
    pub fn record(&mut self, key: K) {
        if self.capacity == 0 {
            return;
        }

        if let Some(&node_ptr) = self.map.get(&key) {
            self.detach(node_ptr);
            self.attach_front(node_ptr);
            return;
        }

        if self.map.len() >= self.capacity {
            self.pop_oldest();
        }

        let node = Box::new(Node {
            prev: None,
            next: None,
            key: key.clone(),
        });
        let node_ptr = NonNull::from(Box::leak(node));
        self.map.insert(key, node_ptr);
        self.attach_front(node_ptr);
    }

    /// Forgets `key`. Returns `true` if it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(node_ptr) = self.map.remove(key) else {
            return false;
        };
        self.detach(node_ptr);
        // SAFETY: the pointer came from Box::leak and is no longer linked
        // or indexed, so reclaiming it is the unique deallocation.
        unsafe { drop(Box::from_raw(node_ptr.as_ptr())) };
        true
    }

    /// Drops LRU-tail keys until at most `bound` remain.
    pub fn trim_to(&mut self, bound: usize) {
        while self.map.len() > bound {
            self.pop_oldest();
        }
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        while self.pop_oldest().is_some() {}
    }

    fn pop_oldest(&mut self) -> Option<K> {
        let tail_ptr = self.tail?;
        self.detach(tail_ptr);
        // SAFETY: detached and about to be unindexed; unique owner.
        let node = unsafe { Box::from_raw(tail_ptr.as_ptr()) };
        self.map.remove(&node.key);
        Some(node.key)
    }

    #[inline(always)]
    fn detach(&mut self, node_ptr: NonNull<Node<K>>) {
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

    #[inline(always)]
    fn attach_front(&mut self, mut node_ptr: NonNull<Node<K>>) {
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

    /// Validates list/index consistency. Test and debug builds only.
    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let mut count = 0usize;
        let mut current = self.head;
        while let Some(node_ptr) = current {
            count += 1;
            assert!(count <= self.map.len(), "cycle detected in ghost list");
            unsafe {
                let node = node_ptr.as_ref();
                assert!(
                    self.map.contains_key(&node.key),
                    "ghost node key missing from index"
                );
                current = node.next;
            }
        }
        assert_eq!(count, self.map.len(), "ghost list length mismatch");
        assert!(
            self.map.len() <= self.capacity || self.capacity == 0,
            "ghost list over capacity"
        );
    }
}

impl<K> Drop for GhostList<K>
where
    K: Clone + Eq + Hash,
{
    fn drop(&mut self) {
        while self.pop_oldest().is_some() {}
    }
}

impl<K> std::fmt::Debug for GhostList<K>
where
    K: Clone + Eq + Hash,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GhostList")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
