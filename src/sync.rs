//! Synchronization primitives for the cache façade.
//!
//! Critical sections in this crate are short and predictable (a handful of
//! pointer updates plus a hash-map probe), so the façade serializes on a
//! test-and-set spin lock instead of a parking mutex. The sweeper uses a
//! [`CancellationToken`], a shared flag the owner trips to stop background
//! expiration.
//!
//! ## Key Components
//!
//! - [`SpinLock`]: mutual exclusion over `T` with a RAII guard.
//! - [`SpinGuard`]: the guard; releases the lock on drop.
//! - [`CancellationToken`]: cloneable cancellation flag for the sweeper.

use std::cell::UnsafeCell;
use std::hint;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A test-and-set spin lock.
///
/// Acquisition spins with [`std::hint::spin_loop`] until the flag clears.
/// Suitable only for very short critical sections; holders must not sleep or
/// perform I/O while locked.
///
/// # Example
///
/// ```
/// use tickcache::sync::SpinLock;
///
/// let lock = SpinLock::new(0u64);
/// *lock.lock() += 1;
/// assert_eq!(*lock.lock(), 1);
/// ```
pub struct SpinLock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: SpinLock provides mutual exclusion, so it can be shared between
// threads whenever the protected value can be sent between them.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates an unlocked lock protecting `value`.
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, spinning until it is available.
    #[inline]
    pub fn lock(&self) -> SpinGuard<'_, T> {
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinGuard { lock: self };
            }
            // Read-only wait loop keeps the cache line shared between
            // spinners instead of bouncing it on every CAS attempt.
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
    }

    /// Consumes the lock, returning the protected value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't block a debug print on a held lock.
        match self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
        {
            Ok(_) => {
                // SAFETY: we hold the lock.
                let result = f
                    .debug_struct("SpinLock")
                    .field("value", unsafe { &*self.value.get() })
                    .finish();
                self.locked.store(false, Ordering::Release);
                result
            },
            Err(_) => f.debug_struct("SpinLock").field("value", &"<locked>").finish(),
        }
    }
}

/// RAII guard for [`SpinLock`]; releases on drop.
pub struct SpinGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the guard proves exclusive ownership of the lock.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves exclusive ownership of the lock.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// A cloneable cancellation flag.
///
/// Every clone observes the same flag; [`cancel`](Self::cancel) is sticky.
/// The cache's background sweeper polls its token once per tick and exits
/// when the token is cancelled.
///
/// # Example
///
/// ```
/// use tickcache::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let watcher = token.clone();
/// assert!(!watcher.is_cancelled());
/// token.cancel();
/// assert!(watcher.is_cancelled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token in the not-cancelled state.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the token. Idempotent.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any
    /// clone of this token.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn lock_round_trip() {
        let lock = SpinLock::new(41);
        {
            let mut guard = lock.lock();
            *guard += 1;
        }
        assert_eq!(*lock.lock(), 42);
        assert_eq!(lock.into_inner(), 42);
    }

    #[test]
    fn lock_serializes_concurrent_increments() {
        let lock = Arc::new(SpinLock::new(0u64));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..1_000 {
                    *lock.lock() += 1;
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*lock.lock(), 8_000);
    }

    #[test]
    fn guard_releases_on_drop() {
        let lock = SpinLock::new(());
        drop(lock.lock());
        // A second acquisition must not deadlock.
        drop(lock.lock());
    }

    #[test]
    fn token_is_sticky_and_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());

        clone.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());

        // Cancelling again is a no-op.
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn token_observed_across_threads() {
        let token = CancellationToken::new();
        let observer = token.clone();

        let handle = thread::spawn(move || {
            while !observer.is_cancelled() {
                thread::yield_now();
            }
        });

        token.cancel();
        handle.join().unwrap();
    }
}
