//!
//! Mutex Built on the Wait/Wake Channel
//!
//! Provides a mutual exclusion primitive whose entire state is one
//! 32-bit word: 0 (unlocked) or 1 (locked). Acquisition is a
//! compare-and-swap loop; a failed swap parks the thread in the kernel
//! on the current value of the word, and release wakes one waiter.
//!
//! There is no stored "contended" state - contention is inferred from a
//! failed CAS each time around the loop. There is likewise no owner
//! tracking: unlocking a mutex the caller does not hold is undefined.
//!
//! All atomic operations use SeqCst ordering for safety and simplicity.
//!
//! Two layers:
//! - [`RawMutex`] - the bare state-word protocol (`lock` / `unlock`)
//! - [`Mutex<T>`] - owns a value, hands out a [`MutexGuard`] that
//!   releases on drop
//!

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::futex::{Futex, WaitWake};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;

/// The bare futex mutex: one atomic word, no payload.
#[derive(Debug)]
pub struct RawMutex<W: WaitWake = Futex> {
    state: AtomicU32,
    waiter: W,
}

impl RawMutex {
    /// Creates an unlocked mutex backed by the real futex channel.
    pub const fn new() -> Self {
        Self::with_waiter(Futex)
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: WaitWake> RawMutex<W> {
    /// Creates an unlocked mutex parking through `waiter`.
    pub const fn with_waiter(waiter: W) -> Self {
        Self {
            state: AtomicU32::new(UNLOCKED),
            waiter,
        }
    }

    /// Blocks until the calling thread has exclusive ownership.
    ///
    /// One CAS attempt per loop iteration; on failure the thread parks
    /// on whatever value the word holds right now. A spurious wakeup
    /// (or a wake lost to a faster contender) just comes back around
    /// the loop.
    pub fn lock(&self) {
        loop {
            if self
                .state
                .compare_exchange(UNLOCKED, LOCKED, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return;
            }

            let current = self.state.load(Ordering::SeqCst);
            self.waiter.wait(&self.state, current);
        }
    }

    /// Releases the mutex and wakes at most one waiter.
    ///
    /// Waking more would be wasted work: only one CAS can win, and the
    /// rest would re-park immediately. Calling this without holding the
    /// lock is undefined - there is no owner tracking to catch it.
    pub fn unlock(&self) {
        self.state.store(UNLOCKED, Ordering::SeqCst);
        self.waiter.wake(&self.state, 1);
    }

    /// Whether the lock is currently held by some thread. Advisory
    /// only; the answer can be stale by the time it is returned.
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::SeqCst) == LOCKED
    }
}

/// A mutex owning a value of type `T`.
///
/// Usage:
/// ```
/// use synk::Mutex;
///
/// let m = Mutex::new(0);
/// *m.lock() += 1;
/// assert_eq!(*m.lock(), 1);
/// ```
#[derive(Debug)]
pub struct Mutex<T> {
    raw: RawMutex,
    value: UnsafeCell<T>,
}

// The value only moves between threads while the lock is held, so Send
// on T is the whole requirement.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Creates an unlocked mutex holding `value`.
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawMutex::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Blocks until the lock is held, then returns a guard.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.raw.lock();
        MutexGuard { lock: self }
    }

    /// Consumes the mutex, returning the value. No locking needed:
    /// ownership proves no other thread can hold the lock.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    /// Mutable access through an exclusive reference, again without
    /// touching the state word.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

impl<T: Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Exclusive access to the value inside a [`Mutex`]. Releases the lock
/// on drop.
#[derive(Debug)]
pub struct MutexGuard<'a, T> {
    lock: &'a Mutex<T>,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Holding the guard is holding the lock.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_raw_round_trip() {
        let m = RawMutex::new();
        assert!(!m.is_locked());

        m.lock();
        assert!(m.is_locked());

        m.unlock();
        assert!(!m.is_locked());
    }

    #[test]
    fn test_new_then_drop() {
        let m = RawMutex::new();
        drop(m);

        let m = Mutex::new(5);
        drop(m);
    }

    #[test]
    fn test_guard_gives_access() {
        let m = Mutex::new(42);

        {
            let mut guard = m.lock();
            assert_eq!(*guard, 42);
            *guard = 100;
        }

        assert_eq!(*m.lock(), 100);
        assert_eq!(m.into_inner(), 100);
    }

    #[test]
    fn test_mutex_concurrent() {
        let m = Arc::new(Mutex::new(0i64));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let m = Arc::clone(&m);
                thread::spawn(move || {
                    for _ in 0..100 {
                        *m.lock() += 1;
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(*m.lock(), 1000);
    }

    /// A channel double that never blocks: every `wait` is a spurious
    /// wakeup. Lets tests drive the retry loop without the kernel.
    struct SpinWait {
        waits: AtomicUsize,
    }

    impl WaitWake for SpinWait {
        fn wait(&self, _word: &AtomicU32, _expected: u32) {
            self.waits.fetch_add(1, Ordering::SeqCst);
            thread::yield_now();
        }

        fn wake(&self, _word: &AtomicU32, _count: u32) {}
    }

    #[test]
    fn test_spurious_wakeups_never_acquire() {
        let m = Arc::new(RawMutex::with_waiter(SpinWait {
            waits: AtomicUsize::new(0),
        }));
        let acquired = Arc::new(AtomicBool::new(false));

        m.lock();

        let contender = {
            let m = Arc::clone(&m);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                m.lock();
                acquired.store(true, Ordering::SeqCst);
                m.unlock();
            })
        };

        // The contender spins through spurious wakeups the whole time
        // the lock is held and must never slip past the CAS.
        thread::sleep(Duration::from_millis(100));
        assert!(m.waiter.waits.load(Ordering::SeqCst) > 0);
        assert!(!acquired.load(Ordering::SeqCst));

        m.unlock();
        contender.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }
}
