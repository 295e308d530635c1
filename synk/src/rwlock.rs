//!
//! Reader/Writer Lock Built on the Wait/Wake Channel
//!
//! Provides a shared/exclusive lock whose entire state is one 32-bit
//! word, bit-packed as:
//!
//! - bit 0: writer flag (1 = a writer holds the lock)
//! - bits 1-31: reader count, stored as +2 per reader so it never
//!   collides with the writer flag
//!
//! The writer flag and a nonzero reader count are mutually exclusive.
//! Any number of readers may hold the lock at once; a writer needs the
//! word to be exactly 0, so it waits for every current reader to drain.
//!
//! Known fairness gap: nothing biases new readers away from a waiting
//! writer, so sustained read pressure can delay a writer indefinitely.
//! This is a documented trade-off, kept for simplicity.
//!
//! Release is a single symmetric entry point for both holder kinds:
//! which transition to apply is inferred from the state word itself,
//! not from per-caller bookkeeping. After either transition every
//! waiter is woken - a dropped reader may unblock the writer, a
//! finished writer may unblock any mix of readers and writers, and
//! only each waiter's own retry filters out the ones that still
//! cannot proceed.
//!
//! All atomic operations use SeqCst ordering for safety and simplicity.
//!

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::futex::{Futex, WaitWake, WAKE_ALL};

const WRITER_BIT: u32 = 0x1;
const READER_UNIT: u32 = 0x2;

/// The bare futex reader/writer lock: one bit-packed atomic word.
#[derive(Debug)]
pub struct RawRwLock<W: WaitWake = Futex> {
    state: AtomicU32,
    waiter: W,
}

impl RawRwLock {
    /// Creates a free lock (no readers, no writer) backed by the real
    /// futex channel.
    pub const fn new() -> Self {
        Self::with_waiter(Futex)
    }
}

impl Default for RawRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: WaitWake> RawRwLock<W> {
    /// Creates a free lock parking through `waiter`.
    pub const fn with_waiter(waiter: W) -> Self {
        Self {
            state: AtomicU32::new(0),
            waiter,
        }
    }

    /// Blocks until the calling thread holds a shared (read) slot.
    ///
    /// Readers never contend with each other for long: the only way a
    /// reader parks is a writer holding the lock or a CAS lost to a
    /// concurrent mutator, in which case the wake-all on the next
    /// release brings it back around the loop.
    pub fn read_lock(&self) {
        loop {
            let old = self.state.load(Ordering::SeqCst);

            if old & WRITER_BIT == 0
                && self
                    .state
                    .compare_exchange_weak(
                        old,
                        old + READER_UNIT,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
            {
                return;
            }

            let current = self.state.load(Ordering::SeqCst);
            self.waiter.wait(&self.state, current);
        }
    }

    /// Blocks until the calling thread holds the lock exclusively.
    ///
    /// Only proceeds from a word of exactly 0: a writer never preempts
    /// active readers, it waits for natural drain.
    pub fn write_lock(&self) {
        loop {
            let old = self.state.load(Ordering::SeqCst);

            if old == 0
                && self
                    .state
                    .compare_exchange_weak(0, WRITER_BIT, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                return;
            }

            let current = self.state.load(Ordering::SeqCst);
            self.waiter.wait(&self.state, current);
        }
    }

    /// Releases the lock, whichever kind of holder the caller is.
    ///
    /// A writer release clears the word (only one writer can hold it);
    /// a reader release subtracts one reader unit, clamping at 0 so a
    /// mismatched unlock can never wrap the count into the writer bit.
    /// Calling this without holding the lock is otherwise undefined.
    pub fn unlock(&self) {
        let old = self.state.load(Ordering::SeqCst);

        let new = if old & WRITER_BIT != 0 {
            0
        } else {
            old.saturating_sub(READER_UNIT)
        };

        self.state.store(new, Ordering::SeqCst);
        self.waiter.wake(&self.state, WAKE_ALL);
    }

    /// Whether a writer currently holds the lock. Advisory only.
    pub fn writer_active(&self) -> bool {
        self.state.load(Ordering::SeqCst) & WRITER_BIT != 0
    }

    /// Number of readers currently holding the lock. Advisory only.
    pub fn reader_count(&self) -> u32 {
        self.state.load(Ordering::SeqCst) >> 1
    }
}

/// A reader/writer lock owning a value of type `T`.
///
/// Usage:
/// ```
/// use synk::RwLock;
///
/// let rw = RwLock::new(0);
/// assert_eq!(*rw.read(), 0);
/// *rw.write() += 1;
/// assert_eq!(*rw.read(), 1);
/// ```
#[derive(Debug)]
pub struct RwLock<T> {
    raw: RawRwLock,
    value: UnsafeCell<T>,
}

// Readers hand out &T across threads, so T must be Sync as well.
unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    /// Creates a free lock holding `value`.
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawRwLock::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Blocks until a shared slot is held, then returns a read guard.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.raw.read_lock();
        RwLockReadGuard { lock: self }
    }

    /// Blocks until exclusive ownership is held, then returns a write
    /// guard.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.raw.write_lock();
        RwLockWriteGuard { lock: self }
    }

    /// Consumes the lock, returning the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }

    /// Mutable access through an exclusive reference, without touching
    /// the state word.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Shared access to the value inside an [`RwLock`]. Releases the read
/// slot on drop, through the same symmetric unlock as writers.
#[derive(Debug)]
pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock();
    }
}

/// Exclusive access to the value inside an [`RwLock`]. Releases on
/// drop.
#[derive(Debug)]
pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock();
    }
}
