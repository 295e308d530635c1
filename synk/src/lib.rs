//!
//! synk - Futex-Based Synchronization Primitives
//!
//! Provides a mutex and a reader/writer lock built directly on the Linux
//! futex syscall, with no locking library underneath. Each lock is a
//! single 32-bit atomic state word; acquisition is a compare-and-swap
//! loop that parks the thread in the kernel when contended.
//!
//! ## Lock Types
//!
//! - [`RawMutex`] / [`Mutex<T>`] - exclusive lock; state word is 0
//!   (unlocked) or 1 (locked)
//! - [`RawRwLock`] / [`RwLock<T>`] - shared/exclusive lock; bit 0 of the
//!   state word is the writer flag, bits 1-31 hold the reader count
//!   (each reader adds 2, so the count never collides with the flag)
//!
//! The `Raw*` types expose bare acquire/release operations on the state
//! word. The typed wrappers own a value and hand out guards that release
//! on drop.
//!
//! ## Wait/Wake Channel
//!
//! Both locks park through the [`WaitWake`] trait, implemented for
//! production by [`Futex`] (FUTEX_WAIT / FUTEX_WAKE). The kernel checks
//! the word against the expected value atomically, closing the race
//! between observing contention and going to sleep. Waiters can wake
//! spuriously, so every acquire path re-validates in a loop.
//!
//! ## Guarantees and Non-Guarantees
//!
//! Mutual exclusion holds for any interleaving; nothing else does. There
//! is no FIFO ordering among waiters, no reentrancy, no try/timed
//! variants, and the reader/writer lock has no anti-starvation bias
//! (sustained read pressure can delay a writer indefinitely).
//!
//! ## Platform Support
//!
//! Linux only. The futex syscall has no portable equivalent here.
//!

pub mod futex;
pub mod mutex;
pub mod rwlock;

pub use futex::{Futex, WaitWake, WAKE_ALL};
pub use mutex::{Mutex, MutexGuard, RawMutex};
pub use rwlock::{RawRwLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
