//!
//! Wait/Wake Channel over the Futex Syscall
//!
//! A thin abstraction letting a thread block on the current value of a
//! 32-bit word and be woken by another thread that changed it. The
//! kernel compares the word against the expected value atomically, so
//! there is no window between "I observed contention" and "I went to
//! sleep" in which a wake can be missed.
//!
//! The [`WaitWake`] trait is the seam between the lock algorithms and
//! the kernel; [`Futex`] is the production implementation. Lock tests
//! substitute a non-blocking double to drive the retry loops through
//! spurious wakeups.
//!
//! Syscall failures (EINTR, EAGAIN) are indistinguishable from spurious
//! wakeups from the caller's point of view and are absorbed the same
//! way: every waiter re-validates its condition in a loop, so no error
//! is surfaced here.
//!

use std::ptr;
use std::sync::atomic::AtomicU32;

/// Wake count requesting every waiter on the word. FUTEX_WAKE caps the
/// count at `i32::MAX`, so this is "all" as far as the kernel goes.
pub const WAKE_ALL: u32 = i32::MAX as u32;

/// Kernel-assisted blocking on a 32-bit word.
///
/// Implementations may return from `wait` spuriously with no state
/// change; callers must re-check their condition in a loop and never
/// treat a return as "condition satisfied".
pub trait WaitWake {
    /// Block the calling thread iff `*word == expected` at the moment
    /// the kernel checks it. Returns immediately on mismatch.
    fn wait(&self, word: &AtomicU32, expected: u32);

    /// Wake up to `count` threads blocked on `word`. No-op when nobody
    /// is waiting. No ordering among waiters is guaranteed.
    fn wake(&self, word: &AtomicU32, count: u32);
}

/// The real futex-backed channel. Zero-sized; every lock embeds one.
#[derive(Debug, Default, Clone, Copy)]
pub struct Futex;

fn sys_futex(word: &AtomicU32, op: libc::c_int, val: u32) -> libc::c_long {
    // timeout, uaddr2 and val3 are unused by FUTEX_WAIT/FUTEX_WAKE
    // as issued here.
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            op,
            val,
            ptr::null::<libc::timespec>(),
            ptr::null::<u32>(),
            0u32,
        )
    }
}

impl WaitWake for Futex {
    fn wait(&self, word: &AtomicU32, expected: u32) {
        // EAGAIN means the word no longer held `expected`, EINTR means a
        // signal landed. Both are handled by the caller's retry loop.
        sys_futex(word, libc::FUTEX_WAIT, expected);
    }

    fn wake(&self, word: &AtomicU32, count: u32) {
        sys_futex(word, libc::FUTEX_WAKE, count.min(WAKE_ALL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_returns_on_mismatch() {
        // The word is 0 but we claim to expect 7: the kernel check fails
        // and the call must come straight back instead of blocking.
        let word = AtomicU32::new(0);
        Futex.wait(&word, 7);
    }

    #[test]
    fn test_wake_without_waiters_is_noop() {
        let word = AtomicU32::new(0);
        Futex.wake(&word, 1);
        Futex.wake(&word, WAKE_ALL);
        assert_eq!(word.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_wake_unblocks_waiter() {
        let word = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let word = Arc::clone(&word);
                thread::spawn(move || {
                    while word.load(Ordering::SeqCst) == 0 {
                        Futex.wait(&word, 0);
                    }
                })
            })
            .collect();

        // Let the waiters reach the kernel before signalling.
        thread::sleep(Duration::from_millis(50));
        word.store(1, Ordering::SeqCst);
        Futex.wake(&word, WAKE_ALL);

        for h in handles {
            h.join().unwrap();
        }
    }
}
