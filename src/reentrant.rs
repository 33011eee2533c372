use {
    crate::{
        owner::owner_token,
        raw::{RawLock, SharedAccess},
    },
    parking_lot::{
        RawMutex,
        lock_api::{RawMutex as RawMutexTrait, RawMutexTimed},
    },
    std::{
        cell::Cell,
        sync::atomic::{AtomicUsize, Ordering::Relaxed},
        time::{Duration, Instant},
    },
};


/// Reentrant exclusive lock kind.
///
/// The thread holding the lock may acquire it again without deadlocking; `n`
/// acquisitions need `n` releases. This is the default kind of both wrappers
/// and the kind under which multiple proxies may be alive on one thread.
///
/// Shared mode is an alias of exclusive mode.
pub struct Reentrant {
    // We enforce the following invariants:
    // 1. if depth > 0, then raw is locked
    // 2. if owner != 0, then raw is locked and the thread with that owner
    //    token locked it
    // depth is only accessed by the thread that holds raw.
    raw: RawMutex,
    owner: AtomicUsize,
    depth: Cell<u64>,
}

// SAFETY: The Cell is the only non-Send/Sync field. It is only accessed by
//         the thread holding the raw mutex, which the owner check enforces,
//         so handing the struct between threads or sharing it is sound.
unsafe impl Send for Reentrant {}

// SAFETY: Dito.
unsafe impl Sync for Reentrant {}

impl Reentrant {
    /// Returns whether the current thread is holding the lock.
    #[inline]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.owner.load(Relaxed) == owner_token()
    }

    /// # Safety
    ///
    /// - The current thread must be holding the raw mutex.
    #[inline]
    unsafe fn add_depth(&self) {
        // SAFETY: - By the requirements of this function, the current thread
        //           is holding the raw mutex.
        //         - Therefore no other thread is allowed to access depth.
        let depth = self.depth.get();
        if depth == u64::MAX {
            #[cold]
            fn never() -> ! {
                #[allow(clippy::empty_loop)]
                loop {}
            }
            never();
        }
        self.depth.set(depth + 1);
    }

    /// # Safety
    ///
    /// - The current thread must just have succeeded in locking the raw
    ///   mutex.
    #[inline]
    unsafe fn take_ownership(&self) {
        // Storing our token upholds invariant 2.
        self.owner.store(owner_token(), Relaxed);
        // SAFETY: We are holding the raw mutex.
        unsafe {
            self.add_depth();
        }
    }

    #[cold]
    #[inline(always)]
    fn lock_slow(&self) {
        self.raw.lock();
        // SAFETY: We have just locked the raw mutex.
        unsafe {
            self.take_ownership();
        }
    }
}

macro_rules! maybe_reenter {
    ($slf:expr, $ret:expr) => {
        if $slf.owner.load(Relaxed) == owner_token() {
            // SAFETY: - We have just checked that owner contains the token of
            //           the current thread.
            //         - By the invariants, this means that the current thread
            //           is holding the raw mutex.
            unsafe {
                $slf.add_depth();
            }
            return $ret;
        }
    };
}

// SAFETY: The raw mutex provides mutual exclusion between threads; the owner
//         fast path only re-enters on the thread that already holds it, and
//         the depth counter guarantees that the raw mutex is released exactly
//         when the last acquisition is released.
unsafe impl RawLock for Reentrant {
    const INIT: Self = Reentrant {
        raw: RawMutex::INIT,
        owner: AtomicUsize::new(0),
        depth: Cell::new(0),
    };

    #[inline]
    fn lock_exclusive(&self) {
        maybe_reenter!(self, ());
        self.lock_slow();
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        maybe_reenter!(self, true);
        self.raw.try_lock() && {
            // SAFETY: We have just locked the raw mutex.
            unsafe {
                self.take_ownership();
            }
            true
        }
    }

    #[inline]
    fn try_lock_exclusive_for(&self, timeout: Duration) -> bool {
        maybe_reenter!(self, true);
        self.raw.try_lock_for(timeout) && {
            // SAFETY: We have just locked the raw mutex.
            unsafe {
                self.take_ownership();
            }
            true
        }
    }

    #[inline]
    fn try_lock_exclusive_until(&self, deadline: Instant) -> bool {
        maybe_reenter!(self, true);
        self.raw.try_lock_until(deadline) && {
            // SAFETY: We have just locked the raw mutex.
            unsafe {
                self.take_ownership();
            }
            true
        }
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        // SAFETY: - By the safety requirements of this function, the current
        //           thread holds an acquisition, so by the invariants it is
        //           holding the raw mutex and may access depth.
        let depth = self.depth.get();
        debug_assert!(depth > 0);
        self.depth.set(depth - 1);
        if depth == 1 {
            // Clearing the owner before unlocking upholds invariant 2.
            self.owner.store(0, Relaxed);
            // SAFETY: - depth is now 0 and we are holding the raw mutex.
            unsafe {
                self.raw.unlock();
            }
        }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}

// SAFETY: Shared mode aliases exclusive mode, so at most one thread at a
//         time observes &T. Multiple references on the holding thread may
//         coexist, which is fine for shared references. Moving access
//         between threads needs T: Send.
unsafe impl<T: ?Sized + Send> SharedAccess<T> for Reentrant {}
