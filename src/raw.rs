#[cfg(doc)]
use crate::{LockedAround, SafePtr};
use {
    parking_lot::{
        RawMutex, RawRwLock,
        lock_api::{
            RawMutex as RawMutexTrait, RawMutexTimed, RawRwLock as RawRwLockTrait, RawRwLockTimed,
        },
    },
    std::time::{Duration, Instant},
};

#[cfg(test)]
mod tests;

/// The mutual-exclusion capability used by [`LockedAround`] and [`SafePtr`].
///
/// A kind exposes an exclusive mode and a shared mode. Kinds without a real
/// shared mode keep the default method bodies, which alias the shared mode to
/// the exclusive one.
///
/// # Safety
///
/// Implementations must guarantee:
///
/// - While an exclusive acquisition is held, no other thread holds any
///   acquisition of the same lock.
/// - While a shared acquisition is held, no thread holds an exclusive
///   acquisition of the same lock.
/// - Every method that returns `true` (or returns at all, for the blocking
///   variants) has acquired the lock in the named mode, and the matching
///   `unlock_*` releases exactly that acquisition.
pub unsafe trait RawLock {
    /// Initial, unlocked state.
    const INIT: Self;

    /// Acquires the lock exclusively, blocking until it is available.
    fn lock_exclusive(&self);

    /// Attempts to acquire the lock exclusively without blocking.
    fn try_lock_exclusive(&self) -> bool;

    /// Attempts to acquire the lock exclusively until a timeout has expired.
    fn try_lock_exclusive_for(&self, timeout: Duration) -> bool;

    /// Attempts to acquire the lock exclusively until a deadline is reached.
    fn try_lock_exclusive_until(&self, deadline: Instant) -> bool;

    /// Releases an exclusive acquisition.
    ///
    /// # Safety
    ///
    /// The current thread must hold an exclusive acquisition of this lock.
    unsafe fn unlock_exclusive(&self);

    /// Returns whether the lock is held in any mode.
    fn is_locked(&self) -> bool;

    /// Acquires the lock in shared mode, blocking until it is available.
    #[inline]
    fn lock_shared(&self) {
        self.lock_exclusive();
    }

    /// Attempts to acquire the lock in shared mode without blocking.
    #[inline]
    fn try_lock_shared(&self) -> bool {
        self.try_lock_exclusive()
    }

    /// Attempts to acquire the lock in shared mode until a timeout has
    /// expired.
    #[inline]
    fn try_lock_shared_for(&self, timeout: Duration) -> bool {
        self.try_lock_exclusive_for(timeout)
    }

    /// Attempts to acquire the lock in shared mode until a deadline is
    /// reached.
    #[inline]
    fn try_lock_shared_until(&self, deadline: Instant) -> bool {
        self.try_lock_exclusive_until(deadline)
    }

    /// Releases a shared acquisition.
    ///
    /// # Safety
    ///
    /// The current thread must hold a shared acquisition of this lock.
    #[inline]
    unsafe fn unlock_shared(&self) {
        // SAFETY: For kinds using this default body, shared mode is an alias
        //         of exclusive mode, so the caller holds an exclusive
        //         acquisition.
        unsafe {
            self.unlock_exclusive();
        }
    }
}

/// Marker for kinds whose exclusive mode excludes the acquiring thread from
/// re-entering.
///
/// While such an acquisition is held, no other acquisition of the same lock
/// exists anywhere, so a proxy may hand out `&mut T`.
///
/// # Safety
///
/// Implementations must guarantee that an exclusive acquisition is unique:
/// a thread that re-attempts `lock_exclusive` while holding the lock must
/// deadlock rather than succeed.
pub unsafe trait Unique: RawLock {}

/// Marker for kinds whose shared mode may hand out `&T`.
///
/// The bounds on `T` differ per kind: kinds that alias shared mode to
/// exclusive mode hand the reference to one thread at a time and only need
/// `T: Send`; kinds with genuinely concurrent readers additionally need
/// `T: Sync`.
///
/// # Safety
///
/// Implementations must guarantee that handing out `&T` for the duration of
/// a shared acquisition cannot create a data race under the declared bounds.
pub unsafe trait SharedAccess<T: ?Sized>: RawLock {}

/// Non-reentrant exclusive lock kind.
///
/// At most one thread holds the lock; a thread that re-enters deadlocks.
/// Shared mode is an alias of exclusive mode. This is the kind to use when
/// proxies should hand out `&mut T`.
pub struct Exclusive {
    raw: RawMutex,
}

// SAFETY: parking_lot's RawMutex provides mutual exclusion; shared mode uses
//         the default exclusive aliases.
unsafe impl RawLock for Exclusive {
    const INIT: Self = Exclusive {
        raw: RawMutex::INIT,
    };

    #[inline]
    fn lock_exclusive(&self) {
        self.raw.lock();
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        self.raw.try_lock()
    }

    #[inline]
    fn try_lock_exclusive_for(&self, timeout: Duration) -> bool {
        self.raw.try_lock_for(timeout)
    }

    #[inline]
    fn try_lock_exclusive_until(&self, deadline: Instant) -> bool {
        self.raw.try_lock_until(deadline)
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        // SAFETY: The caller holds an exclusive acquisition.
        unsafe {
            self.raw.unlock();
        }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }
}

// SAFETY: RawMutex is not reentrant; a second lock() on the holding thread
//         blocks forever.
unsafe impl Unique for Exclusive {}

// SAFETY: Shared mode aliases exclusive mode, so at most one thread at a
//         time observes &T. Moving access between threads needs T: Send.
unsafe impl<T: ?Sized + Send> SharedAccess<T> for Exclusive {}

/// Shared/exclusive lock kind.
///
/// Multiple shared holders or a single exclusive holder. Neither mode is
/// reentrant.
pub struct ReadWrite {
    raw: RawRwLock,
}

// SAFETY: parking_lot's RawRwLock provides the shared/exclusive protocol.
unsafe impl RawLock for ReadWrite {
    const INIT: Self = ReadWrite {
        raw: RawRwLock::INIT,
    };

    #[inline]
    fn lock_exclusive(&self) {
        self.raw.lock_exclusive();
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        self.raw.try_lock_exclusive()
    }

    #[inline]
    fn try_lock_exclusive_for(&self, timeout: Duration) -> bool {
        self.raw.try_lock_exclusive_for(timeout)
    }

    #[inline]
    fn try_lock_exclusive_until(&self, deadline: Instant) -> bool {
        self.raw.try_lock_exclusive_until(deadline)
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        // SAFETY: The caller holds an exclusive acquisition.
        unsafe {
            self.raw.unlock_exclusive();
        }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    #[inline]
    fn lock_shared(&self) {
        self.raw.lock_shared();
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        self.raw.try_lock_shared()
    }

    #[inline]
    fn try_lock_shared_for(&self, timeout: Duration) -> bool {
        self.raw.try_lock_shared_for(timeout)
    }

    #[inline]
    fn try_lock_shared_until(&self, deadline: Instant) -> bool {
        self.raw.try_lock_shared_until(deadline)
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        // SAFETY: The caller holds a shared acquisition.
        unsafe {
            self.raw.unlock_shared();
        }
    }
}

// SAFETY: RawRwLock's exclusive mode is not reentrant and excludes all
//         readers.
unsafe impl Unique for ReadWrite {}

// SAFETY: Shared mode hands &T to multiple threads at once, which is exactly
//         what T: Sync permits. T: Send covers handing the value between
//         exclusive holders on different threads.
unsafe impl<T: ?Sized + Send + Sync> SharedAccess<T> for ReadWrite {}
