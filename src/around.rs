use {
    crate::{
        raw::{RawLock, Unique},
        reentrant::Reentrant,
    },
    debug_fn::debug_fn,
    log::trace,
    opera::{PhantomNotSend, PhantomNotSync},
    run_on_drop::on_drop,
    static_assertions::{assert_impl_all, assert_not_impl_any},
    std::{
        cell::UnsafeCell,
        fmt::{Debug, Formatter},
        ops::{Deref, DerefMut},
        time::Duration,
    },
};


/// A value paired with a lock that every access goes through.
///
/// [`enter`](Self::enter) acquires the lock and returns a [`Proxy`] that
/// derefs to the value and releases the lock when it is dropped, so any
/// single expression on the value runs inside the critical region:
///
/// ```
/// use lock_around::LockedAround;
///
/// let numbers = LockedAround::new(vec![10; 10]);
/// let sum: i32 = numbers.enter().iter().sum();
/// assert_eq!(sum, 100);
/// ```
///
/// With the default [`Reentrant`] kind, multiple proxies may be alive on the
/// same thread at once and the value is reachable through each of them. The
/// proxies only deref to `&T`, so mutation goes through interior mutability:
///
/// ```
/// use std::cell::Cell;
/// use lock_around::LockedAround;
///
/// let counter = LockedAround::new(Cell::new(0));
/// let a = counter.enter();
/// let b = counter.enter();
/// a.set(a.get() + 1);
/// b.set(b.get() + 1);
/// drop(b);
/// drop(a);
/// assert_eq!(counter.into_inner().get(), 2);
/// ```
///
/// With a non-reentrant kind such as [`Exclusive`](crate::Exclusive), the
/// proxy additionally derefs to `&mut T`:
///
/// ```
/// use lock_around::{Exclusive, LockedAround};
///
/// let numbers: LockedAround<Vec<i32>, Exclusive> = LockedAround::with_kind(vec![]);
/// numbers.enter().push(1);
/// numbers.enter().push(2);
/// assert_eq!(numbers.into_inner(), vec![1, 2]);
/// ```
pub struct LockedAround<T, M = Reentrant>
where
    T: ?Sized,
    M: RawLock,
{
    lock: M,
    value: UnsafeCell<T>,
}

/// A scoped access token over a [`LockedAround`] value.
///
/// Created by [`LockedAround::enter`] and the try variants. The proxy holds
/// the lock exclusively from construction until it is dropped; dropping
/// releases the lock on every exit path, including unwinding.
///
/// The proxy is movable but tied to the thread that acquired it: it is
/// neither [`Send`] nor [`Sync`].
pub struct Proxy<'a, T, M>
where
    T: ?Sized,
    M: RawLock,
{
    owner: &'a LockedAround<T, M>,
    _phantom_not_send: PhantomNotSend,
    _phantom_not_sync: PhantomNotSync,
}

assert_impl_all!(LockedAround<i32>: Send, Sync);

assert_not_impl_any!(Proxy<'_, i32, Reentrant>: Send, Sync);

// SAFETY: - Proxies and `with` hand out &T to at most one thread at a time
//           since every access path acquires the lock exclusively.
//         - Therefore Sync can be modeled as transferring ownership of the
//           value every time the accessing thread changes, which is what
//           T: Send permits.
//         - DerefMut is only available for Unique kinds, where the single
//           exclusive acquisition also rules out a second proxy on the
//           acquiring thread.
unsafe impl<T, M> Sync for LockedAround<T, M>
where
    T: ?Sized + Send,
    M: RawLock + Sync,
{
}

impl<T> LockedAround<T> {
    /// Creates a wrapper with the default [`Reentrant`] kind.
    ///
    /// # Example
    ///
    /// ```
    /// use lock_around::LockedAround;
    ///
    /// let value = LockedAround::new(5);
    /// assert_eq!(*value.enter(), 5);
    /// ```
    #[inline]
    pub fn new(value: T) -> Self {
        Self::with_kind(value)
    }
}

impl<T, M> LockedAround<T, M>
where
    M: RawLock,
{
    /// Creates a wrapper with an explicit lock kind.
    ///
    /// # Example
    ///
    /// ```
    /// use lock_around::{LockedAround, ReadWrite};
    ///
    /// let value: LockedAround<i32, ReadWrite> = LockedAround::with_kind(5);
    /// assert_eq!(*value.enter(), 5);
    /// ```
    #[inline]
    pub fn with_kind(value: T) -> Self {
        LockedAround {
            lock: M::INIT,
            value: UnsafeCell::new(value),
        }
    }

    /// Unwraps the value, consuming the wrapper.
    ///
    /// # Example
    ///
    /// ```
    /// use lock_around::LockedAround;
    ///
    /// let value = LockedAround::new(5);
    /// assert_eq!(value.into_inner(), 5);
    /// ```
    #[inline]
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T, M> LockedAround<T, M>
where
    T: ?Sized,
    M: RawLock,
{
    /// Acquires the lock and returns a proxy to the value.
    ///
    /// Blocks until the lock is available. With the [`Reentrant`] kind the
    /// call returns immediately if the current thread already holds the
    /// lock; with a non-reentrant kind it deadlocks.
    #[inline]
    pub fn enter(&self) -> Proxy<'_, T, M> {
        self.lock.lock_exclusive();
        Proxy::new(self)
    }

    /// Attempts to acquire the lock without blocking.
    ///
    /// Returns `None` if the lock could not be acquired; the value is not
    /// touched in that case.
    ///
    /// # Example
    ///
    /// ```
    /// use lock_around::LockedAround;
    ///
    /// let value = LockedAround::new(5);
    /// assert_eq!(*value.try_enter().unwrap(), 5);
    /// ```
    #[inline]
    pub fn try_enter(&self) -> Option<Proxy<'_, T, M>> {
        self.lock.try_lock_exclusive().then(|| Proxy::new(self))
    }

    /// Attempts to acquire the lock until a timeout has expired.
    #[inline]
    pub fn try_enter_for(&self, timeout: Duration) -> Option<Proxy<'_, T, M>> {
        self.lock
            .try_lock_exclusive_for(timeout)
            .then(|| Proxy::new(self))
    }

    /// Runs a closure on the value while holding the lock.
    ///
    /// The lock is released when the closure returns or unwinds.
    ///
    /// # Example
    ///
    /// ```
    /// use lock_around::LockedAround;
    ///
    /// let value = LockedAround::new(vec![1, 2, 3]);
    /// assert_eq!(value.with(|v| v.len()), 3);
    /// ```
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.lock.lock_exclusive();
        trace!(target: "lock_around", "locked {:p}", self.addr());
        let _unlock = on_drop(|| {
            trace!(target: "lock_around", "unlocked {:p}", self.addr());
            // SAFETY: We acquired the lock exclusively above and nothing
            //         else releases this acquisition.
            unsafe {
                self.lock.unlock_exclusive();
            }
        });
        // SAFETY: - We hold the lock exclusively for the whole call.
        //         - The reference cannot escape the closure.
        f(unsafe { &*self.value.get() })
    }

    /// Returns a mutable reference to the value.
    ///
    /// No locking is needed since this borrows the wrapper mutably.
    ///
    /// # Example
    ///
    /// ```
    /// use lock_around::LockedAround;
    ///
    /// let mut value = LockedAround::new(5);
    /// *value.get_mut() = 6;
    /// assert_eq!(value.into_inner(), 6);
    /// ```
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Returns a pointer to the value.
    #[inline]
    pub fn data_ptr(&self) -> *const T {
        self.value.get()
    }

    #[inline]
    pub(crate) fn addr(&self) -> *const u8 {
        let addr: *const M = &self.lock;
        addr.cast()
    }
}

impl<T, M> Default for LockedAround<T, M>
where
    T: Default,
    M: RawLock,
{
    #[inline]
    fn default() -> Self {
        Self::with_kind(T::default())
    }
}

impl<T, M> Debug for LockedAround<T, M>
where
    T: ?Sized + Debug,
    M: RawLock,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedAround")
            .field("lock_id", &self.addr())
            .field(
                "value",
                &debug_fn(|fmt| {
                    if let Some(proxy) = self.try_enter() {
                        Debug::fmt(&*proxy, fmt)
                    } else {
                        fmt.write_str("<locked>")
                    }
                }),
            )
            .finish_non_exhaustive()
    }
}

impl<'a, T, M> Proxy<'a, T, M>
where
    T: ?Sized,
    M: RawLock,
{
    #[inline]
    fn new(owner: &'a LockedAround<T, M>) -> Self {
        trace!(target: "lock_around", "locked {:p}", owner.addr());
        Proxy {
            owner,
            _phantom_not_send: Default::default(),
            _phantom_not_sync: Default::default(),
        }
    }
}

impl<T, M> Deref for Proxy<'_, T, M>
where
    T: ?Sized,
    M: RawLock,
{
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: - This proxy owns an exclusive acquisition, so no other
        //           thread can hold one and no other thread can observe the
        //           value.
        //         - With a reentrant kind, other proxies on this thread may
        //           also hand out &T, which shared references permit.
        //         - DerefMut is confined to Unique kinds, where no second
        //           proxy can exist, and the returned &mut T borrows this
        //           proxy, so it cannot overlap with this &T.
        unsafe { &*self.owner.value.get() }
    }
}

impl<T, M> DerefMut for Proxy<'_, T, M>
where
    T: ?Sized,
    M: RawLock + Unique,
{
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: - Unique guarantees that this proxy's acquisition is the
        //           only one anywhere, so this proxy is the only access path
        //           to the value.
        //         - The returned reference borrows the proxy mutably, so no
        //           deref of the same proxy can overlap with it.
        unsafe { &mut *self.owner.value.get() }
    }
}

impl<T, M> Drop for Proxy<'_, T, M>
where
    T: ?Sized,
    M: RawLock,
{
    #[inline]
    fn drop(&mut self) {
        trace!(target: "lock_around", "unlocked {:p}", self.owner.addr());
        // SAFETY: This proxy owns one exclusive acquisition and this is the
        //         only place that releases it.
        unsafe {
            self.owner.lock.unlock_exclusive();
        }
    }
}

impl<T, M> Debug for Proxy<'_, T, M>
where
    T: ?Sized + Debug,
    M: RawLock,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&**self, f)
    }
}
