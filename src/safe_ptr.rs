use {
    crate::{
        raw::{RawLock, SharedAccess, Unique},
        reentrant::Reentrant,
    },
    debug_fn::debug_fn,
    log::trace,
    opera::{PhantomNotSend, PhantomNotSync},
    static_assertions::{assert_impl_all, assert_not_impl_any},
    std::{
        cell::UnsafeCell,
        fmt::{Debug, Formatter},
        ops::{Deref, DerefMut},
        sync::Arc,
        time::Duration,
    },
};

#[cfg(test)]
mod tests;

/// A shareable handle to a value and the lock that guards it.
///
/// Cloning the handle shares the value and the lock; it never clones the
/// value. Handles are cheap to copy around and can be handed to concurrent
/// workers freely. Two independently constructed handles share nothing.
///
/// Access goes through short-lived proxies: [`enter`](Self::enter) acquires
/// the lock exclusively, [`read`](Self::read) acquires it in shared mode
/// (which is the same thing unless the kind is [`ReadWrite`](crate::ReadWrite)).
///
/// ```
/// use {
///     lock_around::{Exclusive, SafePtr},
///     std::{collections::HashMap, thread},
/// };
///
/// let map: SafePtr<HashMap<String, u64>, Exclusive> = SafePtr::with_kind(HashMap::new());
/// thread::scope(|s| {
///     for _ in 0..4 {
///         let map = map.clone();
///         s.spawn(move || {
///             *map.enter().entry("apple".to_string()).or_insert(0) += 1;
///         });
///     }
/// });
/// assert_eq!(map.read()["apple"], 4);
/// ```
///
/// With the default [`Reentrant`] kind the proxies only deref to `&T`, so a
/// mutable value goes behind a [`RefCell`](std::cell::RefCell) or
/// [`Cell`](std::cell::Cell); the lock makes that sound across threads.
pub struct SafePtr<T, M = Reentrant>
where
    T: ?Sized,
    M: RawLock,
{
    // The value and its lock are refcounted separately so that link() can
    // replace the lock of an unshared handle. The public API never hands out
    // one without the other.
    value: Arc<UnsafeCell<T>>,
    lock: Arc<M>,
}

/// A scoped token holding a [`SafePtr`]'s lock exclusively.
///
/// Created by [`SafePtr::enter`] and the try variants. Derefs to the value;
/// for [`Unique`] kinds it also derefs mutably. Dropping the proxy releases
/// the lock on every exit path, including unwinding.
///
/// The proxy is movable but tied to the thread that acquired it: it is
/// neither [`Send`] nor [`Sync`].
pub struct ExclusiveProxy<'a, T, M>
where
    T: ?Sized,
    M: RawLock,
{
    handle: &'a SafePtr<T, M>,
    _phantom_not_send: PhantomNotSend,
    _phantom_not_sync: PhantomNotSync,
}

/// A scoped token holding a [`SafePtr`]'s lock in shared mode.
///
/// Created by [`SafePtr::read`] and the try variants. Derefs to the value.
/// With the [`ReadWrite`](crate::ReadWrite) kind, any number of these may be
/// held concurrently across threads; with the other kinds, shared mode is an
/// alias of exclusive mode.
pub struct SharedProxy<'a, T, M>
where
    T: ?Sized,
    M: RawLock,
{
    handle: &'a SafePtr<T, M>,
    _phantom_not_send: PhantomNotSend,
    _phantom_not_sync: PhantomNotSync,
}

assert_impl_all!(SafePtr<i32>: Send, Sync);

assert_not_impl_any!(ExclusiveProxy<'_, i32, Reentrant>: Send, Sync);

assert_not_impl_any!(SharedProxy<'_, i32, Reentrant>: Send, Sync);

// SAFETY: - A handle only exposes the value through proxies, and every proxy
//           path holds the lock in the appropriate mode.
//         - enter() is exclusive, so at most one thread at a time observes
//           the value through it; that is ownership transfer, i.e. T: Send.
//         - read() is additionally gated on M: SharedAccess<T>, which
//           requires T: Sync for the one kind whose shared mode hands &T to
//           several threads at once.
//         - M must be Send + Sync since Arc shares it across threads.
unsafe impl<T, M> Send for SafePtr<T, M>
where
    T: ?Sized + Send,
    M: RawLock + Send + Sync,
{
}

// SAFETY: Dito. A &SafePtr exposes nothing a SafePtr does not.
unsafe impl<T, M> Sync for SafePtr<T, M>
where
    T: ?Sized + Send,
    M: RawLock + Send + Sync,
{
}

impl<T> SafePtr<T> {
    /// Creates a handle with the default [`Reentrant`] kind.
    ///
    /// # Example
    ///
    /// ```
    /// use lock_around::SafePtr;
    ///
    /// let value = SafePtr::new(5);
    /// assert_eq!(*value.enter(), 5);
    /// ```
    #[inline]
    pub fn new(value: T) -> Self {
        Self::with_kind(value)
    }
}

impl<T, M> SafePtr<T, M>
where
    M: RawLock,
{
    /// Creates a handle with an explicit lock kind.
    ///
    /// # Example
    ///
    /// ```
    /// use lock_around::{ReadWrite, SafePtr};
    ///
    /// let value: SafePtr<i32, ReadWrite> = SafePtr::with_kind(5);
    /// assert_eq!(*value.read(), 5);
    /// ```
    #[inline]
    pub fn with_kind(value: T) -> Self {
        SafePtr {
            value: Arc::new(UnsafeCell::new(value)),
            lock: Arc::new(M::INIT),
        }
    }
}

impl<T, M> SafePtr<T, M>
where
    T: ?Sized,
    M: RawLock,
{
    /// Acquires the lock exclusively and returns a proxy to the value.
    ///
    /// Blocks until the lock is available. With the [`Reentrant`] kind the
    /// call returns immediately if the current thread already holds the
    /// lock; with a non-reentrant kind it deadlocks.
    #[inline]
    pub fn enter(&self) -> ExclusiveProxy<'_, T, M> {
        self.lock.lock_exclusive();
        ExclusiveProxy::new(self)
    }

    /// Attempts to acquire the lock exclusively without blocking.
    ///
    /// Returns `None` if the lock could not be acquired; the value is not
    /// touched in that case.
    #[inline]
    pub fn try_enter(&self) -> Option<ExclusiveProxy<'_, T, M>> {
        self.lock
            .try_lock_exclusive()
            .then(|| ExclusiveProxy::new(self))
    }

    /// Attempts to acquire the lock exclusively until a timeout has expired.
    #[inline]
    pub fn try_enter_for(&self, timeout: Duration) -> Option<ExclusiveProxy<'_, T, M>> {
        self.lock
            .try_lock_exclusive_for(timeout)
            .then(|| ExclusiveProxy::new(self))
    }

    /// Acquires the lock in shared mode and returns a read proxy.
    ///
    /// For kinds without a real shared mode this acquires exclusively, so it
    /// is always safe to reach for this on the read path.
    #[inline]
    pub fn read(&self) -> SharedProxy<'_, T, M>
    where
        M: SharedAccess<T>,
    {
        self.lock.lock_shared();
        SharedProxy::new(self)
    }

    /// Attempts to acquire the lock in shared mode without blocking.
    #[inline]
    pub fn try_read(&self) -> Option<SharedProxy<'_, T, M>>
    where
        M: SharedAccess<T>,
    {
        self.lock.try_lock_shared().then(|| SharedProxy::new(self))
    }

    /// Attempts to acquire the lock in shared mode until a timeout has
    /// expired.
    #[inline]
    pub fn try_read_for(&self, timeout: Duration) -> Option<SharedProxy<'_, T, M>>
    where
        M: SharedAccess<T>,
    {
        self.lock
            .try_lock_shared_for(timeout)
            .then(|| SharedProxy::new(self))
    }

    /// Makes this handle share `other`'s lock, discarding its own.
    ///
    /// After linking, one lock guards both values, so workers touching both
    /// need no lock ordering between them.
    ///
    /// This must happen before the handle is shared: cloning creates handles
    /// that keep the old lock, which would leave the value reachable under
    /// two different locks.
    ///
    /// # Panics
    ///
    /// Panics if this handle has already been cloned.
    ///
    /// # Example
    ///
    /// ```
    /// use lock_around::SafePtr;
    ///
    /// let first = SafePtr::new(1);
    /// let mut second = SafePtr::new(2);
    /// second.link(&first);
    /// assert!(second.shares_lock_with(&first));
    /// ```
    pub fn link<U>(&mut self, other: &SafePtr<U, M>)
    where
        U: ?Sized,
    {
        assert_eq!(
            Arc::strong_count(&self.value),
            1,
            "cannot link a SafePtr that has already been shared",
        );
        self.lock = other.lock.clone();
    }

    /// Returns whether two handles are guarded by the same lock.
    ///
    /// True for clones of one handle and for handles joined by
    /// [`link`](Self::link).
    #[inline]
    pub fn shares_lock_with<U>(&self, other: &SafePtr<U, M>) -> bool
    where
        U: ?Sized,
    {
        Arc::ptr_eq(&self.lock, &other.lock)
    }

    /// Returns whether two handles refer to the same value.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    /// Returns a pointer to the value.
    #[inline]
    pub fn data_ptr(&self) -> *const T {
        self.value.get()
    }

    #[inline]
    pub(crate) fn addr(&self) -> *const u8 {
        let addr: *const M = &*self.lock;
        addr.cast()
    }
}

impl<T, M> Clone for SafePtr<T, M>
where
    T: ?Sized,
    M: RawLock,
{
    /// Creates another handle to the same value and the same lock.
    #[inline]
    fn clone(&self) -> Self {
        SafePtr {
            value: self.value.clone(),
            lock: self.lock.clone(),
        }
    }
}

impl<T, M> Default for SafePtr<T, M>
where
    T: Default,
    M: RawLock,
{
    #[inline]
    fn default() -> Self {
        Self::with_kind(T::default())
    }
}

impl<T, M> Debug for SafePtr<T, M>
where
    T: ?Sized + Debug,
    M: RawLock,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafePtr")
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

impl<'a, T, M> ExclusiveProxy<'a, T, M>
where
    T: ?Sized,
    M: RawLock,
{
    #[inline]
    fn new(handle: &'a SafePtr<T, M>) -> Self {
        trace!(target: "lock_around", "locked {:p}", handle.addr());
        ExclusiveProxy {
            handle,
            _phantom_not_send: Default::default(),
            _phantom_not_sync: Default::default(),
        }
    }
}

impl<T, M> Deref for ExclusiveProxy<'_, T, M>
where
    T: ?Sized,
    M: RawLock,
{
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: - This proxy owns an exclusive acquisition, so no other
        //           thread can observe the value while it is alive.
        //         - With a reentrant kind, other proxies on this thread may
        //           also hand out &T, which shared references permit.
        unsafe { &*self.handle.value.get() }
    }
}

impl<T, M> DerefMut for ExclusiveProxy<'_, T, M>
where
    T: ?Sized,
    M: RawLock + Unique,
{
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: - Unique guarantees this proxy's acquisition is the only
        //           one anywhere, so this proxy is the only access path to
        //           the value.
        //         - The returned reference borrows the proxy mutably, so no
        //           deref of the same proxy can overlap with it.
        unsafe { &mut *self.handle.value.get() }
    }
}

impl<T, M> Drop for ExclusiveProxy<'_, T, M>
where
    T: ?Sized,
    M: RawLock,
{
    #[inline]
    fn drop(&mut self) {
        trace!(target: "lock_around", "unlocked {:p}", self.handle.addr());
        // SAFETY: This proxy owns one exclusive acquisition and this is the
        //         only place that releases it.
        unsafe {
            self.handle.lock.unlock_exclusive();
        }
    }
}

impl<T, M> Debug for ExclusiveProxy<'_, T, M>
where
    T: ?Sized + Debug,
    M: RawLock,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&**self, f)
    }
}

impl<'a, T, M> SharedProxy<'a, T, M>
where
    T: ?Sized,
    M: RawLock,
{
    #[inline]
    fn new(handle: &'a SafePtr<T, M>) -> Self {
        trace!(target: "lock_around", "locked {:p}", handle.addr());
        SharedProxy {
            handle,
            _phantom_not_send: Default::default(),
            _phantom_not_sync: Default::default(),
        }
    }
}

impl<T, M> Deref for SharedProxy<'_, T, M>
where
    T: ?Sized,
    M: RawLock,
{
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: - This proxy owns a shared acquisition, so no exclusive
        //           proxy is alive anywhere.
        //         - Construction went through M: SharedAccess<T>, whose
        //           bounds make &T sound for however many holders the kind's
        //           shared mode admits.
        unsafe { &*self.handle.value.get() }
    }
}

impl<T, M> Drop for SharedProxy<'_, T, M>
where
    T: ?Sized,
    M: RawLock,
{
    #[inline]
    fn drop(&mut self) {
        trace!(target: "lock_around", "unlocked {:p}", self.handle.addr());
        // SAFETY: This proxy owns one shared acquisition and this is the
        //         only place that releases it.
        unsafe {
            self.handle.lock.unlock_shared();
        }
    }
}

impl<T, M> Debug for SharedProxy<'_, T, M>
where
    T: ?Sized + Debug,
    M: RawLock,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&**self, f)
    }
}
