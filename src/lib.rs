//! This crate provides the [`LockedAround`] and [`SafePtr`] types, which
//! attach a mutual-exclusion discipline to an arbitrary value so that every
//! operation on the value runs while holding the associated lock.
//!
//! # Motivation
//!
//! The execute-around pattern is common in C++:
//!
//! ```cpp
//! execute_around<std::vector<int>> vec(10, 10);
//! int sum = std::accumulate(vec->begin(), vec->end(), 0);
//! ```
//!
//! The `->` operator produces a temporary proxy that locks a mutex, forwards
//! the member access, and unlocks when the full expression ends. Any object
//! becomes "thread-safe" without sprinkling lock/unlock pairs through the
//! code, and without the possibility of forgetting the unlock.
//!
//! Rust expresses the same contract with ownership instead of temporary
//! lifetime rules: the proxy is a guard value that derefs to the wrapped
//! value and releases the lock when dropped, so the borrow checker enforces
//! that no access outlives the critical region.
//!
//! # Wrappers
//!
//! - [`LockedAround<T, M>`](LockedAround) owns the value and its lock. It is
//!   movable but not cloneable.
//! - [`SafePtr<T, M>`](SafePtr) refcounts the value and its lock, so cloned
//!   handles share both and can be handed to concurrent workers.
//!
//! Both are generic over the lock kind `M`:
//!
//! - [`Reentrant`] (default): the holding thread may acquire again, so any
//!   number of proxies may be alive on one thread. Proxies deref to `&T`;
//!   mutation goes through interior mutability.
//! - [`Exclusive`]: one acquisition total; proxies deref to `&mut T`.
//! - [`ReadWrite`]: many shared holders or one exclusive holder;
//!   [`SafePtr::read`] takes the shared path.
//!
//! # Example
//!
//! A mapping shared between workers, every access through a proxy:
//!
//! ```
//! use {
//!     lock_around::{Exclusive, SafePtr},
//!     std::{collections::HashMap, thread},
//! };
//!
//! type Shelf = HashMap<String, (String, u64)>;
//!
//! let shelf: SafePtr<Shelf, Exclusive> = SafePtr::with_kind(HashMap::new());
//!
//! thread::scope(|s| {
//!     for _ in 0..10 {
//!         let shelf = shelf.clone();
//!         s.spawn(move || {
//!             shelf.enter().insert("apple".into(), ("fruit".into(), 0));
//!             for _ in 0..1000 {
//!                 shelf.enter().get_mut("apple").unwrap().1 += 1;
//!             }
//!             let report = format!("apple is {:?}", shelf.read()["apple"]);
//!             assert!(report.contains("fruit"));
//!         });
//!     }
//! });
//!
//! let (kind, count) = shelf.read()["apple"].clone();
//! assert_eq!(kind, "fruit");
//! assert!(count >= 1000);
//! ```
//!
//! Proxy construction and destruction emit `locked` and `unlocked` trace
//! events via [`log`](https://docs.rs/log), target `lock_around`.

pub use {
    around::{LockedAround, Proxy},
    raw::{Exclusive, RawLock, ReadWrite, SharedAccess, Unique},
    reentrant::Reentrant,
    safe_ptr::{ExclusiveProxy, SafePtr, SharedProxy},
};

mod around;
mod owner;
mod raw;
mod reentrant;
mod safe_ptr;
