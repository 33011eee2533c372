use {
    crate::{Exclusive, ReadWrite, SafePtr},
    std::{
        cell::RefCell,
        collections::HashMap,
        sync::Barrier,
        thread,
        time::{Duration, Instant},
    },
};

fn run_in_thread<T: Send>(f: impl FnOnce() -> T + Send) -> T {
    thread::scope(|s| s.spawn(|| f()).join().unwrap())
}

#[test]
fn new() {
    let value = SafePtr::new(1);
    assert_eq!(*value.enter(), 1);
    assert_eq!(*value.read(), 1);
}

#[test]
fn default() {
    let value: SafePtr<u32, Exclusive> = Default::default();
    assert_eq!(*value.read(), 0);
}

#[test]
fn clone_shares() {
    let value: SafePtr<Vec<i32>, Exclusive> = SafePtr::with_kind(vec![]);
    let other = value.clone();
    assert!(value.ptr_eq(&other));
    assert!(value.shares_lock_with(&other));
    assert_eq!(value.data_ptr(), other.data_ptr());
    value.enter().push(1);
    run_in_thread(|| {
        other.enter().push(2);
    });
    assert_eq!(*value.read(), vec![1, 2]);
}

#[test]
fn independent() {
    let first = SafePtr::new(1);
    let second = SafePtr::new(2);
    assert!(!first.ptr_eq(&second));
    assert!(!first.shares_lock_with(&second));
    let _proxy = first.enter();
    run_in_thread(|| {
        // Contention on one wrapper does not block the other.
        assert!(second.try_enter().is_some());
        assert!(first.try_enter().is_none());
    });
}

#[test]
fn subscript() {
    let map: SafePtr<HashMap<&str, i32>, Exclusive> =
        SafePtr::with_kind(HashMap::from([("a", 1)]));
    map.enter().insert("b", 2);
    *map.enter().get_mut("a").unwrap() = 3;
    assert_eq!(map.read()["a"], 3);
    assert_eq!(map.read()["b"], 2);

    let items: SafePtr<Vec<i32>, Exclusive> = SafePtr::with_kind(vec![0; 3]);
    items.enter()[1] = 5;
    assert_eq!(items.read()[1], 5);
}

#[test]
fn shared_map_counter() {
    type Shelf = HashMap<String, (String, u64)>;
    let map: SafePtr<Shelf, Exclusive> = SafePtr::with_kind(HashMap::new());
    {
        let mut m = map.enter();
        m.insert("apple".into(), (String::new(), 0));
        m.insert("potato".into(), (String::new(), 0));
    }
    thread::scope(|s| {
        for _ in 0..10 {
            let map = map.clone();
            s.spawn(move || {
                map.enter().get_mut("apple").unwrap().0 = "fruit".into();
                map.enter().get_mut("potato").unwrap().0 = "vegetable".into();
                for _ in 0..10_000 {
                    map.enter().get_mut("apple").unwrap().1 += 1;
                    map.enter().get_mut("potato").unwrap().1 += 1;
                }
                let readonly = map.clone();
                let m = readonly.read();
                let line = format!(
                    "potato is {} {}, apple is {} {}",
                    m["potato"].0, m["potato"].1, m["apple"].0, m["apple"].1,
                );
                assert!(line.starts_with("potato is vegetable"));
                assert!(line.contains("apple is fruit"));
            });
        }
    });
    let m = map.read();
    assert_eq!(m["apple"], ("fruit".to_string(), 100_000));
    assert_eq!(m["potato"], ("vegetable".to_string(), 100_000));
}

#[test]
fn shared_map_counter_reentrant() {
    let map: SafePtr<RefCell<HashMap<String, u64>>> = SafePtr::new(RefCell::new(HashMap::new()));
    thread::scope(|s| {
        for _ in 0..4 {
            let map = map.clone();
            s.spawn(move || {
                for _ in 0..1000 {
                    let outer = map.enter();
                    // Nested proxies are fine under the reentrant kind.
                    *map.enter().borrow_mut().entry("apple".into()).or_insert(0) += 1;
                    drop(outer);
                }
            });
        }
    });
    assert_eq!(map.read().borrow()["apple"], 4000);
}

#[test]
fn readers_coexist() {
    let value: SafePtr<u64, ReadWrite> = SafePtr::with_kind(7);
    let barrier = Barrier::new(2);
    thread::scope(|s| {
        for _ in 0..2 {
            let value = value.clone();
            let barrier = &barrier;
            s.spawn(move || {
                let proxy = value.read();
                // Both threads hold a read proxy across this point.
                barrier.wait();
                assert_eq!(*proxy, 7);
                barrier.wait();
            });
        }
    });
}

#[test]
fn writer_excludes_readers() {
    let value: SafePtr<u64, ReadWrite> = SafePtr::with_kind(7);
    let writer = value.enter();
    run_in_thread(|| {
        assert!(value.try_read().is_none());
        assert!(value.try_enter().is_none());
    });
    drop(writer);
    let reader = value.read();
    run_in_thread(|| {
        assert!(value.try_enter().is_none());
        assert!(value.try_read().is_some());
    });
    drop(reader);
    run_in_thread(|| {
        assert!(value.try_enter().is_some());
    });
}

#[test]
fn link() {
    let first: SafePtr<i32, Exclusive> = SafePtr::with_kind(1);
    let mut second: SafePtr<String, Exclusive> = SafePtr::with_kind("two".into());
    assert!(!second.shares_lock_with(&first));
    second.link(&first);
    assert!(second.shares_lock_with(&first));
    let proxy = first.enter();
    run_in_thread(|| {
        assert!(second.try_enter().is_none());
        assert!(first.try_enter().is_none());
    });
    drop(proxy);
    run_in_thread(|| {
        assert!(second.try_enter().is_some());
    });
}

#[test]
#[should_panic(expected = "already been shared")]
fn link_after_share() {
    let first = SafePtr::new(1);
    let mut second = SafePtr::new(2);
    let _other_handle = second.clone();
    second.link(&first);
}

#[test]
fn try_enter() {
    let value = SafePtr::new(1);
    let proxy = value.enter();
    // Re-entering succeeds on the holding thread.
    assert!(value.try_enter().is_some());
    assert!(value.try_read().is_some());
    run_in_thread(|| {
        assert!(value.try_enter().is_none());
        assert!(value.try_read().is_none());
    });
    drop(proxy);
    run_in_thread(|| {
        assert!(value.try_enter().is_some());
    });
}

#[test]
fn try_enter_for() {
    let value: SafePtr<i32, Exclusive> = SafePtr::with_kind(1);
    let timeout = Duration::from_millis(100);
    let proxy = value.try_enter_for(timeout).unwrap();
    run_in_thread(|| {
        let start = Instant::now();
        assert!(value.try_enter_for(timeout).is_none());
        assert!(start.elapsed() >= timeout);
        assert!(value.try_read_for(timeout).is_none());
    });
    drop(proxy);
    run_in_thread(|| {
        assert!(value.try_read_for(timeout).is_some());
    });
}

#[test]
fn unwind_releases() {
    let value: SafePtr<i32, Exclusive> = SafePtr::with_kind(1);
    let worker = value.clone();
    let result = thread::spawn(move || {
        let _proxy = worker.enter();
        panic!("inner failure");
    })
    .join();
    assert!(result.is_err());
    assert!(value.try_enter().is_some());
}

#[test]
fn debug() {
    let s = "hello world";
    let value = SafePtr::new(s);
    assert!(format!("{value:?}").contains(s));
    let _proxy = value.enter();
    // Reentrant: the holding thread can still format the value.
    assert!(format!("{value:?}").contains(s));
    let formatted = run_in_thread(|| format!("{value:?}"));
    assert!(!formatted.contains(s));
    assert!(formatted.contains("<locked>"));
}
