use {
    crate::raw::{Exclusive, RawLock, ReadWrite},
    std::{
        thread,
        time::{Duration, Instant},
    },
};

fn run_in_thread<T: Send>(f: impl FnOnce() -> T + Send) -> T {
    thread::scope(|s| s.spawn(|| f()).join().unwrap())
}

#[test]
fn exclusive_excludes() {
    let lock = Exclusive::INIT;
    assert_eq!(lock.is_locked(), false);
    lock.lock_exclusive();
    assert_eq!(lock.is_locked(), true);
    run_in_thread(|| {
        assert_eq!(lock.try_lock_exclusive(), false);
    });
    unsafe {
        lock.unlock_exclusive();
    }
    assert_eq!(lock.is_locked(), false);
    run_in_thread(|| {
        assert_eq!(lock.try_lock_exclusive(), true);
        unsafe {
            lock.unlock_exclusive();
        }
    });
}

#[test]
fn exclusive_shared_aliases() {
    let lock = Exclusive::INIT;
    lock.lock_shared();
    run_in_thread(|| {
        assert_eq!(lock.try_lock_shared(), false);
        assert_eq!(lock.try_lock_exclusive(), false);
    });
    unsafe {
        lock.unlock_shared();
    }
    assert_eq!(lock.is_locked(), false);
}

#[test]
fn exclusive_timed() {
    let lock = Exclusive::INIT;
    let timeout = Duration::from_millis(100);
    assert_eq!(lock.try_lock_exclusive_for(timeout), true);
    run_in_thread(|| {
        let start = Instant::now();
        assert_eq!(lock.try_lock_exclusive_for(timeout), false);
        assert!(start.elapsed() >= timeout);
        assert_eq!(lock.try_lock_exclusive_until(Instant::now() + timeout), false);
    });
    unsafe {
        lock.unlock_exclusive();
    }
    assert_eq!(lock.try_lock_exclusive_until(Instant::now() + timeout), true);
    unsafe {
        lock.unlock_exclusive();
    }
}

#[test]
fn read_write_many_readers() {
    let lock = ReadWrite::INIT;
    lock.lock_shared();
    run_in_thread(|| {
        assert_eq!(lock.try_lock_shared(), true);
        assert_eq!(lock.try_lock_exclusive(), false);
        unsafe {
            lock.unlock_shared();
        }
    });
    run_in_thread(|| {
        assert_eq!(lock.try_lock_shared_for(Duration::from_millis(10)), true);
        unsafe {
            lock.unlock_shared();
        }
    });
    unsafe {
        lock.unlock_shared();
    }
    assert_eq!(lock.is_locked(), false);
}

#[test]
fn read_write_writer_excludes() {
    let lock = ReadWrite::INIT;
    lock.lock_exclusive();
    run_in_thread(|| {
        assert_eq!(lock.try_lock_shared(), false);
        assert_eq!(lock.try_lock_exclusive(), false);
        assert_eq!(lock.try_lock_shared_until(Instant::now() + Duration::from_millis(10)), false);
    });
    unsafe {
        lock.unlock_exclusive();
    }
    run_in_thread(|| {
        assert_eq!(lock.try_lock_exclusive(), true);
        unsafe {
            lock.unlock_exclusive();
        }
    });
}
