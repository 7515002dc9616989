use {
    crate::{
        AcquirePolicy, CancellationToken, DocumentLock, Error, LockMode,
        execution_unit::execution_unit_id,
    },
    std::{
        mem,
        panic::{self, AssertUnwindSafe},
        sync::{Barrier, atomic::Ordering::Relaxed},
        thread,
        time::{Duration, Instant},
    },
};

fn assert_default(lock: &DocumentLock) {
    assert_eq!(lock.shared.writer.load(Relaxed), 0);
    assert!(!lock.is_locked());
    assert_eq!(lock.state(), None);
}

fn run_in_thread<T: Send>(f: impl FnOnce() -> T + Send) -> T {
    thread::scope(|s| s.spawn(|| f()).join().unwrap())
}

#[test]
fn default() {
    let lock = DocumentLock::default();
    assert_default(&lock);
}

#[test]
fn clones_share_the_primitive() {
    let lock1 = DocumentLock::default();
    let lock2 = lock1.clone();
    let lock3 = DocumentLock::default();
    assert_eq!(lock1, lock2);
    assert_ne!(lock1, lock3);
    let _guard = lock1.write();
    assert!(lock2.is_locked_exclusive());
    assert!(!lock3.is_locked());
}

#[test]
fn write() {
    let lock = DocumentLock::default();
    let guard = lock.write();
    assert_eq!(lock.shared.writer.load(Relaxed), execution_unit_id());
    assert_eq!(lock.state(), Some(LockMode::Exclusive));
    run_in_thread(|| {
        assert!(lock.try_write().is_none());
        assert!(lock.try_read().is_none());
        assert!(!lock.is_write_locked_by_current_thread());
    });
    drop(guard);
    assert_default(&lock);
    run_in_thread(|| {
        assert!(lock.try_write().is_some());
    });
}

#[test]
fn read() {
    let lock = DocumentLock::default();
    let guard1 = lock.read();
    let guard2 = lock.read();
    assert_eq!(lock.state(), Some(LockMode::Shared));
    assert_eq!(lock.shared.writer.load(Relaxed), 0);
    run_in_thread(|| {
        assert!(lock.try_read().is_some());
        assert!(lock.try_write().is_none());
    });
    drop(guard1);
    run_in_thread(|| {
        assert!(lock.try_write().is_none());
    });
    drop(guard2);
    assert_default(&lock);
}

#[test]
#[should_panic(expected = "already held exclusively by the current thread")]
fn write_reentrant_panics() {
    let lock = DocumentLock::default();
    let _guard = lock.write();
    let _second = lock.write();
}

#[test]
#[should_panic(expected = "already held exclusively by the current thread")]
fn read_inside_write_panics() {
    let lock = DocumentLock::default();
    let _guard = lock.write();
    let _second = lock.read();
}

#[test]
fn try_write_for() {
    let lock = DocumentLock::default();
    let duration = Duration::from_millis(100);
    assert!(lock.try_write_for(duration).is_some());
    let guard = lock.read();
    run_in_thread(|| {
        let start = Instant::now();
        assert!(lock.try_write_for(duration).is_none());
        assert!(start.elapsed() >= duration);
        assert!(lock.try_read_for(duration).is_some());
    });
    drop(guard);
    run_in_thread(|| {
        assert!(lock.try_write_for(duration).is_some());
    });
}

#[test]
fn try_write_until() {
    let lock = DocumentLock::default();
    let duration = Duration::from_millis(100);
    let guard = lock.write();
    run_in_thread(|| {
        let start = Instant::now();
        assert!(lock.try_write_until(start + duration).is_none());
        assert!(lock.try_read_until(Instant::now() + duration).is_none());
        assert!(start.elapsed() >= duration * 2);
    });
    drop(guard);
    assert!(lock.try_write_until(Instant::now() + duration).is_some());
    assert!(lock.try_read_until(Instant::now() + duration).is_some());
}

fn unlock_test(mut unlocker: impl FnMut(crate::WriteGuard<'_>)) {
    let lock = DocumentLock::default();
    let guard = lock.write();
    run_in_thread(|| {
        assert!(lock.try_read().is_none());
    });
    unlocker(guard);
    assert_default(&lock);
    run_in_thread(|| {
        assert!(lock.try_write().is_some());
    });
}

#[test]
fn drop_guard() {
    unlock_test(|guard| drop(guard));
}

#[test]
fn unlock_fair() {
    unlock_test(|guard| guard.unlock_fair());
}

#[test]
fn read_unlock_fair() {
    let lock = DocumentLock::default();
    lock.read().unlock_fair();
    assert_default(&lock);
}

#[test]
fn released_while_unwinding() {
    let lock = DocumentLock::default();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _guard = lock.write();
        panic!("delegate failed");
    }));
    assert!(result.is_err());
    assert_default(&lock);
}

#[test]
fn write_with_default_policy() {
    let lock = DocumentLock::default();
    let guard = lock.write_with(&AcquirePolicy::default()).unwrap();
    assert!(lock.is_write_locked_by_current_thread());
    drop(guard);
    assert_default(&lock);
}

#[test]
fn write_with_reentrant() {
    let lock = DocumentLock::default();
    let _guard = lock.write();
    let policy = AcquirePolicy::default();
    assert!(matches!(
        lock.write_with(&policy),
        Err(Error::Reentrant {
            mode: LockMode::Exclusive
        }),
    ));
    assert!(matches!(
        lock.read_with(&policy),
        Err(Error::Reentrant {
            mode: LockMode::Shared
        }),
    ));
}

#[test]
fn write_with_timeout() {
    let lock = DocumentLock::default();
    let timeout = Duration::from_millis(50);
    let policy = AcquirePolicy::default().with_timeout(timeout);
    let _guard = lock.read();
    run_in_thread(|| match lock.write_with(&policy) {
        Err(Error::Timeout { mode, waited }) => {
            assert_eq!(mode, LockMode::Exclusive);
            assert!(waited >= timeout);
        }
        other => panic!("expected a timeout, got {other:?}"),
    });
    // Readers are still admitted.
    run_in_thread(|| {
        assert!(lock.read_with(&policy).is_ok());
    });
}

#[test]
fn read_with_timeout() {
    let lock = DocumentLock::default();
    let policy = AcquirePolicy::default().with_timeout(Duration::from_millis(20));
    let _guard = lock.write();
    run_in_thread(|| {
        assert!(matches!(
            lock.read_with(&policy),
            Err(Error::Timeout {
                mode: LockMode::Shared,
                ..
            }),
        ));
    });
}

#[test]
fn cancelled_before_waiting() {
    let lock = DocumentLock::default();
    let token = CancellationToken::new();
    token.cancel();
    let policy = AcquirePolicy::default().with_cancel_token(token);
    // Even a free lock is not taken once the token fired.
    assert!(matches!(
        lock.write_with(&policy),
        Err(Error::Cancelled { .. })
    ));
    assert_default(&lock);
}

#[test]
fn cancelled_while_waiting() {
    let lock = DocumentLock::default();
    let token = CancellationToken::new();
    let policy = AcquirePolicy::default()
        .with_cancel_token(token.clone())
        .with_poll_interval(Duration::from_millis(5));
    let barrier = Barrier::new(2);
    let guard = lock.write();
    thread::scope(|s| {
        let waiter = s.spawn(|| {
            barrier.wait();
            lock.write_with(&policy).map(mem::forget)
        });
        barrier.wait();
        thread::sleep(Duration::from_millis(30));
        token.cancel();
        let result = waiter.join().unwrap();
        assert!(matches!(
            result,
            Err(Error::Cancelled {
                mode: LockMode::Exclusive
            })
        ));
    });
    drop(guard);
    assert_default(&lock);
}

#[test]
fn cancel_token_with_timeout() {
    let lock = DocumentLock::default();
    let policy = AcquirePolicy::default()
        .with_cancel_token(CancellationToken::new())
        .with_timeout(Duration::from_millis(30))
        .with_poll_interval(Duration::from_millis(5));
    let _guard = lock.read();
    run_in_thread(|| {
        assert!(matches!(
            lock.write_with(&policy),
            Err(Error::Timeout { .. })
        ));
    });
}

#[test]
fn cancel_token_acquires_when_free() {
    let lock = DocumentLock::default();
    let policy = AcquirePolicy::default().with_cancel_token(CancellationToken::new());
    let barrier = Barrier::new(2);
    thread::scope(|s| {
        let holder = s.spawn(|| {
            let _guard = lock.write();
            barrier.wait();
            thread::sleep(Duration::from_millis(30));
        });
        barrier.wait();
        let guard = lock.write_with(&policy).unwrap();
        assert!(lock.is_write_locked_by_current_thread());
        drop(guard);
        holder.join().unwrap();
    });
    assert_default(&lock);
}

#[test]
fn is_write_locked_by_current_thread() {
    let lock = DocumentLock::default();
    assert!(!lock.is_write_locked_by_current_thread());
    let barrier1 = Barrier::new(2);
    let barrier2 = Barrier::new(2);
    thread::scope(|s| {
        let handle = s.spawn(|| {
            let _guard = lock.write();
            assert!(lock.is_write_locked_by_current_thread());
            barrier1.wait();
            barrier2.wait();
        });
        barrier1.wait();
        assert!(lock.is_locked_exclusive());
        assert!(!lock.is_write_locked_by_current_thread());
        barrier2.wait();
        handle.join().unwrap();
    });
    assert_default(&lock);
}

#[test]
fn debug() {
    let lock = DocumentLock::default();
    assert!(format!("{lock:?}").contains("state: None"));
    let guard = lock.write();
    assert!(format!("{lock:?}").contains("Exclusive"));
    assert!(format!("{guard:?}").starts_with("WriteGuard"));
}

#[test]
fn nested_read_while_writer_waits() {
    let lock = DocumentLock::default();
    let policy = AcquirePolicy::default().with_timeout(Duration::from_secs(5));
    thread::scope(|s| {
        let outer = lock.read();
        let writer = s.spawn(|| {
            let _guard = lock.write();
        });
        thread::sleep(Duration::from_millis(50));
        let inner = lock.read_with(&policy).unwrap();
        assert!(lock.try_read().is_some());
        assert_eq!(lock.state(), Some(LockMode::Shared));
        drop(inner);
        drop(outer);
        writer.join().unwrap();
    });
    assert_default(&lock);
}
