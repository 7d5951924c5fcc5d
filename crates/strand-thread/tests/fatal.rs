//! Misuse that the library treats as fatal. Each case re-runs this test
//! binary with the case named in `STRAND_FATAL_CASE`; the child performs the
//! misuse and must die with the library's fatal message.

mod common;

use common::{setup, wait_until};
use std::env;
use std::panic::{self, AssertUnwindSafe};
use std::process::{self, Command};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use strand_thread::{RwLockKind, ThreadLibrary};

const CASE_ENV: &str = "STRAND_FATAL_CASE";

fn expect_fatal(name: &str, message: &str, case: impl FnOnce(&ThreadLibrary)) {
    if env::var(CASE_ENV).as_deref() == Ok(name) {
        let lib = setup();
        case(&lib);
        // Still alive: the misuse went unnoticed.
        process::exit(0);
    }

    let output = Command::new(env::current_exe().unwrap())
        .args([name, "--exact", "--nocapture", "--test-threads=1"])
        .env(CASE_ENV, name)
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "{} survived:\n{}", name, stderr);
    assert!(stderr.contains("strand: fatal:"), "{} died without a fatal report:\n{}", name, stderr);
    assert!(stderr.contains(message), "{} reported something else:\n{}", name, stderr);
}

/// Move a leaked value back out so it can be destroyed while threads that
/// borrowed it are still blocked on it.
///
/// # Safety
/// Nobody may touch `leaked` again; the blocked borrowers never wake
/// because the destroy aborts the process.
unsafe fn reclaim<T>(leaked: &'static T) -> T {
    std::ptr::read(leaked)
}

#[test]
fn unlock_of_an_unlocked_mutex() {
    expect_fatal("unlock_of_an_unlocked_mutex", "unlock of an unlocked mutex", |lib| {
        lib.mutex().unlock();
    });
}

#[test]
fn destroy_of_a_held_mutex() {
    expect_fatal("destroy_of_a_held_mutex", "destroy of a mutex", |lib| {
        let mutex = lib.mutex();
        mutex.lock();
        mutex.destroy();
    });
}

#[test]
fn destroy_of_a_mutex_with_a_queued_locker() {
    expect_fatal("destroy_of_a_mutex_with_a_queued_locker", "destroy of a mutex", |lib| {
        let mutex: &'static _ = Box::leak(Box::new(lib.mutex()));
        mutex.lock();
        lib.create(
            move |_| {
                mutex.lock();
                0
            },
            0,
        )
        .unwrap();
        wait_until(lib, || mutex.queue_depth() == 2);
        // SAFETY: the queued locker is stuck behind our own hold.
        unsafe { reclaim(mutex) }.destroy();
    });
}

#[test]
fn destroy_of_a_cond_with_waiters() {
    expect_fatal("destroy_of_a_cond_with_waiters", "destroy of a condition variable", |lib| {
        let mutex: &'static _ = Box::leak(Box::new(lib.mutex()));
        let cond: &'static _ = Box::leak(Box::new(lib.cond()));
        lib.create(
            move |_| {
                mutex.lock();
                cond.wait(mutex);
                mutex.unlock();
                0
            },
            0,
        )
        .unwrap();
        wait_until(lib, || cond.waiters() == 1);
        // SAFETY: the only other user is blocked in `wait`.
        unsafe { reclaim(cond) }.destroy();
    });
}

#[test]
fn destroy_of_a_semaphore_with_waiters() {
    expect_fatal("destroy_of_a_semaphore_with_waiters", "destroy of a semaphore", |lib| {
        let sem: &'static _ = Box::leak(Box::new(lib.semaphore(0)));
        lib.create(
            move |_| {
                sem.wait();
                0
            },
            0,
        )
        .unwrap();
        wait_until(lib, || sem.waiters() == 1);
        // SAFETY: the only other user is blocked in `wait`.
        unsafe { reclaim(sem) }.destroy();
    });
}

#[test]
fn destroy_of_a_held_rwlock() {
    expect_fatal("destroy_of_a_held_rwlock", "destroy of a rwlock in use", |lib| {
        let lock = lib.rwlock();
        lock.lock(RwLockKind::Read);
        lock.destroy();
    });
}

#[test]
fn unlock_of_a_free_rwlock() {
    expect_fatal("unlock_of_a_free_rwlock", "unlock of a free rwlock", |lib| {
        lib.rwlock().unlock();
    });
}

#[test]
fn rwlock_unlock_by_a_non_writer() {
    expect_fatal("rwlock_unlock_by_a_non_writer", "unlocked a rwlock written by", |lib| {
        let lock = Arc::new(lib.rwlock());
        lock.lock(RwLockKind::Write);
        let l = lock.clone();
        let tid = lib
            .create(
                move |_| {
                    l.unlock();
                    0
                },
                0,
            )
            .unwrap();
        let _ = lib.join(tid);
    });
}

#[test]
fn downgrade_without_exclusive_hold() {
    expect_fatal("downgrade_without_exclusive_hold", "does not hold the rwlock exclusively", |lib| {
        let lock = lib.rwlock();
        lock.lock(RwLockKind::Read);
        lock.downgrade();
    });
}

#[test]
fn exit_from_a_foreign_thread() {
    expect_fatal("exit_from_a_foreign_thread", "has no control block", |lib| {
        let lib = lib.clone();
        let _ = thread::spawn(move || lib.exit(0)).join();
    });
}

#[test]
fn body_carrying_on_after_exit() {
    expect_fatal("body_carrying_on_after_exit", "returned after calling exit", |lib| {
        let l = lib.clone();
        let tid = lib
            .create(
                move |_| {
                    let _ = panic::catch_unwind(AssertUnwindSafe(|| l.exit(1)));
                    2
                },
                0,
            )
            .unwrap();
        // The exit value is published before the body resumes, so the join
        // can return before the abort lands.
        assert_eq!(lib.join(tid).unwrap(), 1);
        thread::sleep(Duration::from_secs(10));
    });
}

#[test]
fn panic_in_a_thread_body() {
    expect_fatal("panic_in_a_thread_body", "panicked", |lib| {
        let tid = lib.create(|_| panic!("boom"), 0).unwrap();
        let _ = lib.join(tid);
    });
}
