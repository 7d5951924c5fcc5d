mod common;

use common::{setup, wait_until};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strand_thread::{ThreadError, ThreadHandle, ThreadLibrary};

const SENTINEL: usize = 0xfeed;

#[test]
fn explicit_exit_round_trip() {
    let lib = setup();
    let l = lib.clone();
    let tid = lib.create(move |x| l.exit(x), SENTINEL).unwrap();
    assert_eq!(lib.join(tid).unwrap(), SENTINEL);
}

#[test]
fn fall_through_round_trip() {
    let lib = setup();
    let tid = lib.create(|x| x, SENTINEL).unwrap();
    assert_eq!(lib.join(tid).unwrap(), SENTINEL);
}

fn deep_exit(lib: &ThreadLibrary, depth: usize, value: usize) -> usize {
    if depth == 0 {
        lib.exit(value)
    }
    deep_exit(lib, depth - 1, value) + 1
}

#[test]
fn exit_from_deep_in_the_stack() {
    let lib = setup();
    let l = lib.clone();
    let tid = lib.create(move |x| deep_exit(&l, 16, x), SENTINEL).unwrap();
    assert_eq!(lib.join(tid).unwrap(), SENTINEL);
}

#[test]
fn join_before_and_after_exit() {
    let lib = setup();

    // Exits before anyone joins.
    let early = lib.create(|_| 1, 0).unwrap();
    // Still running when joined.
    let gate = Arc::new(lib.semaphore(0));
    let g = gate.clone();
    let late = lib
        .create(
            move |_| {
                g.wait();
                2
            },
            0,
        )
        .unwrap();
    let g = gate.clone();
    let l = lib.clone();
    let opener = lib
        .create(
            move |_| {
                for _ in 0..100 {
                    l.yield_to(None).unwrap();
                }
                g.signal();
                0
            },
            0,
        )
        .unwrap();

    assert_eq!(lib.join(late).unwrap(), 2);
    assert_eq!(lib.join(early).unwrap(), 1);
    assert_eq!(lib.join(opener).unwrap(), 0);
    assert_eq!(lib.thread_count().unwrap(), 1);
}

#[test]
fn join_is_exactly_once() {
    let lib = setup();
    let gate = Arc::new(lib.semaphore(0));
    let g = gate.clone();
    let target = lib
        .create(
            move |_| {
                g.wait();
                7
            },
            0,
        )
        .unwrap();

    let refused = Arc::new(AtomicUsize::new(0));
    let joiners: Vec<_> = (0..2)
        .map(|_| {
            let l = lib.clone();
            let r = refused.clone();
            lib.create(
                move |tid| {
                    let tid = ThreadHandle::new(tid as u32).unwrap();
                    match l.join(tid) {
                        Ok(value) => value,
                        Err(e @ ThreadError::AlreadyJoined(_)) => {
                            assert_eq!(e.code(), -1);
                            r.fetch_add(1, Ordering::SeqCst);
                            1000
                        }
                        Err(e) => panic!("unexpected join error: {e}"),
                    }
                },
                target.val() as usize,
            )
            .unwrap()
        })
        .collect();

    // One joiner has been turned away, so the other holds the claim.
    wait_until(&lib, || refused.load(Ordering::SeqCst) == 1);
    gate.signal();

    let mut results: Vec<_> = joiners.into_iter().map(|j| lib.join(j).unwrap()).collect();
    results.sort_unstable();
    assert_eq!(results, vec![7, 1000]);

    let err = lib.join(target).unwrap_err();
    assert!(matches!(err, ThreadError::NoSuchThread(_)));
    assert_eq!(lib.thread_count().unwrap(), 1);
}

#[test]
fn many_threads_round_trip() {
    let lib = setup();
    let tids: Vec<_> = (0..32).map(|i| lib.create(|x| x * x, i).unwrap()).collect();
    assert_eq!(lib.thread_count().unwrap(), 33);

    for (i, tid) in tids.into_iter().enumerate().rev() {
        assert_eq!(lib.join(tid).unwrap(), i * i);
    }
    assert_eq!(lib.thread_count().unwrap(), 1);
}

#[test]
fn child_joins_grandchild() {
    let lib = setup();
    let l = lib.clone();
    let child = lib
        .create(
            move |x| {
                let grandchild = l.create(|y| y + 1, x).unwrap();
                l.join(grandchild).unwrap() + 1
            },
            40,
        )
        .unwrap();
    assert_eq!(lib.join(child).unwrap(), 42);
}

#[test]
fn getid_matches_create_result() {
    let lib = setup();
    let l = lib.clone();
    let tid = lib.create(move |_| l.getid().val() as usize, 0).unwrap();
    assert_eq!(lib.join(tid).unwrap(), tid.val() as usize);
    assert_eq!(lib.root().unwrap(), lib.getid());
}

#[test]
fn yield_to_unknown_thread_fails() {
    let lib = setup();
    let ghost = ThreadHandle::new(0xdead).unwrap();
    assert!(matches!(lib.yield_to(Some(ghost)), Err(ThreadError::Kernel(_))));

    let tid = lib.create(|_| 0, 0).unwrap();
    lib.join(tid).unwrap();
    lib.yield_to(None).unwrap();
}
