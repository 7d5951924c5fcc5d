//! Fair reader/writer lock.
//!
//! Readers and writers share one FIFO queue. A newcomer queues whenever the
//! queue is non-empty, so nobody overtakes an earlier arrival. When the lock
//! is handed on, the head is granted: a writer alone, or a reader together
//! with every reader directly behind it, stopping at the first writer. The
//! releasing thread updates `holder` on behalf of the threads it wakes, so a
//! woken thread owns the lock the moment it runs.

use crate::protected::Protected;
use crate::queue::WaitQueue;
use crate::waiter::{WaitKind, Waiter};
use log::trace;
use std::sync::Arc;
use strand_kernel::{Kernel, ThreadHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RwLockKind {
    Read,
    Write,
}

/// Who holds the lock right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RwLockState {
    Free,
    Shared(u32),
    Exclusive(ThreadHandle),
}

struct RwInner {
    /// 0 free, > 0 reader count, < 0 negated id of the writer.
    holder: i64,
    queue: WaitQueue<Arc<Waiter>>,
}

impl RwInner {
    /// Grant the head of the queue: one writer, or a run of readers.
    fn admit(&mut self, woken: &mut Vec<Arc<Waiter>>) {
        let Some(head) = self.queue.remove_head() else {
            return;
        };
        if head.kind == WaitKind::Write {
            self.holder = -i64::from(head.tid.val());
            woken.push(head);
            return;
        }
        self.holder += 1;
        woken.push(head);
        self.admit_readers(woken);
    }

    /// Grant every reader at the front of the queue.
    fn admit_readers(&mut self, woken: &mut Vec<Arc<Waiter>>) {
        while let Some(reader) = self.queue.remove_head_if(|w| w.kind == WaitKind::Read) {
            self.holder += 1;
            woken.push(reader);
        }
    }
}

pub struct RwLock {
    state: Protected<RwInner>,
}

impl RwLock {
    pub fn new(kernel: Arc<dyn Kernel>) -> Self {
        Self {
            state: Protected::new(
                kernel,
                RwInner {
                    holder: 0,
                    queue: WaitQueue::new(),
                },
            ),
        }
    }

    fn kernel(&self) -> &dyn Kernel {
        &**self.state.kernel()
    }

    pub fn lock(&self, kind: RwLockKind) {
        let me = self.kernel().gettid();
        let mut state = self.state.lock();

        if state.queue.is_empty() {
            match kind {
                RwLockKind::Read if state.holder >= 0 => {
                    state.holder += 1;
                    return;
                }
                RwLockKind::Write if state.holder == 0 => {
                    state.holder = -i64::from(me.val());
                    return;
                }
                _ => {}
            }
        }

        let kind = match kind {
            RwLockKind::Read => WaitKind::Read,
            RwLockKind::Write => WaitKind::Write,
        };
        let waiter = Waiter::new(me, kind);
        state.queue.insert_tail(waiter.clone());
        drop(state);

        waiter.block(self.kernel());
        trace!("thread {} admitted to rwlock ({:?})", me, kind);
    }

    pub fn unlock(&self) {
        let me = self.kernel().gettid();
        let mut woken = Vec::new();
        let mut state = self.state.lock();

        let holder = state.holder;
        match holder {
            0 => fatal!("unlock of a free rwlock by thread {}", me),
            h if h < 0 => {
                if h != -i64::from(me.val()) {
                    fatal!("thread {} unlocked a rwlock written by {}", me, -h);
                }
                state.holder = 0;
                state.admit(&mut woken);
            }
            h if h > 1 => state.holder -= 1,
            _ => {
                state.holder = 0;
                if let Some(next) = state.queue.remove_head() {
                    // Readers only queue while a writer is ahead of them.
                    if next.kind != WaitKind::Write {
                        fatal!("reader {} queued behind readers only", next.tid);
                    }
                    state.holder = -i64::from(next.tid.val());
                    woken.push(next);
                }
            }
        }
        drop(state);

        for waiter in woken {
            waiter.wake(self.kernel());
        }
    }

    /// Turn the caller's exclusive hold into a shared one, letting in the
    /// readers at the front of the queue. Nobody else can take the lock
    /// exclusively in between.
    pub fn downgrade(&self) {
        let me = self.kernel().gettid();
        let mut woken = Vec::new();
        let mut state = self.state.lock();

        if state.holder != -i64::from(me.val()) {
            fatal!("downgrade by thread {} which does not hold the rwlock exclusively", me);
        }
        state.holder = 1;
        state.admit_readers(&mut woken);
        drop(state);

        for waiter in woken {
            waiter.wake(self.kernel());
        }
    }

    pub fn state(&self) -> RwLockState {
        let holder = self.state.lock().holder;
        match holder {
            0 => RwLockState::Free,
            h if h > 0 => RwLockState::Shared(h as u32),
            h => match ThreadHandle::new((-h) as u32) {
                Some(tid) => RwLockState::Exclusive(tid),
                None => fatal!("corrupt rwlock holder {}", h),
            },
        }
    }

    /// Threads queued for the lock.
    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Tear the lock down. Aborts if it is held or awaited.
    pub fn destroy(self) {
        let state = self.state.into_inner();
        if state.holder != 0 || !state.queue.is_empty() {
            fatal!(
                "destroy of a rwlock in use (holder {}, {} queued)",
                state.holder,
                state.queue.len()
            );
        }
    }
}
