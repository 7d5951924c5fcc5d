//! Condition variable.
//!
//! A waiter moves AWAKE -> ENQUEUED -> BLOCKED -> AWAKE. The record is
//! queued and the caller's mutex dropped before the waiter deschedules, so a
//! signal that runs anywhere between "decide to sleep" and "sleep" finds the
//! record and sets its flag, and the deschedule returns at once.

use crate::mutex::Mutex;
use crate::protected::{Protected, ProtectedGuard};
use crate::queue::WaitQueue;
use crate::waiter::{WaitKind, Waiter};
use log::trace;
use std::sync::Arc;
use strand_kernel::Kernel;

pub struct CondVar {
    queue: Protected<WaitQueue<Arc<Waiter>>>,
}

impl CondVar {
    pub fn new(kernel: Arc<dyn Kernel>) -> Self {
        Self {
            queue: Protected::new(kernel, WaitQueue::new()),
        }
    }

    fn kernel(&self) -> &dyn Kernel {
        &**self.queue.kernel()
    }

    /// Atomically release `mutex` and sleep until signaled, then reacquire
    /// `mutex`. The caller must hold `mutex`.
    pub fn wait(&self, mutex: &Mutex) {
        let me = Waiter::new(self.kernel().gettid(), WaitKind::Signal);

        let mut queue = self.queue.lock();
        queue.insert_tail(me.clone());
        mutex.unlock();
        drop(queue);

        me.block(self.kernel());
        mutex.lock();
    }

    /// [`wait`](Self::wait) on the mutex behind a [`Protected`] guard.
    pub fn wait_guarded<T>(&self, guard: &mut ProtectedGuard<'_, T>) {
        self.wait(guard.mutex());
    }

    /// Wake the longest-waiting thread, if any.
    pub fn signal(&self) {
        let waiter = self.queue.lock().remove_head();
        if let Some(waiter) = waiter {
            trace!("signal: waking thread {}", waiter.tid);
            waiter.wake(self.kernel());
        }
    }

    /// Wake every waiting thread.
    pub fn broadcast(&self) {
        let waiters: Vec<_> = self.queue.lock().drain().collect();
        trace!("broadcast: waking {} threads", waiters.len());
        for waiter in waiters {
            waiter.wake(self.kernel());
        }
    }

    pub fn waiters(&self) -> usize {
        self.queue.lock().len()
    }

    /// Tear the condition variable down. Aborts if anyone is still waiting.
    pub fn destroy(self) {
        let queue = self.queue.into_inner();
        if !queue.is_empty() {
            fatal!("destroy of a condition variable with {} waiters", queue.len());
        }
    }
}
