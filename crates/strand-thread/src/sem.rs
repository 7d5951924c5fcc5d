use crate::cond::CondVar;
use crate::protected::Protected;
use std::sync::Arc;
use strand_kernel::Kernel;

struct Count {
    count: i32,
    waiting: u32,
}

/// Counting semaphore built from a [`Protected`] count and a [`CondVar`].
pub struct Semaphore {
    state: Protected<Count>,
    non_negative: CondVar,
}

impl Semaphore {
    pub fn new(kernel: Arc<dyn Kernel>, count: i32) -> Self {
        Self {
            state: Protected::new(kernel.clone(), Count { count, waiting: 0 }),
            non_negative: CondVar::new(kernel),
        }
    }

    /// Take one unit, blocking while the count is not positive.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while state.count <= 0 {
            state.waiting += 1;
            self.non_negative.wait_guarded(&mut state);
            state.waiting -= 1;
        }
        state.count -= 1;
    }

    /// Return one unit and wake at most one waiter.
    pub fn signal(&self) {
        let mut state = self.state.lock();
        state.count += 1;
        if state.waiting > 0 {
            self.non_negative.signal();
        }
    }

    pub fn count(&self) -> i32 {
        self.state.lock().count
    }

    /// Threads blocked in [`wait`](Self::wait).
    pub fn waiters(&self) -> u32 {
        self.state.lock().waiting
    }

    /// Tear the semaphore down. Aborts if anyone is still waiting.
    pub fn destroy(self) {
        let state = self.state.into_inner();
        if state.waiting != 0 {
            fatal!("destroy of a semaphore with {} waiters", state.waiting);
        }
        self.non_negative.destroy();
    }
}
