//! Ticket mutex.
//!
//! A locker takes a ticket by atomic increment and yields the CPU until the
//! "now serving" counter reaches it, so the lock is granted strictly in
//! arrival order. Unlocking advances "now serving" by one.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use strand_kernel::Kernel;

pub struct Mutex {
    kernel: Arc<dyn Kernel>,
    next_ticket: AtomicU32,
    now_serving: AtomicU32,
    locked: AtomicBool,
}

impl Mutex {
    pub fn new(kernel: Arc<dyn Kernel>) -> Self {
        Self {
            kernel,
            next_ticket: AtomicU32::new(0),
            now_serving: AtomicU32::new(0),
            locked: AtomicBool::new(false),
        }
    }

    pub fn lock(&self) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::AcqRel);
        while self.now_serving.load(Ordering::Acquire) != ticket {
            // yield(-1) never fails.
            let _ = self.kernel.yield_to(None);
        }
        self.locked.store(true, Ordering::Relaxed);
    }

    /// Release the lock. Aborts the process if the mutex is not locked.
    pub fn unlock(&self) {
        if !self.locked.swap(false, Ordering::Relaxed) {
            fatal!("unlock of an unlocked mutex");
        }
        self.now_serving.fetch_add(1, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Tickets handed out and not yet served: the holder plus everyone
    /// waiting behind it.
    pub fn queue_depth(&self) -> u32 {
        let next = self.next_ticket.load(Ordering::Acquire);
        next.wrapping_sub(self.now_serving.load(Ordering::Acquire))
    }

    /// Tear the mutex down. Aborts if it is held or awaited.
    pub fn destroy(self) {
        if self.is_locked() || self.queue_depth() != 0 {
            fatal!("destroy of a mutex that is held or awaited");
        }
    }

    pub(crate) fn kernel(&self) -> &Arc<dyn Kernel> {
        &self.kernel
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &self.is_locked())
            .field("queue_depth", &self.queue_depth())
            .finish()
    }
}
