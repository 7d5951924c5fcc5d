use log::trace;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use strand_kernel::{Kernel, ThreadHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitKind {
    Signal,
    Read,
    Write,
}

/// Record of one blocked thread, shared between the waiter and the queue it
/// sits in.
#[derive(Debug)]
pub(crate) struct Waiter {
    pub tid: ThreadHandle,
    pub kind: WaitKind,
    wakeup: AtomicU32,
}

impl Waiter {
    pub fn new(tid: ThreadHandle, kind: WaitKind) -> Arc<Self> {
        Arc::new(Self {
            tid,
            kind,
            wakeup: AtomicU32::new(0),
        })
    }

    /// Sleep until [`wake`](Self::wake) has been called on this record.
    ///
    /// The record must already be visible to wakers and every lock they need
    /// must already be released.
    pub fn block(&self, kernel: &dyn Kernel) {
        trace!("thread {} blocking ({:?})", self.tid, self.kind);
        // A make_runnable aimed at an earlier wait can land here; only the
        // flag says this wait is over.
        while self.wakeup.load(Ordering::SeqCst) == 0 {
            kernel.deschedule(&self.wakeup);
        }
    }

    pub fn wake(&self, kernel: &dyn Kernel) {
        self.wakeup.store(1, Ordering::SeqCst);
        if let Err(e) = kernel.make_runnable(self.tid) {
            // Not descheduled yet: it will see the flag instead.
            trace!("wake of thread {}: {}", self.tid, e);
        }
    }
}
