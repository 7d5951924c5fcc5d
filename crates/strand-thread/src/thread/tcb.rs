use crate::cond::CondVar;
use crate::protected::{Protected, ProtectedGuard};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use strand_kernel::{Kernel, ThreadHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThreadStatus {
    Running,
    Exited,
}

/// Fields of a [`Tcb`] that only change under the registry mutex.
pub(crate) struct TcbState {
    pub status: ThreadStatus,
    /// Some thread has claimed this one through `join`.
    pub joined: bool,
    pub return_value: usize,
}

/// Thread control block.
///
/// Owned by the registry from creation until a successful join removes it.
pub(crate) struct Tcb {
    /// 0 until the creator learns the kernel's id for the thread.
    tid: AtomicU32,
    /// Set once the thread is registered; the new thread sleeps on it.
    pub released: AtomicU32,
    pub stack_size: usize,
    pub exited: CondVar,
    state: UnsafeCell<TcbState>,
}

// SAFETY: `state` is only reached through `Tcb::state`, which demands the
// registry guard.
unsafe impl Sync for Tcb {}

impl Tcb {
    pub fn new(kernel: Arc<dyn Kernel>, stack_size: usize) -> Self {
        Self {
            tid: AtomicU32::new(0),
            released: AtomicU32::new(0),
            stack_size,
            exited: CondVar::new(kernel),
            state: UnsafeCell::new(TcbState {
                status: ThreadStatus::Running,
                joined: false,
                return_value: 0,
            }),
        }
    }

    pub fn tid(&self) -> Option<ThreadHandle> {
        ThreadHandle::new(self.tid.load(Ordering::Acquire))
    }

    pub fn set_tid(&self, tid: ThreadHandle) {
        self.tid.store(tid.val(), Ordering::Release);
    }

    /// Mutable view of the lifecycle fields; holding the registry guard is
    /// the proof that nobody else is looking.
    pub fn state<'a>(&'a self, _registry: &'a mut ProtectedGuard<'_, TcbList>) -> &'a mut TcbState {
        // SAFETY: every access goes through here with the registry held.
        unsafe { &mut *self.state.get() }
    }
}

/// Live and exited-but-unjoined threads, in creation order.
#[derive(Default)]
pub(crate) struct TcbList(Vec<Arc<Tcb>>);

impl TcbList {
    pub fn insert(&mut self, tcb: Arc<Tcb>) {
        self.0.push(tcb);
    }

    pub fn find(&self, tid: ThreadHandle) -> Option<Arc<Tcb>> {
        self.0.iter().find(|t| t.tid() == Some(tid)).cloned()
    }

    pub fn contains(&self, tcb: &Arc<Tcb>) -> bool {
        self.0.iter().any(|t| Arc::ptr_eq(t, tcb))
    }

    pub fn remove(&mut self, tcb: &Arc<Tcb>) {
        self.0.retain(|t| !Arc::ptr_eq(t, tcb));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Process-wide thread bookkeeping, created once by `init`.
pub(crate) struct Registry {
    pub tcbs: Protected<TcbList>,
    pub stack_size: usize,
    pub root: ThreadHandle,
}
