use crate::types::ThreadHandle;
use crossbeam_utils::sync::{Parker, Unparker};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Runnable,
    Blocked,
    Terminated,
}

/// Kernel-side record of a thread, shared by everyone who may wake it.
pub struct ThreadControlBlock {
    pub handle: ThreadHandle,
    /// Created by `thread_create`, as opposed to adopted on first contact.
    pub spawned: bool,
    state: Mutex<ThreadState>,
    unparker: Unparker,
}

impl ThreadControlBlock {
    pub fn new(handle: ThreadHandle, spawned: bool, parker: &Parker) -> Self {
        Self {
            handle,
            spawned,
            state: Mutex::new(ThreadState::Runnable),
            unparker: parker.unparker().clone(),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, ThreadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn unpark(&self) {
        self.unparker.unpark();
    }
}

/// The owning thread's half of a record: the parker only it may block on.
pub struct LocalThread {
    pub handle: ThreadHandle,
    pub spawned: bool,
    pub parker: Parker,
}
