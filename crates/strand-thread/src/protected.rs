use crate::mutex::Mutex;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use strand_kernel::Kernel;

/// Data reachable only while its ticket [`Mutex`] is held.
pub struct Protected<T> {
    mutex: Mutex,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by `mutex`.
unsafe impl<T: Send> Sync for Protected<T> {}

impl<T> Protected<T> {
    pub fn new(kernel: Arc<dyn Kernel>, data: T) -> Self {
        Self {
            mutex: Mutex::new(kernel),
            data: UnsafeCell::new(data),
        }
    }

    pub fn lock(&self) -> ProtectedGuard<'_, T> {
        self.mutex.lock();
        ProtectedGuard { lock: self }
    }

    pub(crate) fn kernel(&self) -> &Arc<dyn Kernel> {
        self.mutex.kernel()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

pub struct ProtectedGuard<'a, T> {
    lock: &'a Protected<T>,
}

impl<'a, T> ProtectedGuard<'a, T> {
    pub(crate) fn mutex(&self) -> &'a Mutex {
        &self.lock.mutex
    }
}

impl<'a, T> Deref for ProtectedGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: the guard holds the mutex.
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for ProtectedGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the mutex.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for ProtectedGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.mutex.unlock();
    }
}
