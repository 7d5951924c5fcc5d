//! User-level thread library over the [`strand_kernel::Kernel`] ABI.
//!
//! The kernel offers only create, yield, deschedule-on-a-flag and
//! make-runnable. Everything else lives here: thread lifecycle (create,
//! exit, join), a ticket [`Mutex`], [`CondVar`], [`Semaphore`] and a fair
//! [`RwLock`]. All blocking goes through one wakeup protocol: a waiter is
//! queued and every lock a waker needs is released before the waiter
//! deschedules, and a waker sets the waiter's flag before making it
//! runnable.

/// Report a broken invariant and abort the process without unwinding.
macro_rules! fatal {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        log::error!("fatal: {}", msg);
        eprintln!("strand: fatal: {}", msg);
        std::process::abort()
    }};
}

pub mod cond;
pub mod error;
pub mod mutex;
pub mod protected;
pub mod queue;
pub mod rwlock;
pub mod sem;
pub mod thread;
mod waiter;

pub use cond::CondVar;
pub use error::ThreadError;
pub use mutex::Mutex;
pub use protected::{Protected, ProtectedGuard};
pub use queue::WaitQueue;
pub use rwlock::{RwLock, RwLockKind, RwLockState};
pub use sem::Semaphore;
pub use thread::ThreadLibrary;

pub use strand_kernel::{HostKernel, Kernel, ThreadHandle};
