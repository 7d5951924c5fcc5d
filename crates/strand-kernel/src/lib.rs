//! The thread ABI strand is built on.
//!
//! The library above this crate sees exactly four thread primitives plus
//! bookkeeping: create a thread, yield, deschedule on a flag, and make a
//! thread runnable by id. [`HostKernel`] provides them on native threads.

pub mod error;
pub mod thread;
pub mod types;

pub use error::KernelError;
pub use thread::HostKernel;
pub use types::{KernelConfig, ThreadHandle};

use core::sync::atomic::AtomicU32;

/// Entry point of a kernel-created thread.
pub type ThreadEntry = Box<dyn FnOnce() + Send + 'static>;

pub trait Kernel: Send + Sync {
    /// Start a new schedulable thread running `entry` on a stack of at least
    /// `stack_size` bytes. On failure no thread exists.
    fn thread_create(&self, stack_size: usize, entry: ThreadEntry)
        -> Result<ThreadHandle, KernelError>;

    /// Id of the calling thread.
    fn gettid(&self) -> ThreadHandle;

    /// Give up the CPU, optionally hinting which thread should run next.
    fn yield_to(&self, target: Option<ThreadHandle>) -> Result<(), KernelError>;

    /// Block the caller unless `*flag` is non-zero.
    ///
    /// The check and the transition to blocked are atomic with respect to
    /// [`make_runnable`](Kernel::make_runnable): a waker that stores a
    /// non-zero flag before calling `make_runnable` can never be missed.
    /// Returns once some thread has made the caller runnable again.
    fn deschedule(&self, flag: &AtomicU32);

    /// Make a descheduled thread runnable.
    fn make_runnable(&self, target: ThreadHandle) -> Result<(), KernelError>;

    /// Record the exit status reported when the task ends.
    fn set_status(&self, status: i32);

    /// Terminate the calling thread.
    fn vanish(&self) -> !;

    /// Allocation granularity for thread stacks.
    fn page_size(&self) -> usize;
}
