pub mod tcb;

use crate::error::KernelError;
use crate::types::{KernelConfig, ThreadHandle};
use crate::{Kernel, ThreadEntry};
use crossbeam_utils::sync::Parker;
use log::{debug, trace};
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use tcb::{LocalThread, ThreadControlBlock, ThreadState};

static NEXT_KERNEL_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Identity of the calling native thread, per kernel instance.
    static LOCAL: RefCell<HashMap<u64, LocalThread>> = RefCell::new(HashMap::new());
}

/// Unwind payload carrying a spawned thread out of `vanish`.
struct Vanish;

/// A [`Kernel`] whose threads are native OS threads.
///
/// Threads spawned through [`Kernel::thread_create`] run inside a wrapper
/// that catches `vanish`. Any other thread that talks to the kernel is
/// adopted on first contact, the way the process's initial thread is.
#[derive(Clone)]
pub struct HostKernel {
    inner: Arc<ThreadManager>,
}

struct ThreadManager {
    id: u64,
    config: KernelConfig,
    threads: Mutex<HashMap<ThreadHandle, Arc<ThreadControlBlock>>>,
    next_handle: AtomicU32,
    live: Mutex<usize>,
    all_vanished: Condvar,
    status: AtomicI32,
}

impl Default for HostKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl HostKernel {
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    pub fn with_config(config: KernelConfig) -> Self {
        Self {
            inner: Arc::new(ThreadManager {
                id: NEXT_KERNEL_ID.fetch_add(1, Ordering::Relaxed),
                config,
                threads: Mutex::new(HashMap::new()),
                next_handle: AtomicU32::new(1),
                live: Mutex::new(0),
                all_vanished: Condvar::new(),
                status: AtomicI32::new(0),
            }),
        }
    }

    /// Threads currently known to the kernel, adopted ones included.
    pub fn thread_count(&self) -> usize {
        self.inner.threads().len()
    }
}

impl ThreadManager {
    fn threads(&self) -> MutexGuard<'_, HashMap<ThreadHandle, Arc<ThreadControlBlock>>> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self) -> MutexGuard<'_, usize> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, handle: ThreadHandle) -> Option<Arc<ThreadControlBlock>> {
        self.threads().get(&handle).cloned()
    }

    fn allocate_handle(&self) -> ThreadHandle {
        loop {
            // Zero is never a valid id; skip it when the counter wraps.
            if let Some(handle) = ThreadHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed)) {
                return handle;
            }
        }
    }

    fn register(&self, handle: ThreadHandle, spawned: bool) -> LocalThread {
        let parker = Parker::new();
        let tcb = ThreadControlBlock::new(handle, spawned, &parker);
        self.threads().insert(handle, Arc::new(tcb));
        if spawned {
            *self.live() += 1;
        }
        LocalThread {
            handle,
            spawned,
            parker,
        }
    }

    fn retire(&self, handle: ThreadHandle) {
        let Some(tcb) = self.threads().remove(&handle) else {
            return;
        };
        *tcb.state() = ThreadState::Terminated;
        trace!("thread {} retired", handle);
        if tcb.spawned {
            let mut live = self.live();
            *live -= 1;
            if *live == 0 {
                self.all_vanished.notify_all();
            }
        }
    }

    /// Run `f` with the calling thread's identity, adopting it if needed.
    fn with_local<R>(&self, f: impl FnOnce(&LocalThread) -> R) -> R {
        LOCAL.with(|local| {
            let mut local = local.borrow_mut();
            let me = local.entry(self.id).or_insert_with(|| {
                let handle = self.allocate_handle();
                debug!(
                    "adopting native thread {:?} as thread {}",
                    thread::current().id(),
                    handle
                );
                self.register(handle, false)
            });
            f(me)
        })
    }

    fn run(self: Arc<Self>, local: LocalThread, entry: ThreadEntry) {
        let handle = local.handle;
        LOCAL.with(|l| l.borrow_mut().insert(self.id, local));
        trace!("thread {} running", handle);

        let outcome = panic::catch_unwind(AssertUnwindSafe(entry));

        LOCAL.with(|l| l.borrow_mut().remove(&self.id));
        self.retire(handle);
        if let Err(payload) = outcome {
            if !payload.is::<Vanish>() {
                panic::resume_unwind(payload);
            }
        }
    }

    fn wait_for_spawned(&self) {
        let mut live = self.live();
        while *live > 0 {
            live = self
                .all_vanished
                .wait(live)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Kernel for HostKernel {
    fn thread_create(
        &self,
        stack_size: usize,
        entry: ThreadEntry,
    ) -> Result<ThreadHandle, KernelError> {
        let stack_size = stack_size.max(self.inner.config.min_stack_size);
        let handle = self.inner.allocate_handle();
        let local = self.inner.register(handle, true);

        let inner = self.inner.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.inner.config.name_prefix, handle))
            .stack_size(stack_size)
            .spawn(move || inner.run(local, entry));

        match spawned {
            Ok(_) => {
                debug!("ThreadCreate: handle={}, stack={:#x}", handle, stack_size);
                Ok(handle)
            }
            Err(e) => {
                self.inner.retire(handle);
                Err(KernelError::Spawn(e))
            }
        }
    }

    fn gettid(&self) -> ThreadHandle {
        self.inner.with_local(|me| me.handle)
    }

    fn yield_to(&self, target: Option<ThreadHandle>) -> Result<(), KernelError> {
        if let Some(target) = target {
            if self.inner.lookup(target).is_none() {
                return Err(KernelError::NoSuchThread(target));
            }
        }
        thread::yield_now();
        Ok(())
    }

    fn deschedule(&self, flag: &AtomicU32) {
        self.inner.with_local(|me| {
            let Some(tcb) = self.inner.lookup(me.handle) else {
                return;
            };
            {
                let mut state = tcb.state();
                if flag.load(Ordering::SeqCst) != 0 {
                    return;
                }
                *state = ThreadState::Blocked;
            }
            trace!("thread {} descheduled", me.handle);

            loop {
                me.parker.park();
                if *tcb.state() != ThreadState::Blocked {
                    break;
                }
            }
        })
    }

    fn make_runnable(&self, target: ThreadHandle) -> Result<(), KernelError> {
        let tcb = self
            .inner
            .lookup(target)
            .ok_or(KernelError::NoSuchThread(target))?;

        let mut state = tcb.state();
        if *state != ThreadState::Blocked {
            return Err(KernelError::NotBlocked(target));
        }
        *state = ThreadState::Runnable;
        drop(state);

        tcb.unpark();
        trace!("thread {} made runnable", target);
        Ok(())
    }

    fn set_status(&self, status: i32) {
        self.inner.status.store(status, Ordering::Relaxed);
    }

    fn vanish(&self) -> ! {
        let me = self.inner.with_local(|me| (me.handle, me.spawned));
        match me {
            (handle, true) => {
                trace!("thread {} vanishing", handle);
                panic::resume_unwind(Box::new(Vanish))
            }
            (handle, false) => {
                LOCAL.with(|l| l.borrow_mut().remove(&self.inner.id));
                self.inner.retire(handle);
                debug!("initial thread {} vanished, waiting for the rest", handle);
                self.inner.wait_for_spawned();
                process::exit(self.inner.status.load(Ordering::Relaxed))
            }
        }
    }

    fn page_size(&self) -> usize {
        self.inner.config.page_size
    }
}
