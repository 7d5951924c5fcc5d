//! Thread lifecycle: init, create, exit, join.
//!
//! Every thread, the initial one included, owns a [`Tcb`] in the registry.
//! A thread finds its own TCB through a thread-local handle installed when
//! it starts, so `exit` works the same whether it is called explicitly or
//! reached by returning from the body. A TCB leaves the registry only in a
//! successful `join`, after its thread has exited.

mod tcb;

use crate::cond::CondVar;
use crate::error::ThreadError;
use crate::mutex::Mutex;
use crate::protected::Protected;
use crate::rwlock::RwLock;
use crate::sem::Semaphore;
use log::debug;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};
use strand_kernel::{Kernel, ThreadHandle};
use tcb::{Registry, Tcb, TcbList, ThreadStatus};

/// Round a declared stack size up to whole pages.
fn stack_bytes(declared: usize, page_size: usize) -> usize {
    let page = page_size.max(1);
    declared.div_ceil(page) * page
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<Tcb>>> = const { RefCell::new(None) };
}

/// Handle to the thread library; clones share one registry.
#[derive(Clone)]
pub struct ThreadLibrary {
    inner: Arc<Library>,
}

struct Library {
    kernel: Arc<dyn Kernel>,
    registry: OnceLock<Registry>,
}

impl ThreadLibrary {
    pub fn new(kernel: Arc<dyn Kernel>) -> Self {
        Self {
            inner: Arc::new(Library {
                kernel,
                registry: OnceLock::new(),
            }),
        }
    }

    pub fn kernel(&self) -> &Arc<dyn Kernel> {
        &self.inner.kernel
    }

    fn registry(&self) -> Result<&Registry, ThreadError> {
        self.inner.registry.get().ok_or(ThreadError::NotInitialized)
    }

    /// One-time setup. The calling thread becomes the root thread, and
    /// every thread created later gets a stack of `stack_size` bytes
    /// rounded up to the kernel's page size.
    pub fn init(&self, stack_size: usize) -> Result<(), ThreadError> {
        if self.inner.registry.get().is_some() {
            return Err(ThreadError::AlreadyInitialized);
        }
        if stack_size == 0 {
            return Err(ThreadError::InvalidStackSize(stack_size));
        }

        let mut fresh = false;
        self.inner.registry.get_or_init(|| {
            fresh = true;
            self.build_registry(stack_size)
        });
        if !fresh {
            return Err(ThreadError::AlreadyInitialized);
        }
        Ok(())
    }

    fn build_registry(&self, stack_size: usize) -> Registry {
        let kernel = &self.inner.kernel;
        let root = kernel.gettid();

        let tcb = Arc::new(Tcb::new(kernel.clone(), 0));
        tcb.set_tid(root);
        tcb.released.store(1, Ordering::SeqCst);

        let tcbs = Protected::new(kernel.clone(), TcbList::default());
        tcbs.lock().insert(tcb.clone());
        CURRENT.with(|c| *c.borrow_mut() = Some(tcb));

        debug!("thread library initialized: root={}, stack={:#x}", root, stack_size);
        Registry {
            tcbs,
            stack_size,
            root,
        }
    }

    /// Start a thread running `body(arg)`. Returning from `body` is the same
    /// as calling [`exit`](Self::exit) with the returned value.
    pub fn create<F>(&self, body: F, arg: usize) -> Result<ThreadHandle, ThreadError>
    where
        F: FnOnce(usize) -> usize + Send + 'static,
    {
        let registry = self.registry()?;
        let kernel = &self.inner.kernel;
        let stack_size = stack_bytes(registry.stack_size, kernel.page_size());
        let tcb = Arc::new(Tcb::new(kernel.clone(), stack_size));

        let lib = self.clone();
        let child = tcb.clone();
        let tid = kernel.thread_create(
            stack_size,
            Box::new(move || lib.thread_main(child, body, arg)),
        )?;

        tcb.set_tid(tid);
        registry.tcbs.lock().insert(tcb.clone());
        tcb.released.store(1, Ordering::SeqCst);
        // Fails harmlessly if the child has not descheduled yet.
        let _ = kernel.make_runnable(tid);

        debug!("created thread {} (stack {:#x})", tid, tcb.stack_size);
        Ok(tid)
    }

    fn thread_main<F>(&self, tcb: Arc<Tcb>, body: F, arg: usize)
    where
        F: FnOnce(usize) -> usize,
    {
        // Wait until the creator has published our id and registered us.
        while tcb.released.load(Ordering::SeqCst) == 0 {
            self.inner.kernel.deschedule(&tcb.released);
        }
        let tid = tcb.tid();
        CURRENT.with(|c| *c.borrow_mut() = Some(tcb));

        match panic::catch_unwind(AssertUnwindSafe(move || body(arg))) {
            Ok(status) => {
                // The body caught the unwind out of `exit` and kept going.
                if CURRENT.with(|c| c.borrow().is_none()) {
                    fatal!("thread {:?} returned after calling exit", tid);
                }
                self.exit(status)
            }
            Err(payload) => {
                // `exit` clears CURRENT before vanishing; anything else
                // unwinding out of the body is a panic.
                if CURRENT.with(|c| c.borrow().is_some()) {
                    fatal!("thread {:?} panicked", tid);
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Finish the calling thread with `status`, waking its joiner if one is
    /// already waiting. Never returns.
    ///
    /// On a created thread this unwinds out of the body. Calling it under
    /// `catch_unwind` and carrying on afterwards aborts the process.
    pub fn exit(&self, status: usize) -> ! {
        let registry = match self.registry() {
            Ok(registry) => registry,
            Err(_) => fatal!("thr_exit before thr_init"),
        };
        let Some(tcb) = CURRENT.with(|c| c.borrow_mut().take()) else {
            fatal!("thread {} has no control block", self.getid())
        };

        let mut tcbs = registry.tcbs.lock();
        if !tcbs.contains(&tcb) {
            fatal!("control block of thread {:?} is not registered", tcb.tid());
        }
        let state = tcb.state(&mut tcbs);
        state.return_value = status;
        state.status = ThreadStatus::Exited;
        if state.joined {
            tcb.exited.signal();
        }
        drop(tcbs);

        debug!("thread {:?} exited with {:#x}", tcb.tid(), status);
        drop(tcb);
        self.inner.kernel.vanish()
    }

    /// Wait for thread `tid` to exit and return its exit value.
    ///
    /// Only one joiner may claim a thread; a second gets
    /// [`ThreadError::AlreadyJoined`]. Once joined, the id is gone.
    pub fn join(&self, tid: ThreadHandle) -> Result<usize, ThreadError> {
        let registry = self.registry()?;
        if tid == self.getid() {
            return Err(ThreadError::JoinSelf(tid));
        }

        let mut tcbs = registry.tcbs.lock();
        let tcb = tcbs.find(tid).ok_or(ThreadError::NoSuchThread(tid))?;
        {
            let state = tcb.state(&mut tcbs);
            if state.joined {
                return Err(ThreadError::AlreadyJoined(tid));
            }
            state.joined = true;
        }

        while tcb.state(&mut tcbs).status != ThreadStatus::Exited {
            tcb.exited.wait_guarded(&mut tcbs);
        }
        let value = tcb.state(&mut tcbs).return_value;
        tcbs.remove(&tcb);
        drop(tcbs);

        debug!("joined thread {} -> {:#x}", tid, value);
        Ok(value)
    }

    pub fn getid(&self) -> ThreadHandle {
        self.inner.kernel.gettid()
    }

    /// Yield the CPU, to `target` if given.
    pub fn yield_to(&self, target: Option<ThreadHandle>) -> Result<(), ThreadError> {
        Ok(self.inner.kernel.yield_to(target)?)
    }

    /// Run the root thread's body and exit with its return value, the way a
    /// created thread falls through into `exit`.
    pub fn run_root<F>(&self, body: F) -> !
    where
        F: FnOnce() -> usize,
    {
        let status = body();
        self.exit(status)
    }

    /// Id of the thread that called [`init`](Self::init).
    pub fn root(&self) -> Result<ThreadHandle, ThreadError> {
        Ok(self.registry()?.root)
    }

    /// Threads that are running or exited but not yet joined.
    pub fn thread_count(&self) -> Result<usize, ThreadError> {
        Ok(self.registry()?.tcbs.lock().len())
    }

    pub fn mutex(&self) -> Mutex {
        Mutex::new(self.inner.kernel.clone())
    }

    pub fn cond(&self) -> CondVar {
        CondVar::new(self.inner.kernel.clone())
    }

    pub fn semaphore(&self, count: i32) -> Semaphore {
        Semaphore::new(self.inner.kernel.clone(), count)
    }

    pub fn rwlock(&self) -> RwLock {
        RwLock::new(self.inner.kernel.clone())
    }

    pub fn protected<T>(&self, data: T) -> Protected<T> {
        Protected::new(self.inner.kernel.clone(), data)
    }
}
