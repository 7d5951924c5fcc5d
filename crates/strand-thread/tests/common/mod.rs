use std::sync::Arc;
use std::time::{Duration, Instant};
use strand_thread::{HostKernel, ThreadLibrary};

pub const STACK_SIZE: usize = 64 * 1024;

/// A fresh library whose root is the calling test thread.
pub fn setup() -> ThreadLibrary {
    let _ = env_logger::builder().is_test(true).try_init();
    let lib = ThreadLibrary::new(Arc::new(HostKernel::new()));
    lib.init(STACK_SIZE).expect("init");
    lib
}

/// Yield until `cond` holds; fail the test after ten seconds.
pub fn wait_until(lib: &ThreadLibrary, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for condition");
        lib.yield_to(None).unwrap();
    }
}
