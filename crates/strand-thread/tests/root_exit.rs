//! The initial thread leaving through `run_root` or `exit`, joined by a
//! thread it created. Ending the root ends the process, so each mode runs
//! in a child copy of this binary and the parent checks its exit status.

use std::env;
use std::process::Command;
use std::sync::Arc;
use strand_thread::{HostKernel, ThreadHandle, ThreadLibrary};

const MODE_ENV: &str = "STRAND_ROOT_EXIT";
const ROOT_VALUE: usize = 7;
/// Status the joiner reports when it saw `ROOT_VALUE`.
const JOINED_OK: i32 = 42;

fn child(mode: &str) -> ! {
    let _ = env_logger::builder().is_test(true).try_init();
    let lib = ThreadLibrary::new(Arc::new(HostKernel::new()));
    if lib.init(64 * 1024).is_err() {
        std::process::exit(2);
    }
    let root = lib.root().unwrap();

    let l = lib.clone();
    lib.create(
        move |root| {
            let root = ThreadHandle::new(root as u32).unwrap();
            let status = match l.join(root) {
                Ok(ROOT_VALUE) => JOINED_OK,
                _ => 1,
            };
            l.kernel().set_status(status);
            0
        },
        root.val() as usize,
    )
    .unwrap();

    match mode {
        "run_root" => lib.run_root(|| ROOT_VALUE),
        _ => lib.exit(ROOT_VALUE),
    }
}

fn main() {
    if let Ok(mode) = env::var(MODE_ENV) {
        child(&mode);
    }

    for mode in ["run_root", "exit"] {
        let status = Command::new(env::current_exe().unwrap())
            .env(MODE_ENV, mode)
            .status()
            .unwrap();
        assert_eq!(status.code(), Some(JOINED_OK), "root leaving via {}", mode);
        println!("root_exit::{} ... ok", mode);
    }
}
