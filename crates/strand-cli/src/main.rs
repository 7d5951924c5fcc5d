mod scenarios;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use strand_kernel::{HostKernel, Kernel};
use strand_thread::ThreadLibrary;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Stack size for created threads, rounded up to whole pages
    #[arg(long, global = true, default_value_t = 64 * 1024)]
    stack_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create threads and join them, checking every exit value
    Spawn {
        #[arg(long, default_value_t = 16)]
        threads: usize,
    },
    /// Contended counter behind a ticket mutex
    Mutex {
        #[arg(long, default_value_t = 8)]
        threads: usize,
        #[arg(long, default_value_t = 1000)]
        rounds: usize,
    },
    /// Two threads taking turns through a condition variable
    Pingpong {
        #[arg(long, default_value_t = 1000)]
        rounds: usize,
    },
    /// Workers sharing a fixed number of slots through a semaphore
    Pool {
        #[arg(long, default_value_t = 8)]
        workers: usize,
        #[arg(long, default_value_t = 3)]
        slots: i32,
        #[arg(long, default_value_t = 50)]
        jobs: usize,
    },
    /// Readers checking a pair that writers update under the rwlock
    Rwlock {
        #[arg(long, default_value_t = 6)]
        readers: usize,
        #[arg(long, default_value_t = 2)]
        writers: usize,
        #[arg(long, default_value_t = 200)]
        rounds: usize,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let kernel: Arc<dyn Kernel> = Arc::new(HostKernel::new());
    let lib = ThreadLibrary::new(kernel);
    lib.init(cli.stack_size).context("failed to initialize thread library")?;

    let root = lib.clone();
    lib.run_root(move || match scenarios::run(&root, cli.command) {
        Ok(summary) => {
            println!("{}", summary);
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            root.kernel().set_status(1);
            1
        }
    })
}
