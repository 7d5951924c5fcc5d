//! Stress scenarios run by the `strand` binary. Each one drives a primitive
//! from several threads and fails if an invariant is observed broken.

use crate::Commands;
use anyhow::{ensure, Context, Result};
use log::info;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strand_thread::{RwLockKind, ThreadHandle, ThreadLibrary};

pub(crate) fn run(lib: &ThreadLibrary, command: Commands) -> Result<String> {
    match command {
        Commands::Spawn { threads } => spawn(lib, threads),
        Commands::Mutex { threads, rounds } => mutex(lib, threads, rounds),
        Commands::Pingpong { rounds } => pingpong(lib, rounds),
        Commands::Pool {
            workers,
            slots,
            jobs,
        } => pool(lib, workers, slots, jobs),
        Commands::Rwlock {
            readers,
            writers,
            rounds,
        } => rwlock(lib, readers, writers, rounds),
    }
}

fn join_all(lib: &ThreadLibrary, tids: Vec<ThreadHandle>) -> Result<Vec<usize>> {
    tids.into_iter()
        .map(|tid| lib.join(tid).with_context(|| format!("join of thread {}", tid)))
        .collect()
}

fn spawn(lib: &ThreadLibrary, threads: usize) -> Result<String> {
    let mut tids = Vec::with_capacity(threads);
    for i in 0..threads {
        let l = lib.clone();
        // Odd threads exit explicitly, even ones fall through.
        let tid = lib.create(
            move |x| {
                if x % 2 == 1 {
                    l.exit(x * 3)
                }
                x * 3
            },
            i,
        )?;
        tids.push(tid);
    }

    let values = join_all(lib, tids)?;
    for (i, value) in values.iter().enumerate() {
        ensure!(*value == i * 3, "thread {} exited with {}, expected {}", i, value, i * 3);
    }
    Ok(format!("spawn: {} threads joined", threads))
}

fn mutex(lib: &ThreadLibrary, threads: usize, rounds: usize) -> Result<String> {
    let counter = Arc::new(lib.protected(0usize));
    let mut tids = Vec::with_capacity(threads);
    for _ in 0..threads {
        let c = counter.clone();
        let l = lib.clone();
        tids.push(lib.create(
            move |rounds| {
                for _ in 0..rounds {
                    let mut n = c.lock();
                    let seen = *n;
                    let _ = l.yield_to(None);
                    *n = seen + 1;
                }
                0
            },
            rounds,
        )?);
    }
    join_all(lib, tids)?;

    let total = *counter.lock();
    ensure!(
        total == threads * rounds,
        "counter is {}, expected {}",
        total,
        threads * rounds
    );
    Ok(format!("mutex: {} increments, none lost", total))
}

fn pingpong(lib: &ThreadLibrary, rounds: usize) -> Result<String> {
    // Whose turn it is: 0 or 1.
    let turn = Arc::new(lib.protected(0usize));
    let changed = Arc::new(lib.cond());

    let mut tids = Vec::with_capacity(2);
    for me in 0..2 {
        let (t, c) = (turn.clone(), changed.clone());
        tids.push(lib.create(
            move |me| {
                let mut hits = 0;
                let mut guard = t.lock();
                for _ in 0..rounds {
                    while *guard != me {
                        c.wait_guarded(&mut guard);
                    }
                    hits += 1;
                    *guard = 1 - me;
                    c.signal();
                }
                hits
            },
            me,
        )?);
    }

    let hits = join_all(lib, tids)?;
    ensure!(hits == [rounds, rounds], "uneven turns: {:?}", hits);
    Ok(format!("pingpong: {} exchanges", rounds * 2))
}

fn pool(lib: &ThreadLibrary, workers: usize, slots: i32, jobs: usize) -> Result<String> {
    ensure!(slots > 0, "a pool needs at least one slot");
    let sem = Arc::new(lib.semaphore(slots));
    let busy = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tids = Vec::with_capacity(workers);
    for _ in 0..workers {
        let (s, b, p, l) = (sem.clone(), busy.clone(), peak.clone(), lib.clone());
        tids.push(lib.create(
            move |jobs| {
                for _ in 0..jobs {
                    s.wait();
                    let now = b.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    let _ = l.yield_to(None);
                    b.fetch_sub(1, Ordering::SeqCst);
                    s.signal();
                }
                jobs
            },
            jobs,
        )?);
    }
    join_all(lib, tids)?;

    let peak = peak.load(Ordering::SeqCst);
    ensure!(peak <= slots as usize, "{} workers inside {} slots", peak, slots);
    ensure!(sem.count() == slots, "semaphore ended at {}", sem.count());
    Ok(format!(
        "pool: {} jobs, at most {} of {} slots busy",
        workers * jobs,
        peak,
        slots
    ))
}

fn rwlock(lib: &ThreadLibrary, readers: usize, writers: usize, rounds: usize) -> Result<String> {
    let lock = Arc::new(lib.rwlock());
    // Writers keep both halves equal; readers must never see them differ.
    let pair = Arc::new((AtomicUsize::new(0), AtomicUsize::new(0)));
    let torn = Arc::new(AtomicUsize::new(0));

    let mut tids = Vec::with_capacity(readers + writers);
    for _ in 0..writers {
        let (rw, p, l) = (lock.clone(), pair.clone(), lib.clone());
        tids.push(lib.create(
            move |rounds| {
                for _ in 0..rounds {
                    rw.lock(RwLockKind::Write);
                    p.0.fetch_add(1, Ordering::SeqCst);
                    let _ = l.yield_to(None);
                    p.1.fetch_add(1, Ordering::SeqCst);
                    rw.unlock();
                }
                0
            },
            rounds,
        )?);
    }
    for _ in 0..readers {
        let (rw, p, t, l) = (lock.clone(), pair.clone(), torn.clone(), lib.clone());
        tids.push(lib.create(
            move |rounds| {
                for _ in 0..rounds {
                    rw.lock(RwLockKind::Read);
                    let a = p.0.load(Ordering::SeqCst);
                    let _ = l.yield_to(None);
                    let b = p.1.load(Ordering::SeqCst);
                    if a != b {
                        t.fetch_add(1, Ordering::SeqCst);
                    }
                    rw.unlock();
                }
                0
            },
            rounds,
        )?);
    }
    join_all(lib, tids)?;

    let torn = torn.load(Ordering::SeqCst);
    ensure!(torn == 0, "{} reads saw a half-written pair", torn);
    let writes = pair.0.load(Ordering::SeqCst);
    ensure!(writes == writers * rounds, "{} writes, expected {}", writes, writers * rounds);
    info!("rwlock ended in state {:?}", lock.state());
    Ok(format!(
        "rwlock: {} reads and {} writes, none torn",
        readers * rounds,
        writes
    ))
}
