use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crossbeam::channel::{self, Receiver, Sender};
use log::debug;

use super::job::{run_isolated, JobFailure};
use super::pending::PendingJobs;
use super::{default_workers, ThreadPool};
use crate::{PoolError, Result};

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    /// Id of the rayon pool that owns this thread, 0 if none.
    static CURRENT_POOL: Cell<usize> = const { Cell::new(0) };
}

/// A thread pool backed by the `rayon` library.
///
/// Uses rayon's work-stealing scheduler, with the same completion barrier
/// and shutdown contract as [`WorkerPool`](super::WorkerPool). Jobs are not
/// guaranteed to start in submission order.
///
/// Panics raised by jobs are kept until taken with
/// [`drain_failures`](RayonThreadPool::drain_failures); a long-lived pool
/// whose failures are never drained holds every one of them.
pub struct RayonThreadPool {
    id: usize,
    pool: RwLock<Option<rayon::ThreadPool>>,
    pending: Arc<PendingJobs>,
    /// Rayon threads that have not run their exit handler yet.
    live_threads: Arc<PendingJobs>,
    failures_tx: Sender<JobFailure>,
    failures: Receiver<JobFailure>,
}

impl RayonThreadPool {
    /// Takes every failure reported so far without blocking.
    pub fn drain_failures(&self) -> Vec<JobFailure> {
        self.failures.try_iter().collect()
    }

    /// Number of jobs submitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.pending.count()
    }

    /// Number of rayon worker threads that have not exited.
    pub fn live_threads(&self) -> usize {
        self.live_threads.count()
    }

    fn reject_own_worker(&self, operation: &'static str) -> Result<()> {
        if CURRENT_POOL.with(|current| current.get() == self.id) {
            Err(PoolError::CalledFromWorker(operation))
        } else {
            Ok(())
        }
    }
}

impl ThreadPool for RayonThreadPool {
    fn new(threads: u32) -> Result<Self> {
        let threads = match threads {
            0 => default_workers(),
            n => n as usize,
        };
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        let live_threads = Arc::new(PendingJobs::new());
        for _ in 0..threads {
            live_threads.increment();
        }

        let exiting = Arc::clone(&live_threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rayon-worker-{i}"))
            .start_handler(move |_| CURRENT_POOL.with(|current| current.set(id)))
            .exit_handler(move |_| exiting.complete())
            .build()
            .map_err(|e| PoolError::Build(e.to_string()))?;
        let (failures_tx, failures) = channel::unbounded();
        Ok(RayonThreadPool {
            id,
            pool: RwLock::new(Some(pool)),
            pending: Arc::new(PendingJobs::new()),
            live_threads,
            failures_tx,
            failures,
        })
    }

    fn spawn<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let pool = self.pool.read().unwrap();
        let pool = pool.as_ref().ok_or(PoolError::Closed)?;

        self.pending.increment();
        let pending = Arc::clone(&self.pending);
        let failures = self.failures_tx.clone();
        pool.spawn(move || {
            let worker = rayon::current_thread_index().unwrap_or(0);
            run_isolated(Box::new(job), worker, &failures);
            pending.complete();
        });
        Ok(())
    }

    fn wait_for_idle(&self) -> Result<()> {
        self.reject_own_worker("wait_for_idle")?;
        self.pending.wait();
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.reject_own_worker("shutdown")?;
        let pool = self.pool.write().unwrap().take();
        if pool.is_some() {
            debug!("rayon pool draining {} jobs", self.pending.count());
        }
        // Dropping a rayon pool neither waits for spawned jobs nor joins its threads.
        self.pending.wait();
        drop(pool);
        self.live_threads.wait();
        Ok(())
    }
}
