use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use log::{error, log, trace, warn, Level};

use super::job::{run_isolated, Job, JobFailure};
use super::pending::PendingJobs;
use super::{PoolConfig, ThreadPool};
use crate::{PoolError, Result};

thread_local! {
    /// Identity of the pool whose worker is running on this thread, 0 if none.
    static CURRENT_POOL: Cell<usize> = const { Cell::new(0) };
}

/// A fixed-size pool of worker threads sharing one FIFO job queue.
///
/// Jobs are run in submission order by whichever worker is free. The pool
/// keeps a count of unfinished jobs so that callers can block until it is
/// idle with [`wait_for_idle`](WorkerPool::wait_for_idle).
///
/// Shutting down stops new submissions but lets every queued job finish.
/// A job that panics is reported on [`failures`](WorkerPool::failures) and
/// does not take its worker down.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<WorkerHandle>>,
    worker_count: usize,
    failures: Receiver<JobFailure>,
}

/// State reachable from every worker thread.
struct Shared {
    queue: Mutex<JobQueue>,
    available: Condvar,
    pending: PendingJobs,
    failures: Sender<JobFailure>,
    verbose: bool,
}

struct JobQueue {
    jobs: VecDeque<Job>,
    stopped: bool,
}

struct WorkerHandle {
    id: usize,
    thread: JoinHandle<()>,
}

impl WorkerPool {
    /// Starts a pool as described by `config`.
    ///
    /// Returns as soon as every worker thread is spawned; the workers may
    /// still be starting up.
    ///
    /// # Errors
    ///
    /// Fails if the worker count is zero or a thread cannot be spawned. In
    /// the latter case the workers already started are stopped and joined.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        let worker_count = config.resolved_workers()?;
        let (tx, rx) = channel::unbounded();
        let shared = Arc::new(Shared {
            queue: Mutex::new(JobQueue {
                jobs: VecDeque::new(),
                stopped: false,
            }),
            available: Condvar::new(),
            pending: PendingJobs::new(),
            failures: tx,
            verbose: config.is_verbose(),
        });

        log!(
            shared.lifecycle_level(),
            "thread pool starting {worker_count} workers"
        );

        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            match spawn_worker(id, &config, Arc::clone(&shared)) {
                Ok(thread) => workers.push(WorkerHandle { id, thread }),
                Err(e) => {
                    error!("failed to spawn worker {id}: {e}");
                    shared.signal_stop();
                    for worker in workers {
                        let _ = worker.thread.join();
                    }
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        Ok(WorkerPool {
            shared,
            workers: Mutex::new(workers),
            worker_count,
            failures: rx,
        })
    }

    /// Queues `job` to run on one of the workers.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Closed`] once shutdown has begun; the job is
    /// dropped without running.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.shared.queue.lock().unwrap();
        if queue.stopped {
            return Err(PoolError::Closed);
        }
        // Counted before a worker can see it, so a waiter never observes
        // zero while the job is queued.
        self.shared.pending.increment();
        queue.jobs.push_back(Box::new(job));
        drop(queue);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Blocks until every submitted job has finished running.
    ///
    /// Any number of threads may wait at once; all are released when the
    /// pending count reaches zero.
    ///
    /// # Errors
    ///
    /// Calling this from a job running on the same pool would never return,
    /// so it fails with [`PoolError::CalledFromWorker`] instead.
    pub fn wait_for_idle(&self) -> Result<()> {
        self.shared.reject_own_worker("wait_for_idle")?;
        let level = self.shared.lifecycle_level();
        log!(level, "waiting for all jobs to complete");
        self.shared.pending.wait();
        log!(level, "all jobs completed");
        Ok(())
    }

    /// Like [`wait_for_idle`](WorkerPool::wait_for_idle) but gives up after
    /// `timeout`.
    ///
    /// Returns `Ok(true)` if the pool became idle, `Ok(false)` if jobs were
    /// still pending at the deadline.
    pub fn wait_for_idle_timeout(&self, timeout: Duration) -> Result<bool> {
        self.shared.reject_own_worker("wait_for_idle_timeout")?;
        let idle = self.shared.pending.wait_timeout(timeout);
        if !idle {
            log!(
                self.shared.lifecycle_level(),
                "timed out with {} jobs pending",
                self.shared.pending.count()
            );
        }
        Ok(idle)
    }

    /// Stops accepting jobs, lets queued jobs finish, and joins every worker.
    ///
    /// Calling it again is a no-op. A concurrent second call blocks until
    /// the first one has joined the workers.
    ///
    /// # Errors
    ///
    /// Fails with [`PoolError::CalledFromWorker`] when called from a job on
    /// this pool, and with [`PoolError::WorkerPanicked`] if a worker thread
    /// did not exit cleanly.
    pub fn shutdown(&self) -> Result<()> {
        self.shared.reject_own_worker("shutdown")?;

        let mut workers = self.workers.lock().unwrap();
        if workers.is_empty() {
            return Ok(());
        }

        let level = self.shared.lifecycle_level();
        log!(level, "shutdown requested");
        self.shared.signal_stop();

        let mut result = Ok(());
        for worker in workers.drain(..) {
            if worker.thread.join().is_err() {
                error!("worker {} panicked", worker.id);
                result = Err(PoolError::WorkerPanicked(worker.id));
            }
        }
        log!(level, "all worker threads are stopped");
        result
    }

    /// Number of jobs submitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.shared.pending.count()
    }

    /// Number of worker threads the pool was started with.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Whether shutdown has begun.
    pub fn is_shutdown(&self) -> bool {
        self.shared.queue.lock().unwrap().stopped
    }

    /// Receiver of panics raised by jobs.
    ///
    /// The channel is unbounded and the pool holds its own receiver, so
    /// failures accumulate until received here or through
    /// [`drain_failures`](WorkerPool::drain_failures). A long-lived pool
    /// whose jobs keep panicking should drain them periodically.
    pub fn failures(&self) -> Receiver<JobFailure> {
        self.failures.clone()
    }

    /// Takes every failure reported so far without blocking.
    pub fn drain_failures(&self) -> Vec<JobFailure> {
        self.failures.try_iter().collect()
    }
}

impl ThreadPool for WorkerPool {
    fn new(threads: u32) -> Result<Self> {
        let mut config = PoolConfig::new();
        if threads > 0 {
            config = config.workers(threads as usize);
        }
        WorkerPool::with_config(config)
    }

    fn spawn<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(job)
    }

    fn wait_for_idle(&self) -> Result<()> {
        WorkerPool::wait_for_idle(self)
    }

    fn shutdown(&self) -> Result<()> {
        WorkerPool::shutdown(self)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.shared.on_own_worker() {
            // Joining would wait on this very thread; let the workers drain and exit on their own.
            warn!("thread pool dropped from its own worker, detaching workers");
            self.shared.signal_stop();
            return;
        }
        if let Err(e) = self.shutdown() {
            error!("error shutting down thread pool: {e}");
        }
    }
}

impl Shared {
    fn lifecycle_level(&self) -> Level {
        if self.verbose {
            Level::Info
        } else {
            Level::Debug
        }
    }

    fn key(self: &Arc<Self>) -> usize {
        Arc::as_ptr(self) as usize
    }

    fn on_own_worker(self: &Arc<Self>) -> bool {
        CURRENT_POOL.with(|current| current.get() == self.key())
    }

    fn reject_own_worker(self: &Arc<Self>, operation: &'static str) -> Result<()> {
        if self.on_own_worker() {
            Err(PoolError::CalledFromWorker(operation))
        } else {
            Ok(())
        }
    }

    /// Sets the stop flag and wakes every worker.
    fn signal_stop(&self) {
        self.queue.lock().unwrap().stopped = true;
        self.available.notify_all();
    }

    /// Blocks until a job is available, or returns `None` once the pool is
    /// stopped and the queue is drained.
    fn next_job(&self) -> Option<Job> {
        let mut queue = self.queue.lock().unwrap();
        loop {
            if let Some(job) = queue.jobs.pop_front() {
                return Some(job);
            }
            if queue.stopped {
                return None;
            }
            queue = self.available.wait(queue).unwrap();
        }
    }
}

fn spawn_worker(
    id: usize,
    config: &PoolConfig,
    shared: Arc<Shared>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(config.worker_name(id))
        .spawn(move || run_worker(id, shared))
}

fn run_worker(id: usize, shared: Arc<Shared>) {
    CURRENT_POOL.with(|current| current.set(shared.key()));
    let level = shared.lifecycle_level();
    log!(level, "worker {id} starting");

    while let Some(job) = shared.next_job() {
        trace!("worker {id} running job");
        run_isolated(job, id, &shared.failures);
        shared.pending.complete();
    }

    log!(level, "worker {id} stopped");
}
