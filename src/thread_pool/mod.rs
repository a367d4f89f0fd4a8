use crate::Result;

/// A pool of worker threads with a completion barrier.
///
/// Implementors run submitted jobs on a fixed set of threads, let callers
/// block until every submitted job has finished, and shut down by draining
/// queued work before joining their threads.
pub trait ThreadPool {
    /// Creates a new thread pool with the given number of threads.
    ///
    /// Zero selects the host's available parallelism.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be started.
    fn new(threads: u32) -> Result<Self>
    where
        Self: Sized;

    /// Spawns a function into the thread pool.
    ///
    /// The function will be executed by one of the threads in the pool. A
    /// panic inside it is caught and reported, never propagated.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Closed`](crate::PoolError::Closed) after shutdown.
    fn spawn<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static;

    /// Blocks until every spawned job has finished.
    fn wait_for_idle(&self) -> Result<()>;

    /// Stops accepting jobs, finishes queued ones, and releases the threads.
    ///
    /// Calling it more than once is a no-op.
    fn shutdown(&self) -> Result<()>;
}

mod config;
mod job;
mod pending;
mod rayon_pool;
mod worker_pool;

pub use self::config::{default_workers, PoolConfig};
pub use self::job::{Job, JobFailure};
pub use self::rayon_pool::RayonThreadPool;
pub use self::worker_pool::WorkerPool;
