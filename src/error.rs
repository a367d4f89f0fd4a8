use std::io;
use thiserror::Error;

/// Error type for thread pool operations.
#[derive(Error, Debug)]
pub enum PoolError {
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    /// The pool was configured with zero workers.
    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    /// A job was submitted after shutdown began.
    #[error("thread pool is shut down")]
    Closed,

    /// A blocking pool operation was called from one of the pool's own workers.
    #[error("{0} called from a worker of the same pool")]
    CalledFromWorker(&'static str),

    /// A worker thread terminated by panicking.
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    /// The backing pool could not be built.
    #[error("failed to build pool: {0}")]
    Build(String),
}

/// Result type alias for thread pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
