#![deny(missing_docs)]

//! A fixed-size worker thread pool with a completion barrier.
//!
//! Jobs are owned closures pushed onto a shared FIFO queue and run by a
//! fixed set of worker threads. Callers can block until all submitted work
//! has finished, and shut the pool down once, letting queued jobs drain.

mod error;
/// Thread pool implementations and their configuration.
pub mod thread_pool;

pub use error::{PoolError, Result};
pub use thread_pool::{
    default_workers, Job, JobFailure, PoolConfig, RayonThreadPool, ThreadPool, WorkerPool,
};
