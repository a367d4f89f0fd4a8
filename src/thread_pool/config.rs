use crate::{PoolError, Result};

const DEFAULT_THREAD_NAME: &str = "pool-worker";

/// Number of workers used when none is configured.
///
/// This is the parallelism reported by the host, never less than 1.
pub fn default_workers() -> usize {
    num_cpus::get().max(1)
}

/// Settings for constructing a [`WorkerPool`](super::WorkerPool).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    workers: Option<usize>,
    verbose: bool,
    thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            workers: None,
            verbose: false,
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
        }
    }
}

impl PoolConfig {
    /// Creates a config with the default worker count and quiet logging.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Logs lifecycle events at `info` instead of `debug`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the prefix of worker thread names.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Resolves the worker count, rejecting an explicit zero.
    pub(crate) fn resolved_workers(&self) -> Result<usize> {
        match self.workers {
            Some(0) => Err(PoolError::InvalidWorkerCount),
            Some(n) => Ok(n),
            None => Ok(default_workers()),
        }
    }

    pub(crate) fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub(crate) fn worker_name(&self, id: usize) -> String {
        format!("{}-{id}", self.thread_name)
    }
}
