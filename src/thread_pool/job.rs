use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crossbeam::channel::Sender;
use log::error;

/// A unit of work: an owned closure with no arguments and no return value.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Report of a job that panicked while running on a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    /// Index of the worker that ran the job.
    pub worker: usize,
    /// The panic payload, if it was a string.
    pub message: String,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job on worker {} panicked: {}", self.worker, self.message)
    }
}

/// Runs `job` to completion, turning a panic into a [`JobFailure`] sent on `failures`.
pub(crate) fn run_isolated(job: Job, worker: usize, failures: &Sender<JobFailure>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let failure = JobFailure {
            worker,
            message: panic_message(payload.as_ref()),
        };
        error!("{failure}");
        // The receiver lives as long as the pool; a send only fails during teardown.
        let _ = failures.send(failure);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
