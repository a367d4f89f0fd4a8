use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Count of submitted jobs that have not finished running.
///
/// Guarded by its own lock so that idle waiters never contend with the
/// job queue. Also counts rayon threads that have yet to exit.
pub(crate) struct PendingJobs {
    state: Mutex<PendingState>,
    idle: Condvar,
}

struct PendingState {
    count: usize,
    /// Callers currently blocked in `wait`; completions only signal when non-zero.
    waiters: usize,
}

impl PendingJobs {
    pub(crate) fn new() -> Self {
        PendingJobs {
            state: Mutex::new(PendingState {
                count: 0,
                waiters: 0,
            }),
            idle: Condvar::new(),
        }
    }

    pub(crate) fn increment(&self) {
        self.state.lock().unwrap().count += 1;
    }

    /// Marks one job as finished, releasing every waiter if none remain.
    pub(crate) fn complete(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.count > 0, "completed more jobs than were submitted");
        state.count -= 1;
        if state.count == 0 && state.waiters > 0 {
            self.idle.notify_all();
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.state.lock().unwrap().count
    }

    /// Blocks until the count reaches zero.
    pub(crate) fn wait(&self) {
        let mut state = self.state.lock().unwrap();
        state.waiters += 1;
        while state.count > 0 {
            state = self.idle.wait(state).unwrap();
        }
        state.waiters -= 1;
    }

    /// Blocks until the count reaches zero or `timeout` elapses.
    ///
    /// Returns `true` if the count reached zero.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        state.waiters += 1;
        while state.count > 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = self.idle.wait_timeout(state, deadline - now).unwrap().0;
        }
        state.waiters -= 1;
        state.count == 0
    }
}
