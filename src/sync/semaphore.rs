//! Binary rendezvous semaphore
//!
//! A semaphore whose count is capped at one. It carries no data and no
//! fairness guarantees; it exists so that one thread can confirm to exactly
//! one other thread that an event happened. Posting twice before anyone
//! waits collapses into a single signal, which is precisely what the barrier
//! hand-shake and the queue's merge-on-write coalescing rely on.

use crate::core::sync::recover_poison;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct Rendezvous {
    posted: Mutex<bool>,
    condvar: Condvar,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post the signal. Returns false if the signal was already pending,
    /// in which case this post is absorbed (count stays capped at one).
    pub fn post(&self) -> bool {
        let mut posted = recover_poison(self.posted.lock());
        if *posted {
            return false;
        }
        *posted = true;
        self.condvar.notify_one();
        true
    }

    /// Block until the signal is posted, consuming it.
    pub fn wait(&self) {
        let mut posted = recover_poison(self.posted.lock());
        while !*posted {
            posted = recover_poison(self.condvar.wait(posted));
        }
        *posted = false;
    }

    /// Block until the signal is posted or `timeout` elapses.
    /// Returns true if the signal was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut posted = recover_poison(self.posted.lock());
        while !*posted {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let (guard, _timed_out) = recover_poison(self.condvar.wait_timeout(posted, remaining));
            posted = guard;
        }
        *posted = false;
        true
    }

    /// Consume the signal if it is pending, without blocking.
    pub fn try_wait(&self) -> bool {
        let mut posted = recover_poison(self.posted.lock());
        if *posted {
            *posted = false;
            true
        } else {
            false
        }
    }

    /// Discard any pending signal so the semaphore can be reused.
    pub fn reset(&self) {
        let mut posted = recover_poison(self.posted.lock());
        *posted = false;
    }
}
