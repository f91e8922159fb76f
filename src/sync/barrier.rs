//! Worker thread barrier group
//!
//! Coordinates a dynamic set of worker threads through start/pause/stop
//! transitions. One shared mutex/condvar pair is referenced by every
//! per-thread [`WorkerControl`] block; each block additionally carries its
//! own [`Rendezvous`] plus pause/stop flags. The shared pair is used
//! exclusively for the start rendezvous, never for data transfer.
//!
//! Pausing is cooperative: a worker only parks when it reaches a call to
//! [`WorkerControl::check`], so bodies must call it at every safe suspension
//! point. The controller side blocks until every worker has confirmed each
//! transition through its rendezvous semaphore, giving all-or-nothing
//! pause/resume and a race-free shutdown.
//!
//! Worker states: idle -> running -> pausing -> paused -> running -> ...
//! -> stopping -> joined.

use crate::core::sync::recover_poison;
use crate::sync::Rendezvous;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

#[derive(Debug, Default)]
struct BarrierShared {
    /// Bumped by every start (and by join, to unpark stragglers). A parked
    /// worker records the generation it parked at and waits for it to move.
    start_generation: Mutex<u64>,
    condvar: Condvar,
}

/// Per-thread control block handed to each worker body.
///
/// A worker must only ever touch its own control block.
#[derive(Debug)]
pub struct WorkerControl {
    shared: Arc<BarrierShared>,
    rendezvous: Rendezvous,
    pause: AtomicBool,
    stop: AtomicBool,
}

impl WorkerControl {
    fn new(shared: Arc<BarrierShared>) -> Self {
        Self {
            shared,
            rendezvous: Rendezvous::new(),
            pause: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        }
    }

    /// Cooperative suspension point, called by the worker body.
    ///
    /// Returns false when the worker must unwind and exit. When the pause
    /// flag is set, signals the rendezvous (that is what `pause()` blocks
    /// on), parks on the shared condvar until the next `start()`, clears its
    /// own pause flag and re-signals. Returns false afterwards if a stop
    /// raced the pause.
    pub fn check(&self) -> bool {
        if self.stop.load(Ordering::Acquire) {
            return false;
        }
        if self.pause.load(Ordering::Acquire) {
            self.park_and_signal();
            self.pause.store(false, Ordering::Release);
            self.rendezvous.post();
            return !self.stop.load(Ordering::Acquire);
        }
        true
    }

    /// Whether a pause has been requested but not yet honoured. Lets a
    /// worker drain to a clean point before its next `check()`.
    pub fn pause_requested(&self) -> bool {
        self.pause.load(Ordering::Acquire)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Record the current start generation, signal the rendezvous and park
    /// until the generation moves. Recording and signalling happen under the
    /// shared mutex so a wake broadcast can never be lost between them.
    fn park_and_signal(&self) {
        let mut generation = recover_poison(self.shared.start_generation.lock());
        let parked_at = *generation;
        self.rendezvous.post();
        while *generation == parked_at {
            generation = recover_poison(self.shared.condvar.wait(generation));
        }
    }
}

struct Worker {
    control: Arc<WorkerControl>,
    body: Option<Box<dyn FnOnce(Arc<WorkerControl>) + Send>>,
    handle: Option<JoinHandle<()>>,
}

/// Coordinates start/pause/stop across a pool of worker threads.
///
/// Lifecycle contract: register bodies with [`add`](Self::add), then
/// `init()` once, then any alternation of `start()`/`pause()`, then
/// `join()`. Calling `start()` while workers are running (rather than idle
/// or paused), or letting a body return before its stop flag is set, is a
/// caller contract violation and will stall the controller.
#[derive(Default)]
pub struct BarrierGroup {
    shared: Arc<BarrierShared>,
    workers: Vec<Worker>,
}

impl BarrierGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Register a worker body. The body receives its own control block and
    /// must call [`WorkerControl::check`] at every safe suspension point,
    /// returning when it yields false.
    pub fn add<F>(&mut self, body: F) -> Arc<WorkerControl>
    where
        F: FnOnce(Arc<WorkerControl>) + Send + 'static,
    {
        let control = Arc::new(WorkerControl::new(Arc::clone(&self.shared)));
        self.workers.push(Worker {
            control: Arc::clone(&control),
            body: Some(Box::new(body)),
            handle: None,
        });
        control
    }

    /// Spawn every registered worker, then block until each has signaled its
    /// rendezvous once, confirming it reached its entry point. Workers sit
    /// idle (parked) until the first `start()`.
    pub fn init(&mut self) {
        for worker in &mut self.workers {
            if worker.handle.is_some() {
                log::warn!("barrier group: init() called twice for the same worker");
                continue;
            }
            let control = Arc::clone(&worker.control);
            let body = worker.body.take();
            worker.handle = Some(thread::spawn(move || {
                // Entry confirmation, then idle until the first start.
                control.park_and_signal();
                control.pause.store(false, Ordering::Release);
                control.rendezvous.post();
                if control.stop.load(Ordering::Acquire) {
                    return;
                }
                if let Some(body) = body {
                    body(Arc::clone(&control));
                }
            }));
        }
        for worker in &self.workers {
            worker.control.rendezvous.wait();
        }
    }

    /// Wake every parked worker and block until each re-signals, confirming
    /// it woke and cleared its pause flag.
    pub fn start(&self) {
        self.wake_all();
        for worker in &self.workers {
            worker.control.rendezvous.wait();
        }
    }

    /// Request a cooperative pause and block until every worker has parked
    /// itself from inside `check()`.
    pub fn pause(&self) {
        for worker in &self.workers {
            worker.control.pause.store(true, Ordering::Release);
        }
        for worker in &self.workers {
            worker.control.rendezvous.wait();
        }
    }

    /// Stop and join every worker. Parked workers are woken first (harmless
    /// when none are parked); each rendezvous is reset afterwards so the
    /// group could be rebuilt for reuse.
    pub fn join(&mut self) {
        for worker in &self.workers {
            worker.control.stop.store(true, Ordering::Release);
        }
        self.wake_all();
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    log::warn!("barrier group: worker thread panicked before join");
                }
            }
            worker.control.rendezvous.reset();
        }
    }

    fn wake_all(&self) {
        let mut generation = recover_poison(self.shared.start_generation.lock());
        *generation += 1;
        self.shared.condvar.notify_all();
    }
}
