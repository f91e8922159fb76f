//! Thread coordination primitives
//!
//! Two building blocks live here. [`Rendezvous`] is a count-capped (0/1)
//! semaphore used purely for hand-shaking: one side posts, the other side
//! waits, and a second post before the wait is absorbed. [`BarrierGroup`]
//! builds on it to drive a pool of worker threads through start/pause/stop
//! transitions in lock-step, with each worker cooperating through
//! [`WorkerControl::check`] at its safe suspension points.
//!
//! The message queue reuses [`Rendezvous`] as the per-slot "produced" signal,
//! so a blocked reader parks on exactly the same primitive a parked worker
//! does.

mod barrier;
mod semaphore;

pub use barrier::{BarrierGroup, WorkerControl};
pub use semaphore::Rendezvous;
