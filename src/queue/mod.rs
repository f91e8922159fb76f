//! Single-consumer message queue and sink
//!
//! The queue is a ring of reusable slots, each holding one [`Message`] plus
//! a "produced" [`Rendezvous`] semaphore. Producers serialize on a write
//! lock and populate the current write slot in place; committing either
//! coalesces the message into the most recent committed-but-unread slot
//! (merge-on-write) or moves it into a fresh/recycled slot and posts that
//! slot's rendezvous exactly once. The single reader parks on the oldest
//! slot's rendezvous, so a blocked reader never stalls a writer negotiating
//! the ring.
//!
//! ```text
//!  producer A ──┐  lock_write / commit        read / try_read
//!  producer B ──┼──► [ w ]──► ┌───┬───┬───┬───┐ ──────► single reader
//!  producer C ──┘   scratch   │ 1 │ 2 │ . │ . │   (slots recycled to tail)
//!                             └───┴───┴───┴───┘
//!                               ▲ merge target: newest committed slot only
//! ```
//!
//! [`MessageSink`] is the producer/consumer-facing handle: asynchronous
//! sinks own a queue and drain it through `run_pending`; synchronous sinks
//! call their handler inline from `post` on the caller's stack frame.
//!
//! [`Message`]: crate::message::Message
//! [`Rendezvous`]: crate::sync::Rendezvous

mod error;
mod ring;
mod sink;

pub use error::{QueueError, QueueResult};
pub use ring::{MessageQueue, WriteGuard};
pub use sink::{MessageHandler, MessageSink};

#[cfg(test)]
mod tests;
