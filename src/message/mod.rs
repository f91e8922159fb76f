//! Message types for the bus
//!
//! A [`Message`] is a self-describing, copyable unit of data: an integer
//! namespace (domain tag), an integer id (operation tag), header metadata
//! and an ordered list of typed [`Value`] arguments. Messages have no queue
//! affinity; they are cloned on enqueue, never shared by pointer across
//! threads, consumed exactly once per subscriber, and reset when their queue
//! slot is recycled.
//!
//! Coalescing of supersede-able updates is expressed through the
//! [`Coalesce`] trait rather than any byte-level heuristic, so message kinds
//! keep control over what "same logical key" means.

mod types;
mod value;

pub use types::{Coalesce, Message, MessageHeader, MSG_STATE_CHANGED, STATE_NAMESPACE};
pub use value::Value;
