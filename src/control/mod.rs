//! Controllable: the standard bidirectional component handle
//!
//! Every stateful component exposes one [`Controllable`]: an inbound command
//! sink that the component drains on its own thread, plus an outbound event
//! hub that observers connect their sinks to. [`Controllable::call_function`]
//! bridges this message-passing substrate to blocking RPC-style calls.

mod controllable;

pub use controllable::Controllable;
