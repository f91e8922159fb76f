//! Synchronized state store
//!
//! A nested dictionary (context -> variable -> [`Value`]) with optional
//! numeric ranges, whose mutations are observable: every operation that
//! actually changes a value emits a state-change message through the sink it
//! is given, tagged with context, variable and terminality. The hub keeps
//! one of these as its cumulative snapshot and replays it to late
//! subscribers.
//!
//! [`Value`]: crate::message::Value

mod store;

pub use store::StateStore;
