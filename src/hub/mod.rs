//! Broadcast hub with snapshot replay
//!
//! A [`MessageHub`] owns a set of subscriber sinks and forwards each
//! published message either to all of them or, when the message carries a
//! client-affinity tag, to exactly the first matching subscriber. It also
//! folds every state change it sees into a cumulative [`StateStore`]
//! snapshot and replays that snapshot into newly connected sinks, so a late
//! subscriber never misses the current value of a previously-published
//! state variable.
//!
//! [`StateStore`]: crate::state::StateStore

mod dispatch;

pub use dispatch::{ConnectCallback, MessageHub};
