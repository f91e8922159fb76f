//! mediabus — typed message bus and synchronized state core
//!
//! The concurrency backbone of a desktop media framework: every component
//! (player, database, HTTP server, frontends/backends, resource manager)
//! talks through the primitives in this crate. Codec plumbing, rendering,
//! protocol stacks and persistence are external collaborators that terminate
//! at a sink/hub boundary; this crate is transport-agnostic and defines no
//! wire format.
//!
//! ```text
//!              commands                      events / state
//!  callers ──► MessageSink ──► component ──► MessageHub ──► subscriber sinks
//!                 (queue)        thread       │   ▲               (replayed
//!                                             │   │ StateStore     snapshot
//!                                             ▼   │ .set/.apply    on connect)
//!                                          snapshot
//! ```
//!
//! - [`message`]: self-describing, copyable [`Message`](message::Message)
//!   values with typed arguments and a coalescing seam.
//! - [`queue`]: single-consumer slot-ring queue with merge-on-write, plus
//!   the [`MessageSink`](queue::MessageSink) endpoint handle.
//! - [`hub`]: broadcast/selective dispatch with snapshot replay for late
//!   subscribers.
//! - [`state`]: the observable nested key/value store.
//! - [`control`]: the per-component command-sink/event-hub pair and the
//!   blocking `call_function` bridge.
//! - [`sync`]: rendezvous semaphore and the worker-thread barrier group.
//!
//! Everything runs on preemptive OS threads; there is no async runtime.
//! Blocking is confined to queue reads, barrier waits and the
//! `call_function` poll loop.

pub mod control;
pub mod core;
pub mod hub;
pub mod message;
pub mod queue;
pub mod state;
pub mod sync;
