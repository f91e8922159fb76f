//! Shared infrastructure for the bus: logging setup and lock hygiene.

pub mod logging;
pub mod sync;
