//! Logging setup for bus owners
//!
//! The bus itself only talks through the `log` facade; it never prints. This
//! module gives binaries and tests a one-call `flexi_logger` bootstrap so the
//! lifecycle warnings the bus emits (double disconnects, sinks dropped while
//! connected, and so on) are actually visible somewhere.

use flexi_logger::{Logger, LoggerHandle};
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<Option<LoggerHandle>> = OnceCell::new();

/// Initialise process-wide logging, honouring `RUST_LOG` over `default_spec`.
///
/// Safe to call more than once; only the first call configures the logger.
/// Returns false when the logger could not be started (for instance because
/// the host application already installed its own `log` backend), which is
/// not an error from the bus's point of view.
pub fn init_logging(default_spec: &str) -> bool {
    LOGGER
        .get_or_init(|| {
            Logger::try_with_env_or_str(default_spec)
                .and_then(|logger| logger.start())
                .ok()
        })
        .is_some()
}
