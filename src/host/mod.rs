//! Host-side logging surface.
//!
//! A minimal named-logger framework with pluggable [`Handler`] sinks, plus
//! adapters that let the `log` facade and `tracing-subscriber` feed a
//! [`TransportBridge`](crate::TransportBridge).

mod console;
mod layer;
mod log_compat;
mod logger;

use crate::models::LogRecord;

pub use console::ConsoleHandler;
pub use layer::DlogLayer;
pub use log_compat::LogAdapter;
pub use logger::{Logger, LoggerRegistry, DEFAULT_LEVEL};

/// Target prefix of this crate's own diagnostics. Adapters drop these so the
/// bridge never ships its own chatter back to itself.
pub(crate) const CRATE_TARGET: &str = "dlog_bridge";

/// A sink attached to a [`Logger`].
pub trait Handler: Send + Sync {
    /// Handle one record that passed the logger's threshold.
    fn emit(&self, record: &LogRecord);

    /// Push out anything buffered.
    fn flush(&self) {}

    /// Called once when the handler is detached from its logger.
    fn close(&self) {}
}
