//! dlog bridge - ship application logs to the dlog ingestion service.
//!
//! Records produced by the host logging framework are sanitized, queued, and
//! delivered in batches by a background worker. Logging never fails from the
//! application's point of view: a rejected API key degrades the bridge to a
//! no-op, and delivery problems are retried, backlogged, or counted.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────┐   ┌───────────┐   ┌─────────────┐
//! │ Logger / log │──▶│ TransportBridge │──▶│  Session  │──▶│   Worker    │──▶ HTTP
//! │ / tracing    │   │ Active|Degraded │   │ sanitize  │   │ batch/retry │
//! └──────────────┘   └─────────────────┘   │ + enqueue │   │  backlog    │
//!                                          └───────────┘   └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use dlog_bridge::{Credential, SanitizationConfig, ScopedLogging};
//!
//! let scoped = ScopedLogging::new(
//!     &Credential::from_env("DLOG_API_KEY").unwrap_or_else(|_| Credential::new("")),
//!     None,
//!     SanitizationConfig::all(),
//! );
//!
//! scoped.run(|logger| logger.warning("Hello World!"));
//! ```

pub mod bridge;
pub mod builder;
pub mod config;
pub mod host;
pub mod models;
pub mod sanitize;
pub mod scoped;
pub mod sink;

// Re-export key types at crate root for convenience
pub use bridge::{BridgeStatus, TransportBridge};
pub use builder::{configure, Builder};
pub use config::{Config, ConfigError, Credential, SanitizationConfig, SinkConfig};
pub use host::{ConsoleHandler, DlogLayer, Handler, LogAdapter, Logger, LoggerRegistry};
pub use models::{Log, LogRecord, Severity};
pub use sanitize::sanitize;
pub use scoped::ScopedLogging;
pub use sink::{
    ConstructionError, Session, SessionError, SessionStats, TransmissionError, Transport,
};

#[cfg(feature = "http")]
pub use sink::HttpTransport;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
