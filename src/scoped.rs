//! Run a unit of work with a named logger backed by dlog.

use std::sync::Arc;

use crate::bridge::TransportBridge;
use crate::config::{Credential, SanitizationConfig, SinkConfig};
use crate::host::{Handler, Logger, LoggerRegistry};
use crate::models::Severity;

/// Name of the process-wide logger handed to wrapped functions.
pub const LOGGER_NAME: &str = "log";

/// Threshold used when none is given.
pub const DEFAULT_THRESHOLD: Severity = Severity::Warning;

/// Wraps calls so they log through a dlog-backed logger and always flush afterwards.
///
/// The bridge is connected once, when the `ScopedLogging` is created. The
/// logger comes from [`LoggerRegistry::global`] and is shared with every other
/// user of the same name. Each call sets the logger's threshold, attaches the
/// bridge if it is not attached yet, runs the function, and flushes the bridge
/// on the way out, including when the function panics.
///
/// ```no_run
/// use dlog_bridge::{Credential, SanitizationConfig, ScopedLogging, Severity};
///
/// let scoped = ScopedLogging::new(
///     &Credential::from_env("DLOG_API_KEY").unwrap(),
///     Some(Severity::Warning),
///     SanitizationConfig::default().with_credit_cards(true),
/// );
///
/// let greet = scoped.wrap(|logger, name: &str| {
///     logger.warning(format!("Hello {name}!"));
///     name.len()
/// });
/// assert_eq!(greet("World"), 5);
/// ```
pub struct ScopedLogging {
    logger: Arc<Logger>,
    bridge: Arc<TransportBridge>,
    threshold: Severity,
}

impl ScopedLogging {
    /// Connect to dlog with default delivery settings.
    pub fn new(
        credential: &Credential,
        threshold: Option<Severity>,
        sanitization: SanitizationConfig,
    ) -> Self {
        Self::with_sink_config(credential, threshold, sanitization, &SinkConfig::default())
    }

    pub fn with_sink_config(
        credential: &Credential,
        threshold: Option<Severity>,
        sanitization: SanitizationConfig,
        sink: &SinkConfig,
    ) -> Self {
        let bridge = Arc::new(crate::builder::connect(credential, sanitization, sink));
        Self::with_bridge(bridge, threshold)
    }

    /// Use an existing bridge with the process-wide logger.
    pub fn with_bridge(bridge: Arc<TransportBridge>, threshold: Option<Severity>) -> Self {
        Self::with_logger(LoggerRegistry::global().logger(LOGGER_NAME), bridge, threshold)
    }

    /// Use an existing bridge with a specific logger.
    pub fn with_logger(
        logger: Arc<Logger>,
        bridge: Arc<TransportBridge>,
        threshold: Option<Severity>,
    ) -> Self {
        Self {
            logger,
            bridge,
            threshold: threshold.unwrap_or(DEFAULT_THRESHOLD),
        }
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    pub fn bridge(&self) -> &Arc<TransportBridge> {
        &self.bridge
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    fn handler(&self) -> Arc<dyn Handler> {
        self.bridge.clone()
    }

    fn prepare(&self) {
        self.logger.set_level(self.threshold);
        self.logger.add_handler(self.handler());
    }

    /// Run `f` with the logger, then flush the bridge.
    pub fn run<R>(&self, f: impl FnOnce(&Logger) -> R) -> R {
        self.prepare();
        let _flush = FlushGuard(&self.bridge);
        f(&self.logger)
    }

    /// Turn `f(logger, args)` into `g(args)`. Use a tuple for several arguments.
    pub fn wrap<A, R, F>(self, f: F) -> impl Fn(A) -> R
    where
        F: Fn(&Logger, A) -> R,
    {
        move |args| self.run(|logger| f(logger, args))
    }

    /// Detach the bridge from the logger and close its session.
    pub fn teardown(&self) {
        self.logger.remove_handler(&self.handler());
        self.bridge.teardown();
    }
}

/// Flushes the bridge when dropped, so unwinding out of a wrapped call flushes too.
struct FlushGuard<'a>(&'a TransportBridge);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.flush();
    }
}
