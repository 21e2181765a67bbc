//! Builder for installing dlog behind the `log` facade.

use log::{Level, SetLoggerError};
use std::sync::Arc;

use crate::bridge::TransportBridge;
use crate::config::{Config, Credential, SanitizationConfig, SinkConfig, API_KEY_ENV};
use crate::host::LogAdapter;
use crate::sink::Transport;

/// Configures dlog with the given API key and both sanitizers enabled, and
/// installs it as the global `log` logger.
///
/// # Examples
///
/// ```no_run
/// dlog_bridge::configure("<API_KEY>").expect("no other logger installed");
///
/// log::warn!("Hello from Rust!");
///
/// // Flushes all remaining logs before the app exits
/// log::logger().flush();
/// ```
pub fn configure(api_key: impl Into<String>) -> Result<Arc<TransportBridge>, SetLoggerError> {
    Builder::new()
        .with_api_key(api_key)
        .with_email_sanitizer()
        .with_credit_card_sanitizer()
        .install()
}

/// Fine-grained dlog setup.
///
/// # Examples
///
/// ```no_run
/// use dlog_bridge::Builder;
///
/// let bridge = Builder::new()
///     .with_env_api_key("DLOG_API_KEY")
///     .with_level(log::Level::Info)
///     .with_credit_card_sanitizer()
///     .install()
///     .expect("no other logger installed");
///
/// log::info!("Hello from Rust!");
///
/// bridge.teardown();
/// ```
pub struct Builder {
    credential: Option<Credential>,
    level: Level,
    sanitization: SanitizationConfig,
    sink: SinkConfig,
    transport: Option<Box<dyn Transport>>,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            credential: None,
            level: Level::Debug,
            sanitization: SanitizationConfig::default(),
            sink: SinkConfig::default(),
            transport: None,
        }
    }

    /// Use this API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.credential = Some(Credential::new(api_key));
        self
    }

    /// Read the API key from an environment variable. A missing variable leaves
    /// the key empty, which degrades the bridge instead of failing.
    pub fn with_env_api_key(mut self, env_var: &str) -> Self {
        self.credential = Some(Credential::from_env(env_var).unwrap_or_else(|_| Credential::new("")));
        self
    }

    /// Minimum level a `log` record needs to be shipped.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Best-effort removal of e-mail addresses.
    pub fn with_email_sanitizer(mut self) -> Self {
        self.sanitization.emails = true;
        self
    }

    /// Best-effort removal of payment-card numbers.
    pub fn with_credit_card_sanitizer(mut self) -> Self {
        self.sanitization.credit_cards = true;
        self
    }

    pub fn with_sanitization(mut self, sanitization: SanitizationConfig) -> Self {
        self.sanitization = sanitization;
        self
    }

    pub fn with_sink_config(mut self, sink: SinkConfig) -> Self {
        self.sink = sink;
        self
    }

    /// Take delivery and sanitization settings from a loaded [`Config`].
    pub fn with_config(self, config: Config) -> Self {
        self.with_sink_config(config.sink)
            .with_sanitization(config.sanitization)
    }

    /// Deliver through a custom transport instead of HTTP. The API key is not used.
    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the bridge without installing it anywhere.
    ///
    /// Falls back to `DLOG_API_KEY` when no key was given.
    pub fn build(self) -> Arc<TransportBridge> {
        if let Some(transport) = self.transport {
            return Arc::new(TransportBridge::with_transport(
                transport,
                self.sanitization,
                &self.sink,
            ));
        }

        let credential = self
            .credential
            .or_else(|| Credential::from_env(API_KEY_ENV).ok())
            .unwrap_or_else(|| Credential::new(""));
        Arc::new(connect(&credential, self.sanitization, &self.sink))
    }

    /// Build the bridge and install it as the global `log` logger.
    pub fn install(self) -> Result<Arc<TransportBridge>, SetLoggerError> {
        let level = self.level;
        let bridge = self.build();
        log::set_boxed_logger(Box::new(LogAdapter::new(bridge.clone(), level.to_level_filter())))?;
        log::set_max_level(level.to_level_filter());
        Ok(bridge)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
pub(crate) fn connect(
    credential: &Credential,
    sanitization: SanitizationConfig,
    sink: &SinkConfig,
) -> TransportBridge {
    TransportBridge::new(credential, sanitization, sink)
}

#[cfg(not(feature = "http"))]
pub(crate) fn connect(
    _credential: &Credential,
    _sanitization: SanitizationConfig,
    _sink: &SinkConfig,
) -> TransportBridge {
    TransportBridge::from_session(Err(crate::sink::ConstructionError::Client(
        "built without the http feature".to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeStatus;
    use crate::sink::ConstructionError;

    #[test]
    fn test_missing_key_degrades() {
        let bridge = Builder::new()
            .with_env_api_key("DLOG_BRIDGE_TEST_UNSET_VARIABLE")
            .with_sink_config(SinkConfig::default().without_backlog_file())
            .build();
        assert_eq!(bridge.status(), BridgeStatus::Degraded);
        if cfg!(feature = "http") {
            assert_eq!(
                bridge.construction_error(),
                Some(ConstructionError::EmptyCredential)
            );
        }
    }

    #[test]
    fn test_with_config() {
        let mut config = Config::default();
        config.sanitization.emails = true;
        config.sink = config.sink.with_endpoint("http://127.0.0.1:9/").without_backlog_file();

        let builder = Builder::new().with_config(config);
        assert!(builder.sanitization.emails);
        assert_eq!(builder.sink.endpoint, "http://127.0.0.1:9/");
        assert!(builder.sink.backlog_path.is_none());
    }

    #[test]
    fn test_sanitizer_switches() {
        let builder = Builder::new().with_email_sanitizer();
        assert!(builder.sanitization.emails);
        assert!(!builder.sanitization.credit_cards);
        let builder = builder.with_credit_card_sanitizer();
        assert_eq!(builder.sanitization, SanitizationConfig::all());
    }
}
