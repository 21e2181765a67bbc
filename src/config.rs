//! Configuration for the dlog bridge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable the API key is read from by default.
pub const API_KEY_ENV: &str = "DLOG_API_KEY";

/// Default ingestion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://log.dlog.cloud";

/// API key identifying the caller to the ingestion service.
///
/// Validity is only known after a round-trip to the service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the key from an environment variable.
    pub fn from_env(var: &str) -> Result<Self, ConfigError> {
        std::env::var(var)
            .map(Self)
            .map_err(|_| ConfigError::MissingEnv(var.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(****)")
    }
}

impl From<&str> for Credential {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Credential {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

/// Which categories of sensitive data are redacted before transmission.
///
/// Flags are independent; all are off unless the caller opts in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizationConfig {
    #[serde(default)]
    pub emails: bool,
    #[serde(default)]
    pub credit_cards: bool,
}

impl SanitizationConfig {
    /// Every sanitizer enabled.
    pub fn all() -> Self {
        Self {
            emails: true,
            credit_cards: true,
        }
    }

    pub fn with_emails(mut self, enabled: bool) -> Self {
        self.emails = enabled;
        self
    }

    pub fn with_credit_cards(mut self, enabled: bool) -> Self {
        self.credit_cards = enabled;
        self
    }

    pub fn any_enabled(&self) -> bool {
        self.emails || self.credit_cards
    }
}

/// Delivery settings for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Ingestion endpoint URL
    pub endpoint: String,

    /// Timeout of a single HTTP request
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,

    /// How long session creation waits for the credential probe
    #[serde(with = "duration_millis")]
    pub connect_timeout: Duration,

    /// Upper bound on a blocking flush
    #[serde(with = "duration_millis")]
    pub flush_timeout: Duration,

    /// Upper bound on waiting for the worker during close
    #[serde(with = "duration_millis")]
    pub close_timeout: Duration,

    /// Buffered records are shipped at least this often
    #[serde(with = "duration_millis")]
    pub flush_interval: Duration,

    /// Maximum records per request
    pub batch_size: usize,

    /// Capacity of the in-process queue; records beyond it are dropped
    pub queue_capacity: usize,

    /// Delivery attempts per batch before it moves to the backlog
    pub max_retries: u32,

    /// Base delay between attempts, multiplied by the attempt number
    #[serde(with = "duration_millis")]
    pub retry_backoff: Duration,

    /// How often the backlog is retried
    #[serde(with = "duration_millis")]
    pub retry_interval: Duration,

    /// Maximum records kept in the backlog
    pub backlog_capacity: usize,

    /// File the backlog is persisted to on shutdown; `None` keeps it in memory only
    pub backlog_path: Option<PathBuf>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            flush_timeout: Duration::from_secs(5),
            close_timeout: Duration::from_secs(10),
            flush_interval: Duration::from_secs(1),
            batch_size: 1_000,
            queue_capacity: 1_000,
            max_retries: 3,
            retry_backoff: Duration::from_millis(250),
            retry_interval: Duration::from_secs(5),
            backlog_capacity: 10_000,
            backlog_path: Some(Self::default_backlog_path()),
        }
    }
}

impl SinkConfig {
    /// Default location of the persisted backlog.
    pub fn default_backlog_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dlog")
            .join("backlog.jsonl")
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn without_backlog_file(mut self) -> Self {
        self.backlog_path = None;
        self
    }
}

/// Complete on-disk configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub sanitization: SanitizationConfig,
}

impl Config {
    /// Load configuration from the default location, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `config_path` (defaults when missing), then apply
    /// environment overrides.
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?
        } else {
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dlog")
            .join("config.json")
    }

    /// Override fields from `DLOG_ENDPOINT`, `DLOG_SANITIZE_EMAILS` and `DLOG_SANITIZE_CREDIT_CARDS`.
    pub fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var("DLOG_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                self.sink.endpoint = endpoint.trim().to_string();
            }
        }
        if let Some(flag) = env_flag("DLOG_SANITIZE_EMAILS") {
            self.sanitization.emails = flag;
        }
        if let Some(flag) = env_flag("DLOG_SANITIZE_CREDIT_CARDS") {
            self.sanitization.credit_cards = flag;
        }
    }
}

fn env_flag(var: &str) -> Option<bool> {
    std::env::var(var).ok().and_then(|v| parse_flag(&v))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    MissingEnv(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::MissingEnv(var) => write!(f, "Environment variable {var} is not set"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_VARS: [&str; 3] = [
        "DLOG_ENDPOINT",
        "DLOG_SANITIZE_EMAILS",
        "DLOG_SANITIZE_CREDIT_CARDS",
    ];

    fn temp_config_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("dlog-config-test-{}", uuid::Uuid::new_v4()))
            .join("config.json")
    }

    // Env overrides and file round trip share one test so nothing else in this
    // binary observes the variables.
    #[test]
    fn test_env_overrides_and_round_trip() {
        let path = temp_config_path();

        let missing = Config::load_from(&path).unwrap();
        assert_eq!(missing.sink.endpoint, DEFAULT_ENDPOINT);
        assert!(!missing.sanitization.any_enabled());

        let mut config = Config::default();
        config.sink.batch_size = 50;
        config.sink.flush_timeout = Duration::from_millis(750);
        config.sanitization.credit_cards = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.sink.batch_size, 50);
        assert_eq!(loaded.sink.flush_timeout, Duration::from_millis(750));
        assert_eq!(loaded.sink.backlog_path, config.sink.backlog_path);
        assert!(loaded.sanitization.credit_cards);

        std::env::set_var("DLOG_ENDPOINT", "  http://127.0.0.1:9/ingest ");
        std::env::set_var("DLOG_SANITIZE_EMAILS", "yes");
        std::env::set_var("DLOG_SANITIZE_CREDIT_CARDS", "off");
        let overridden = Config::load_from(&path).unwrap();
        for var in ENV_VARS {
            std::env::remove_var(var);
        }

        assert_eq!(overridden.sink.endpoint, "http://127.0.0.1:9/ingest");
        assert!(overridden.sanitization.emails);
        assert!(!overridden.sanitization.credit_cards);
        assert_eq!(overridden.sink.batch_size, 50);

        std::env::set_var("DLOG_SANITIZE_EMAILS", "maybe");
        let mut untouched = Config::default();
        untouched.apply_env();
        std::env::remove_var("DLOG_SANITIZE_EMAILS");
        assert!(!untouched.sanitization.emails);
        assert_eq!(untouched.sink.endpoint, DEFAULT_ENDPOINT);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_sanitization_defaults_off() {
        let config = SanitizationConfig::default();
        assert!(!config.emails);
        assert!(!config.credit_cards);
        assert!(!config.any_enabled());
        assert!(SanitizationConfig::all().any_enabled());
    }

    #[test]
    fn test_credential_debug_hides_key() {
        let credential = Credential::new("super-secret");
        assert!(!format!("{credential:?}").contains("super-secret"));
        assert!(Credential::new("   ").is_empty());
    }

    #[test]
    fn test_default_sink_config() {
        let config = SinkConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.flush_timeout, Duration::from_secs(5));
        assert_eq!(config.batch_size, 1_000);
        assert!(config.backlog_path.is_some());
        assert!(config.without_backlog_file().backlog_path.is_none());
    }

    #[test]
    fn test_partial_config_parsing() {
        let config: Config =
            serde_json::from_str(r#"{"sink": {"flush_timeout": 250}, "sanitization": {"emails": true}}"#)
                .unwrap();
        assert_eq!(config.sink.flush_timeout, Duration::from_millis(250));
        assert_eq!(config.sink.batch_size, 1_000);
        assert!(config.sanitization.emails);
        assert!(!config.sanitization.credit_cards);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
