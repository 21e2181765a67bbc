//! Record types shared by the host adapters, the session, and the wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered log severity.
///
/// Ordering follows urgency: `Trace < Debug < Info < Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Trace,
    Debug,
    #[serde(rename = "Informational")]
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Map a numeric level (10 = debug ... 50 = critical) to a severity.
    ///
    /// Values below 10 map to `Trace`, values above 50 to `Critical`, and values
    /// between the named steps round down.
    pub fn from_level_number(level: i32) -> Self {
        match level {
            i32::MIN..=9 => Severity::Trace,
            10..=19 => Severity::Debug,
            20..=29 => Severity::Info,
            30..=39 => Severity::Warning,
            40..=49 => Severity::Error,
            _ => Severity::Critical,
        }
    }

    /// Upper-case name used by local sinks.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<log::Level> for Severity {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Severity::Error,
            log::Level::Warn => Severity::Warning,
            log::Level::Info => Severity::Info,
            log::Level::Debug => Severity::Debug,
            log::Level::Trace => Severity::Trace,
        }
    }
}

impl From<&tracing::Level> for Severity {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Severity::Error,
            tracing::Level::WARN => Severity::Warning,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::DEBUG => Severity::Debug,
            _ => Severity::Trace,
        }
    }
}

/// A record handed to a sink by the host logging framework.
///
/// The message is already formatted; timestamp and target are supplied by the host.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Severity,
    pub message: String,
    pub target: String,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    pub fn new(level: Severity, message: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            target: target.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A single log line as the ingestion service stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub timestamp: DateTime<Utc>,
    pub priority: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl Log {
    pub fn new(priority: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            priority,
            message: message.into(),
            host: None,
            target: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Request body of the ingestion endpoint. An empty batch doubles as the credential probe.
#[derive(Debug, Serialize)]
pub struct LogRequest<'a> {
    pub logs: &'a [Log],
}

impl<'a> LogRequest<'a> {
    pub fn new(logs: &'a [Log]) -> Self {
        Self { logs }
    }
}
