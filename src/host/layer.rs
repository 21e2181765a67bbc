//! `tracing-subscriber` layer that forwards events to a [`TransportBridge`].

use chrono::Utc;
use std::fmt::Write as FmtWrite;
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use super::CRATE_TARGET;
use crate::bridge::TransportBridge;
use crate::models::{LogRecord, Severity};
use crate::sink::on_ingest_thread;

/// A tracing Layer that ships events to dlog.
///
/// The message becomes the record message; other fields are appended as
/// `key=value` pairs. Events emitted by this crate, or on its ingest worker,
/// are ignored.
pub struct DlogLayer {
    bridge: Arc<TransportBridge>,
    threshold: Severity,
}

impl DlogLayer {
    pub fn new(bridge: Arc<TransportBridge>) -> Self {
        Self {
            bridge,
            threshold: Severity::Trace,
        }
    }

    /// Only forward events at or above `threshold`.
    pub fn with_threshold(mut self, threshold: Severity) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn bridge(&self) -> &Arc<TransportBridge> {
        &self.bridge
    }
}

impl<S> Layer<S> for DlogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(CRATE_TARGET) || on_ingest_thread() {
            return;
        }

        let level = Severity::from(metadata.level());
        if level < self.threshold {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.bridge.emit(&LogRecord {
            level,
            message: visitor.finish(),
            target: metadata.target().to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// Collects the `message` field and renders the rest as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn push_field(&mut self, name: &str, value: &dyn std::fmt::Display) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }

    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.push_field(field.name(), &format!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), &value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SanitizationConfig, SinkConfig};
    use crate::models::Log;
    use crate::sink::{ConstructionError, TransmissionError, Transport};
    use std::sync::Mutex;
    use tracing_subscriber::layer::SubscriberExt;

    struct Recording(Arc<Mutex<Vec<Log>>>);

    impl Transport for Recording {
        fn verify(&mut self) -> Result<(), ConstructionError> {
            Ok(())
        }

        fn send(&mut self, logs: &[Log]) -> Result<(), TransmissionError> {
            self.0.lock().unwrap().extend_from_slice(logs);
            Ok(())
        }
    }

    #[test]
    fn test_forwards_events_with_fields() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let bridge = Arc::new(TransportBridge::with_transport(
            Box::new(Recording(sent.clone())),
            SanitizationConfig::default(),
            &SinkConfig::default().without_backlog_file(),
        ));
        let layer = DlogLayer::new(bridge.clone()).with_threshold(Severity::Info);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "checkout", order = 42, "payment declined");
            tracing::debug!(target: "checkout", "below threshold");
            tracing::error!(target: "dlog_bridge::sink", "own diagnostics");
        });
        bridge.flush();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].priority, Severity::Warning);
        assert_eq!(sent[0].message, "payment declined order=42");
        assert_eq!(sent[0].target.as_deref(), Some("checkout"));
    }
}
