//! `log` facade adapter.

use chrono::Utc;
use log::{LevelFilter, Metadata, Record};
use std::sync::Arc;

use super::CRATE_TARGET;
use crate::bridge::TransportBridge;
use crate::models::LogRecord;
use crate::sink::on_ingest_thread;

/// Routes `log` macros into a [`TransportBridge`].
pub struct LogAdapter {
    bridge: Arc<TransportBridge>,
    level: LevelFilter,
}

impl LogAdapter {
    pub fn new(bridge: Arc<TransportBridge>, level: LevelFilter) -> Self {
        Self { bridge, level }
    }

    pub fn bridge(&self) -> &Arc<TransportBridge> {
        &self.bridge
    }
}

impl log::Log for LogAdapter {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
            && !metadata.target().starts_with(CRATE_TARGET)
            && !on_ingest_thread()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.bridge.emit(&LogRecord {
            level: record.level().into(),
            message: record.args().to_string(),
            target: record.target().to_string(),
            timestamp: Utc::now(),
        });
    }

    fn flush(&self) {
        self.bridge.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SanitizationConfig, SinkConfig};
    use crate::models::Log as WireLog;
    use crate::sink::{ConstructionError, TransmissionError, Transport};
    use log::Log;
    use std::sync::{Mutex, OnceLock};

    struct Recording(Arc<Mutex<Vec<WireLog>>>);

    impl Transport for Recording {
        fn verify(&mut self) -> Result<(), ConstructionError> {
            Ok(())
        }

        fn send(&mut self, logs: &[WireLog]) -> Result<(), TransmissionError> {
            self.0.lock().unwrap().extend_from_slice(logs);
            Ok(())
        }
    }

    #[test]
    fn test_filters_level_and_own_target() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let bridge = Arc::new(TransportBridge::with_transport(
            Box::new(Recording(sent.clone())),
            SanitizationConfig::default(),
            &SinkConfig::default().without_backlog_file(),
        ));
        let adapter = LogAdapter::new(bridge, LevelFilter::Info);

        adapter.log(
            &Record::builder()
                .level(log::Level::Warn)
                .target("app")
                .args(format_args!("shipped"))
                .build(),
        );
        adapter.log(
            &Record::builder()
                .level(log::Level::Debug)
                .target("app")
                .args(format_args!("too verbose"))
                .build(),
        );
        adapter.log(
            &Record::builder()
                .level(log::Level::Error)
                .target("dlog_bridge::sink")
                .args(format_args!("internal"))
                .build(),
        );
        adapter.flush();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message, "shipped");
    }

    /// Logs through the installed adapter on every delivery, like an HTTP client
    /// with debug logging enabled.
    struct Chatty {
        sent: Arc<Mutex<Vec<WireLog>>>,
        adapter: Arc<OnceLock<LogAdapter>>,
    }

    impl Transport for Chatty {
        fn verify(&mut self) -> Result<(), ConstructionError> {
            Ok(())
        }

        fn send(&mut self, logs: &[WireLog]) -> Result<(), TransmissionError> {
            self.sent.lock().unwrap().extend_from_slice(logs);
            if let Some(adapter) = self.adapter.get() {
                adapter.log(
                    &Record::builder()
                        .level(log::Level::Debug)
                        .target("hyper::proto::h1::io")
                        .args(format_args!("flushed 253 bytes"))
                        .build(),
                );
            }
            Ok(())
        }
    }

    #[test]
    fn test_transport_logs_are_not_shipped() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let slot = Arc::new(OnceLock::new());
        let transport = Chatty {
            sent: sent.clone(),
            adapter: slot.clone(),
        };
        let bridge = Arc::new(TransportBridge::with_transport(
            Box::new(transport),
            SanitizationConfig::default(),
            &SinkConfig::default().without_backlog_file(),
        ));
        let _ = slot.set(LogAdapter::new(bridge.clone(), LevelFilter::Debug));
        let adapter = slot.get().unwrap();

        adapter.log(
            &Record::builder()
                .level(log::Level::Warn)
                .target("app")
                .args(format_args!("one user record"))
                .build(),
        );
        adapter.flush();
        adapter.flush();
        bridge.teardown();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message, "one user record");
    }
}
