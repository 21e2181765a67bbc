//! Adapter between host log records and a dlog [`Session`].

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(feature = "http")]
use crate::config::Credential;
use crate::config::{SanitizationConfig, SinkConfig};
use crate::host::Handler;
use crate::models::LogRecord;
use crate::sink::{
    on_ingest_thread, ConstructionError, Session, SessionError, SessionStats, Transport,
};

/// Observable state of a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    /// A session is live and records are shipped
    Active,
    /// Session creation failed; every operation is a no-op
    Degraded,
    /// Torn down
    Closed,
}

enum BridgeState {
    Active(Session),
    Degraded(ConstructionError),
    Closed,
}

/// Sink that forwards host log records to the ingestion service.
///
/// A bridge whose session could not be created is *degraded*: it reports the
/// failure once on stderr and then silently ignores every record, so a bad API
/// key disables remote logging without affecting any other sink. `emit` and
/// `flush` share a read lock; `teardown` takes the write lock, so a session is
/// never closed while a record is being queued.
pub struct TransportBridge {
    state: RwLock<BridgeState>,
}

impl TransportBridge {
    /// Connect to the ingestion service over HTTP.
    #[cfg(feature = "http")]
    pub fn new(
        credential: &Credential,
        sanitization: SanitizationConfig,
        config: &SinkConfig,
    ) -> Self {
        Self::from_session(Session::create(credential, sanitization, config))
    }

    /// Connect through a caller-supplied transport.
    pub fn with_transport(
        transport: Box<dyn Transport>,
        sanitization: SanitizationConfig,
        config: &SinkConfig,
    ) -> Self {
        Self::from_session(Session::with_transport(transport, sanitization, config))
    }

    /// Wrap the outcome of a session creation, degrading on failure.
    pub fn from_session(session: Result<Session, ConstructionError>) -> Self {
        let state = match session {
            Ok(session) => BridgeState::Active(session),
            Err(e) => {
                eprintln!("[dlog] {e}");
                tracing::warn!(error = %e, "dlog disabled, records will not be shipped");
                BridgeState::Degraded(e)
            }
        };
        Self {
            state: RwLock::new(state),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BridgeState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BridgeState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forward one record. Never fails; problems are counted and traced.
    ///
    /// Records logged on the ingest worker itself are ignored.
    pub fn emit(&self, record: &LogRecord) {
        if on_ingest_thread() {
            return;
        }
        if let BridgeState::Active(session) = &*self.read() {
            match session.log_with_target(record.level, &record.message, &record.target) {
                Ok(()) => {}
                Err(SessionError::QueueFull) => {
                    tracing::debug!("dlog queue full, record dropped");
                }
                Err(e) => tracing::debug!(error = %e, "dlog record not accepted"),
            }
        }
    }

    /// Block until queued records are handed to the transport.
    pub fn flush(&self) {
        if let BridgeState::Active(session) = &*self.read() {
            if let Err(e) = session.flush() {
                eprintln!("[dlog] Error during flush: {e}");
            }
        }
    }

    /// Close the session. Safe to call more than once and from shutdown paths.
    pub fn teardown(&self) {
        let previous = std::mem::replace(&mut *self.write(), BridgeState::Closed);
        if let BridgeState::Active(session) = previous {
            session.close();
        }
    }

    pub fn status(&self) -> BridgeStatus {
        match &*self.read() {
            BridgeState::Active(_) => BridgeStatus::Active,
            BridgeState::Degraded(_) => BridgeStatus::Degraded,
            BridgeState::Closed => BridgeStatus::Closed,
        }
    }

    /// Why the bridge is degraded, if it is.
    pub fn construction_error(&self) -> Option<ConstructionError> {
        match &*self.read() {
            BridgeState::Degraded(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Delivery statistics of the live session.
    pub fn stats(&self) -> Option<SessionStats> {
        match &*self.read() {
            BridgeState::Active(session) => Some(session.stats()),
            _ => None,
        }
    }
}

impl Handler for TransportBridge {
    fn emit(&self, record: &LogRecord) {
        TransportBridge::emit(self, record);
    }

    fn flush(&self) {
        TransportBridge::flush(self);
    }

    fn close(&self) {
        self.teardown();
    }
}

impl fmt::Debug for TransportBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportBridge")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Log, Severity};
    use crate::sink::TransmissionError;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    struct Recording {
        sent: Arc<Mutex<Vec<Log>>>,
        accept_key: bool,
    }

    impl Transport for Recording {
        fn verify(&mut self) -> Result<(), ConstructionError> {
            if self.accept_key {
                Ok(())
            } else {
                Err(ConstructionError::Rejected {
                    status: 403,
                    message: "Invalid API_KEY".to_string(),
                })
            }
        }

        fn send(&mut self, logs: &[Log]) -> Result<(), TransmissionError> {
            self.sent.lock().unwrap().extend_from_slice(logs);
            Ok(())
        }
    }

    fn config() -> SinkConfig {
        SinkConfig {
            flush_interval: Duration::from_secs(60),
            ..SinkConfig::default()
        }
        .without_backlog_file()
    }

    fn bridge(accept_key: bool) -> (TransportBridge, Arc<Mutex<Vec<Log>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = Recording {
            sent: sent.clone(),
            accept_key,
        };
        let bridge =
            TransportBridge::with_transport(Box::new(transport), SanitizationConfig::default(), &config());
        (bridge, sent)
    }

    #[test]
    fn test_active_bridge_ships_every_level() {
        let (bridge, sent) = bridge(true);
        assert_eq!(bridge.status(), BridgeStatus::Active);

        bridge.emit(&LogRecord::new(Severity::Debug, "low", "app"));
        bridge.emit(&LogRecord::new(Severity::Critical, "high", "app"));
        bridge.flush();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].priority, Severity::Debug);
        assert_eq!(sent[1].target.as_deref(), Some("app"));
    }

    #[test]
    fn test_rejected_key_degrades() {
        let (bridge, sent) = bridge(false);
        assert_eq!(bridge.status(), BridgeStatus::Degraded);
        assert!(matches!(
            bridge.construction_error(),
            Some(ConstructionError::Rejected { status: 403, .. })
        ));

        bridge.emit(&LogRecord::new(Severity::Error, "ignored", "app"));
        bridge.flush();
        bridge.teardown();

        assert!(sent.lock().unwrap().is_empty());
        assert_eq!(bridge.status(), BridgeStatus::Closed);
        assert!(bridge.stats().is_none());
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (bridge, sent) = bridge(true);
        bridge.emit(&LogRecord::new(Severity::Warning, "pending", "app"));

        bridge.teardown();
        bridge.teardown();
        bridge.emit(&LogRecord::new(Severity::Warning, "after close", "app"));
        bridge.flush();

        assert_eq!(bridge.status(), BridgeStatus::Closed);
        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message, "pending");
    }

    struct Stalled(crossbeam_channel::Receiver<()>);

    impl Transport for Stalled {
        fn verify(&mut self) -> Result<(), ConstructionError> {
            Ok(())
        }

        fn send(&mut self, _logs: &[Log]) -> Result<(), TransmissionError> {
            let _ = self.0.recv_timeout(Duration::from_secs(10));
            Ok(())
        }
    }

    #[test]
    fn test_stalled_network_never_blocks_host() {
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let config = SinkConfig {
            flush_timeout: Duration::from_millis(100),
            close_timeout: Duration::from_millis(100),
            ..config()
        };
        let bridge = TransportBridge::with_transport(
            Box::new(Stalled(release_rx)),
            SanitizationConfig::default(),
            &config,
        );

        let started = Instant::now();
        bridge.emit(&LogRecord::new(Severity::Error, "stuck", "app"));
        bridge.flush();
        bridge.flush();
        bridge.teardown();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(bridge.status(), BridgeStatus::Closed);
        drop(release_tx);
    }
}
