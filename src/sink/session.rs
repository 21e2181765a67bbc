//! A live connection context to the ingestion service.

use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::stats::{DeliveryStats, SessionStats};
use super::worker::{self, Signal, WorkerSettings};
use super::{ConstructionError, Transport};
#[cfg(feature = "http")]
use crate::config::Credential;
use crate::config::{SanitizationConfig, SinkConfig};
use crate::models::{Log, Severity};
use crate::sanitize::Sanitizers;

/// Session errors. The bridge reports these and never passes them to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session was closed
    Closed,
    /// The queue is full and the record was dropped
    QueueFull,
    /// The worker did not confirm a flush within the flush timeout
    FlushTimeout,
    /// The worker thread is gone
    WorkerGone,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Closed => write!(f, "Session is closed"),
            SessionError::QueueFull => write!(f, "Log queue is full, record dropped"),
            SessionError::FlushTimeout => write!(f, "Timed out waiting for flush"),
            SessionError::WorkerGone => write!(f, "Ingest worker is not running"),
        }
    }
}

impl std::error::Error for SessionError {}

struct WorkerHandle {
    thread: JoinHandle<()>,
    done: Receiver<()>,
}

/// One live connection context to the ingestion service.
///
/// Records are sanitized on the calling thread, then queued for a dedicated
/// `dlog-ingest` worker that batches them and owns the transport. `log` never
/// blocks; `flush` blocks for at most the configured flush timeout.
pub struct Session {
    id: String,
    sender: Sender<Signal>,
    sanitizers: Sanitizers,
    host: Option<String>,
    stats: Arc<DeliveryStats>,
    closed: AtomicBool,
    worker: Mutex<Option<WorkerHandle>>,
    flush_timeout: Duration,
    close_timeout: Duration,
}

impl Session {
    /// Create a session talking HTTP to `config.endpoint`.
    #[cfg(feature = "http")]
    pub fn create(
        credential: &Credential,
        sanitization: SanitizationConfig,
        config: &SinkConfig,
    ) -> Result<Self, ConstructionError> {
        if credential.is_empty() {
            return Err(ConstructionError::EmptyCredential);
        }
        let transport = super::HttpTransport::new(credential, config)?;
        Self::with_transport(Box::new(transport), sanitization, config)
    }

    /// Create a session over an arbitrary transport.
    ///
    /// Spawns the worker, which probes the credential with `Transport::verify`.
    /// Fails if the probe fails or does not answer within `connect_timeout`.
    pub fn with_transport(
        transport: Box<dyn Transport>,
        sanitization: SanitizationConfig,
        config: &SinkConfig,
    ) -> Result<Self, ConstructionError> {
        let (sender, receiver) = bounded(config.queue_capacity.max(1));
        let (ready_tx, ready_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        let stats = Arc::new(DeliveryStats::new());

        let worker_stats = stats.clone();
        let settings = WorkerSettings::from(config);
        let thread = std::thread::Builder::new()
            .name("dlog-ingest".to_string())
            .spawn(move || worker::run(transport, receiver, ready_tx, done_tx, worker_stats, settings))
            .map_err(|e| ConstructionError::Client(format!("Failed to spawn ingest worker: {e}")))?;

        match ready_rx.recv_timeout(config.connect_timeout) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(RecvTimeoutError::Timeout) => return Err(ConstructionError::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ConstructionError::Client(
                    "Ingest worker exited during startup".to_string(),
                ))
            }
        }

        let host = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().to_string());

        let session = Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            sanitizers: Sanitizers::from_config(&sanitization),
            host,
            stats,
            closed: AtomicBool::new(false),
            worker: Mutex::new(Some(WorkerHandle {
                thread,
                done: done_rx,
            })),
            flush_timeout: config.flush_timeout,
            close_timeout: config.close_timeout,
        };

        tracing::debug!(
            session = %session.id,
            sanitizers = ?session.sanitizers,
            "dlog session established"
        );
        Ok(session)
    }

    /// Unique id of this session.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sanitize and queue one message.
    pub fn log(&self, level: Severity, message: &str) -> Result<(), SessionError> {
        self.enqueue(level, message, None)
    }

    /// Like [`Session::log`], tagging the record with its origin.
    pub fn log_with_target(
        &self,
        level: Severity,
        message: &str,
        target: &str,
    ) -> Result<(), SessionError> {
        self.enqueue(level, message, Some(target))
    }

    fn enqueue(
        &self,
        level: Severity,
        message: &str,
        target: Option<&str>,
    ) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let mut log = Log::new(level, self.sanitizers.apply(message).into_owned());
        log.host = self.host.clone();
        log.target = target.map(str::to_string);

        match self.sender.try_send(Signal::Log(log)) {
            Ok(()) => {
                self.stats.record_accepted();
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.record_dropped(1);
                Err(SessionError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(SessionError::WorkerGone),
        }
    }

    /// Block until every record accepted so far has been handed to the transport.
    pub fn flush(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let deadline = Instant::now() + self.flush_timeout;
        let (ack_tx, ack_rx) = bounded(1);

        self.sender
            .send_deadline(Signal::Flush(ack_tx), deadline)
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => SessionError::FlushTimeout,
                SendTimeoutError::Disconnected(_) => SessionError::WorkerGone,
            })?;

        ack_rx.recv_deadline(deadline).map_err(|e| match e {
            RecvTimeoutError::Timeout => SessionError::FlushTimeout,
            RecvTimeoutError::Disconnected => SessionError::WorkerGone,
        })
    }

    /// Deliver what is left, stop the worker, and release the transport.
    ///
    /// Idempotent. Waits at most the close timeout for the worker, then detaches it.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return;
        };

        let deadline = Instant::now() + self.close_timeout;
        if self.sender.send_deadline(Signal::Exit, deadline).is_err() {
            tracing::debug!(session = %self.id, "Ingest worker did not take the exit signal");
        }

        match handle.done.recv_deadline(deadline) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.thread.join().is_err() {
                    eprintln!("[dlog] Ingest worker panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(session = %self.id, "Ingest worker did not stop in time, detaching");
            }
        }

        tracing::debug!(session = %self.id, stats = %self.stats().summary(), "dlog session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.snapshot()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("sanitizers", &self.sanitizers)
            .finish()
    }
}
