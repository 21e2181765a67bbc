//! Background ingest loop owned by a session.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::backlog::Backlog;
use super::stats::DeliveryStats;
use super::{ConstructionError, Transport};
use crate::config::SinkConfig;
use crate::models::Log;

/// Longest the loop waits for a signal before checking its timers.
const MAX_LOOP_INTERVAL: Duration = Duration::from_millis(100);

thread_local! {
    static INGEST_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Whether the caller runs on an ingest worker. Records logged there come from
/// the transport and its HTTP stack and must not be shipped again.
pub(crate) fn on_ingest_thread() -> bool {
    INGEST_THREAD.with(Cell::get)
}

pub(crate) enum Signal {
    Log(Log),
    Flush(Sender<()>),
    Exit,
}

#[derive(Debug, Clone)]
pub(crate) struct WorkerSettings {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub retry_interval: Duration,
    pub backlog_capacity: usize,
    pub backlog_path: Option<std::path::PathBuf>,
}

impl From<&SinkConfig> for WorkerSettings {
    fn from(config: &SinkConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            flush_interval: config.flush_interval,
            max_retries: config.max_retries.max(1),
            retry_backoff: config.retry_backoff,
            retry_interval: config.retry_interval,
            backlog_capacity: config.backlog_capacity,
            backlog_path: config.backlog_path.clone(),
        }
    }
}

/// Thread entry point: verify the credential, report the outcome, then ingest
/// until told to exit or every sender is gone.
pub(crate) fn run(
    mut transport: Box<dyn Transport>,
    receiver: Receiver<Signal>,
    ready: Sender<Result<(), ConstructionError>>,
    done: Sender<()>,
    stats: Arc<DeliveryStats>,
    settings: WorkerSettings,
) {
    INGEST_THREAD.with(|flag| flag.set(true));

    let verified = transport.verify();
    let accepted = verified.is_ok();
    if ready.send(verified).is_err() || !accepted {
        return;
    }

    let mut worker = Worker::new(transport, receiver, stats, settings);
    worker.start();

    let _ = done.send(());
}

/// Linear backoff, saturating instead of overflowing.
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(attempt).unwrap_or(Duration::MAX)
}

struct Worker {
    exit: bool,
    queue: Vec<Log>,
    backlog: Backlog,
    transport: Box<dyn Transport>,
    receiver: Receiver<Signal>,
    stats: Arc<DeliveryStats>,
    settings: WorkerSettings,
}

impl Worker {
    fn new(
        transport: Box<dyn Transport>,
        receiver: Receiver<Signal>,
        stats: Arc<DeliveryStats>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            exit: false,
            queue: Vec::with_capacity(settings.batch_size),
            backlog: Backlog::new(settings.backlog_capacity, settings.backlog_path.clone()),
            transport,
            receiver,
            stats,
            settings,
        }
    }

    fn start(&mut self) {
        match self.backlog.load() {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "Loaded dlog backlog from a previous session"),
            Err(e) => tracing::warn!(error = %e, "Could not load dlog backlog"),
        }

        let tick = self.settings.flush_interval.min(MAX_LOOP_INTERVAL);
        let mut last_flush = Instant::now();
        let mut last_retry = Instant::now();

        while !self.exit {
            match self.receiver.recv_timeout(tick) {
                Ok(signal) => self.receive(signal),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.exit = true,
            }

            if !self.queue.is_empty() && last_flush.elapsed() >= self.settings.flush_interval {
                self.deliver_queue();
                last_flush = Instant::now();
            }

            if !self.backlog.is_empty() && last_retry.elapsed() >= self.settings.retry_interval {
                self.retry_backlog();
                last_retry = Instant::now();
            }
        }

        self.shutdown();
    }

    fn receive(&mut self, signal: Signal) {
        match signal {
            Signal::Log(log) => {
                self.queue.push(log);
                if self.queue.len() >= self.settings.batch_size {
                    self.deliver_queue();
                }
            }
            Signal::Flush(ack) => {
                self.deliver_queue();
                self.stats.record_flush();
                let _ = ack.send(());
            }
            Signal::Exit => self.exit = true,
        }
    }

    /// Take whatever is still queued, deliver it, and persist what could not be delivered.
    fn shutdown(&mut self) {
        let mut acks = Vec::new();
        while let Ok(signal) = self.receiver.try_recv() {
            match signal {
                Signal::Log(log) => self.queue.push(log),
                Signal::Flush(ack) => acks.push(ack),
                Signal::Exit => {}
            }
        }

        self.deliver_queue();
        for ack in acks {
            self.stats.record_flush();
            let _ = ack.send(());
        }

        if !self.backlog.is_empty() {
            self.retry_backlog();
        }

        let remaining = self.backlog.len();
        match self.backlog.persist() {
            Ok(0) if remaining > 0 => {
                self.stats.record_dropped(remaining as u64);
                tracing::warn!(count = remaining, "Discarding undelivered dlog records");
            }
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "Saved undelivered dlog records to backlog"),
            Err(e) => {
                self.stats.record_dropped(remaining as u64);
                eprintln!("[dlog] Cannot write logs to backlog: {e}");
            }
        }
    }

    fn deliver_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }

        let logs = std::mem::take(&mut self.queue);
        for chunk in logs.chunks(self.settings.batch_size) {
            if !self.deliver_batch(chunk) {
                let count = chunk.len() as u64;
                let dropped = self.backlog.push(chunk.to_vec());
                self.stats.record_backlogged(count);
                self.stats.record_dropped(dropped as u64);
            }
        }
    }

    /// Up to `max_retries` attempts with linearly growing backoff.
    fn deliver_batch(&mut self, logs: &[Log]) -> bool {
        let attempts = self.settings.max_retries;
        for attempt in 1..=attempts {
            match self.transport.send(logs) {
                Ok(()) => {
                    self.stats.record_delivered(logs.len() as u64);
                    return true;
                }
                Err(e) => {
                    self.stats.record_failed_attempt();
                    tracing::warn!(attempt, attempts, error = %e, "dlog delivery failed");
                    if attempt < attempts {
                        std::thread::sleep(backoff(self.settings.retry_backoff, attempt));
                    }
                }
            }
        }
        false
    }

    /// One attempt per chunk; stops at the first failure.
    fn retry_backlog(&mut self) {
        tracing::debug!(count = self.backlog.len(), "Retrying dlog backlog");
        while !self.backlog.is_empty() {
            let logs = self.backlog.take(self.settings.batch_size);
            match self.transport.send(&logs) {
                Ok(()) => self.stats.record_delivered(logs.len() as u64),
                Err(e) => {
                    self.stats.record_failed_attempt();
                    tracing::debug!(error = %e, "dlog backlog retry failed");
                    let dropped = self.backlog.requeue(logs);
                    self.stats.record_dropped(dropped as u64);
                    break;
                }
            }
        }
    }
}
