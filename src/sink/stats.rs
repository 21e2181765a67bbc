//! Delivery counters for a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between a session and its worker.
#[derive(Debug)]
pub struct DeliveryStats {
    /// Records accepted into the queue
    accepted: AtomicU64,
    /// Records the transport confirmed
    delivered: AtomicU64,
    /// Records discarded (queue full or backlog overflow)
    dropped: AtomicU64,
    /// Delivery attempts that failed
    failed_attempts: AtomicU64,
    /// Records moved to the backlog
    backlogged: AtomicU64,
    /// Completed flush requests
    flushes: AtomicU64,
    started_at: DateTime<Utc>,
}

impl DeliveryStats {
    pub fn new() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            failed_attempts: AtomicU64::new(0),
            backlogged: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self, count: u64) {
        self.delivered.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: u64) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_failed_attempt(&self) {
        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backlogged(&self, count: u64) {
        self.backlogged.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            backlogged: self.backlogged.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            started_at: self.started_at,
        }
    }
}

impl Default for DeliveryStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of delivery statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub accepted: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub failed_attempts: u64,
    pub backlogged: u64,
    pub flushes: u64,
    pub started_at: DateTime<Utc>,
}

impl SessionStats {
    pub fn summary(&self) -> String {
        format!(
            "dlog session: {} accepted, {} delivered, {} dropped, {} backlogged, {} failed attempts, {} flushes",
            self.accepted,
            self.delivered,
            self.dropped,
            self.backlogged,
            self.failed_attempts,
            self.flushes
        )
    }
}
