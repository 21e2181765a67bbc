//! Delivery to the remote ingestion service.
//!
//! A [`Session`] owns one background worker that batches records and hands
//! them to a [`Transport`]. The HTTP transport is the production one; tests
//! and embedders can supply their own.

mod backlog;
#[cfg(feature = "http")]
mod http;
mod session;
mod stats;
mod worker;

use std::fmt;

use crate::models::Log;

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use session::{Session, SessionError};
pub use stats::{DeliveryStats, SessionStats};
pub(crate) use worker::on_ingest_thread;

/// Blocking connection to the ingestion service.
///
/// Implementations are moved onto the session's worker thread and only ever
/// called from there.
pub trait Transport: Send + 'static {
    /// Check that the service accepts this client's credential.
    fn verify(&mut self) -> Result<(), ConstructionError>;

    /// Deliver one batch.
    fn send(&mut self, logs: &[Log]) -> Result<(), TransmissionError>;
}

/// A session could not be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    /// No API key was supplied
    EmptyCredential,
    /// The API key cannot be sent as a header value
    InvalidCredential,
    /// The service refused the API key
    Rejected { status: u16, message: String },
    /// The service could not be reached
    Unreachable(String),
    /// The local client could not be built
    Client(String),
    /// The credential probe did not answer in time
    Timeout,
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::EmptyCredential => {
                write!(f, "Please configure dlog with a valid API_KEY")
            }
            ConstructionError::InvalidCredential => {
                write!(f, "API_KEY contains characters that cannot be sent")
            }
            ConstructionError::Rejected { status, message } => {
                write!(f, "API_KEY rejected ({status}): {message}")
            }
            ConstructionError::Unreachable(msg) => write!(f, "Ingestion service unreachable: {msg}"),
            ConstructionError::Client(msg) => write!(f, "Failed to build client: {msg}"),
            ConstructionError::Timeout => write!(f, "Timed out waiting for API_KEY check"),
        }
    }
}

impl std::error::Error for ConstructionError {}

/// A batch could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmissionError {
    /// Network/HTTP error
    Network(String),
    /// Service returned an error response
    Server { status: u16, message: String },
    /// Request body could not be encoded
    Serialization(String),
}

impl fmt::Display for TransmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransmissionError::Network(msg) => write!(f, "API connection error: {msg}"),
            TransmissionError::Server { status, message } => {
                write!(f, "Log ingestion failed ({status}): {message}")
            }
            TransmissionError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for TransmissionError {}
