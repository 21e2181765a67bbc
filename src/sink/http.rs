//! HTTP transport for the dlog ingestion endpoint.

use reqwest::header::HeaderValue;

use super::{ConstructionError, TransmissionError, Transport};
use crate::config::{Credential, SinkConfig};
use crate::models::{Log, LogRequest};

/// Body fragment the service answers with for an unknown key.
const INVALID_KEY_MARKER: &str = "Invalid API_KEY";

/// Blocking HTTP transport.
///
/// Wraps an async `reqwest` client in a private current-thread runtime so the
/// ingest worker can drive it synchronously.
pub struct HttpTransport {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    endpoint: String,
    api_key: HeaderValue,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(credential: &Credential, config: &SinkConfig) -> Result<Self, ConstructionError> {
        if credential.is_empty() {
            return Err(ConstructionError::EmptyCredential);
        }

        let mut api_key = HeaderValue::from_str(credential.expose())
            .map_err(|_| ConstructionError::InvalidCredential)?;
        api_key.set_sensitive(true);

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .tcp_keepalive(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| ConstructionError::Client(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ConstructionError::Client(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            client,
            runtime,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, logs: &[Log]) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .post(&self.endpoint)
            .header("API_KEY", self.api_key.clone())
            .json(&LogRequest::new(logs))
            .send()
            .await
    }

    async fn verify_async(&self) -> Result<(), ConstructionError> {
        let response = self
            .post(&[])
            .await
            .map_err(|e| ConstructionError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status.is_client_error() || message.contains(INVALID_KEY_MARKER) {
            Err(ConstructionError::Rejected {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(ConstructionError::Unreachable(format!("{status}: {message}")))
        }
    }

    async fn send_async(&self, logs: &[Log]) -> Result<(), TransmissionError> {
        let response = self.post(logs).await.map_err(|e| {
            if e.is_builder() || e.is_body() {
                TransmissionError::Serialization(e.to_string())
            } else {
                TransmissionError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransmissionError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

impl Transport for HttpTransport {
    fn verify(&mut self) -> Result<(), ConstructionError> {
        self.runtime.block_on(self.verify_async())
    }

    fn send(&mut self, logs: &[Log]) -> Result<(), TransmissionError> {
        self.runtime.block_on(self.send_async(logs))
    }
}
