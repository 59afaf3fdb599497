//! HTTP transport posting form-encoded batches with reqwest.

use super::{form_fields, Delivery, DeliveryMode, Transport, TransportError};
use crate::core::Payload;
use std::time::Duration;
use tracing::{debug, warn};

/// Request timeout for every send.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long in-flight asynchronous sends may keep running when the transport is dropped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Posts payloads to the collector as `application/x-www-form-urlencoded`.
///
/// Asynchronous sends run on an owned tokio runtime; synchronous sends block
/// the calling thread on that runtime. Must not be used or dropped from
/// inside another tokio runtime.
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
    runtime: Option<tokio::runtime::Runtime>,
}

impl HttpTransport {
    /// Create a transport posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, TransportError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(TransportError::Config(
                "collector address is empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Config(format!("Failed to create HTTP client: {e}")))?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("evtrack-http")
            .enable_all()
            .build()
            .map_err(|e| TransportError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            endpoint,
            client,
            runtime: Some(runtime),
        })
    }

    /// The collector address.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn runtime(&self) -> Result<&tokio::runtime::Runtime, TransportError> {
        self.runtime
            .as_ref()
            .ok_or_else(|| TransportError::Config("transport is shut down".to_string()))
    }
}

impl Transport for HttpTransport {
    fn send(&self, payload: &Payload, mode: DeliveryMode) -> Result<Delivery, TransportError> {
        let runtime = self.runtime()?;
        let request = self.client.post(&self.endpoint).form(&form_fields(payload));
        let action = payload.action();

        match mode {
            DeliveryMode::Sync => {
                debug!(action, records = payload.record_count(), "sending synchronously");
                runtime.block_on(execute(request)).map(Delivery::Completed)
            }
            DeliveryMode::Async(done) => {
                debug!(action, records = payload.record_count(), "dispatching");
                runtime.spawn(async move {
                    let result = execute(request).await;
                    if let Err(ref e) = result {
                        warn!(action, "send failed: {e}");
                    }
                    if let Some(done) = done {
                        done(result);
                    }
                });
                Ok(Delivery::Dispatched)
            }
        }
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
        }
    }
}

async fn execute(request: reqwest::RequestBuilder) -> Result<String, TransportError> {
    let response = request
        .send()
        .await
        .map_err(|e| TransportError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(TransportError::Server {
            status: status.as_u16(),
            message,
        });
    }

    response
        .text()
        .await
        .map_err(|e| TransportError::Network(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_endpoint_rejected() {
        assert!(matches!(
            HttpTransport::new("  "),
            Err(TransportError::Config(_))
        ));
    }

    #[test]
    fn test_endpoint_kept() {
        let transport = HttpTransport::new("http://127.0.0.1:9/save").unwrap();
        assert_eq!(transport.endpoint(), "http://127.0.0.1:9/save");
    }
}
