//! Alert delivery transports

use crate::{Alert, Endpoint};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Transport-level delivery failure
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Alert request failed: {0}")]
    Request(String),

    #[error("Invalid alert endpoint: {0}")]
    InvalidUrl(String),
}

/// Posts alert payloads to the alerting endpoint.
///
/// Returns the HTTP status code; interpreting it is up to the caller.
#[async_trait]
pub trait AlertTransport: Send + Sync {
    async fn post(&self, endpoint: Endpoint, alert: &Alert) -> Result<u16, TransportError>;
}

/// JSON-over-HTTP transport
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create an HTTP transport posting below `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        reqwest::Url::parse(base_url).map_err(|e| TransportError::InvalidUrl(format!("{base_url}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("watchdog/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL for an endpoint
    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl AlertTransport for HttpTransport {
    async fn post(&self, endpoint: Endpoint, alert: &Alert) -> Result<u16, TransportError> {
        let url = self.url(endpoint);
        let response = self
            .client
            .post(&url)
            .json(alert)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        debug!(%url, status, "alert endpoint responded");
        Ok(status)
    }
}

/// Transport that records requests and answers from a script.
///
/// Answers `200` once the script runs out.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    script: Mutex<VecDeque<Result<u16, TransportError>>>,
    requests: Mutex<Vec<(Endpoint, Alert)>>,
}

impl RecordingTransport {
    /// Create a transport that answers `200` to everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue status codes for the next requests.
    pub fn respond_with(&self, statuses: impl IntoIterator<Item = u16>) {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        script.extend(statuses.into_iter().map(Ok));
    }

    /// Queue a transport failure for the next request.
    pub fn fail_next(&self, message: &str) {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        script.push_back(Err(TransportError::Request(message.to_string())));
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<(Endpoint, Alert)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AlertTransport for RecordingTransport {
    async fn post(&self, endpoint: Endpoint, alert: &Alert) -> Result<u16, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((endpoint, alert.clone()));
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Ok(200))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base_and_path() {
        let transport = HttpTransport::new("http://alerts.local:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(transport.url(Endpoint::Raise), "http://alerts.local:8080/alerts");
        assert_eq!(transport.url(Endpoint::Clear), "http://alerts.local:8080/clear-alert");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpTransport::new("alerts", Duration::from_secs(1)),
            Err(TransportError::InvalidUrl(_))
        ));
    }
}
