use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::schemas::essay::EssayPayload;

const METHOD_POST: &str = "POST";

/// Failure below the level of a structured response body.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{method} {url} timed out")]
    Timeout { method: &'static str, url: String },
    #[error("{method} {url} failed: {detail}")]
    Network { method: &'static str, url: String, detail: String },
    #[error("{method} {url} returned HTTP {status}")]
    Status { method: &'static str, url: String, status: u16 },
    #[error("{method} {url} returned a body that is not a JSON object (HTTP {status})")]
    Decode { method: &'static str, url: String, status: u16 },
}

impl TransportError {
    pub fn method(&self) -> &'static str {
        match self {
            TransportError::Timeout { method, .. }
            | TransportError::Network { method, .. }
            | TransportError::Status { method, .. }
            | TransportError::Decode { method, .. } => method,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } | TransportError::Decode { status, .. } => {
                Some(*status)
            }
            TransportError::Timeout { .. } | TransportError::Network { .. } => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

/// Capability used by the controller to hand an essay to its host.
///
/// Any JSON object the host answers with is returned as-is, whatever the HTTP status;
/// classifying it is the controller's job.
#[async_trait]
pub trait SubmissionTransport: Send + Sync {
    async fn submit(&self, payload: &EssayPayload) -> Result<Value, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, endpoint: endpoint.into() })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            return TransportError::Timeout { method: METHOD_POST, url: self.endpoint.clone() };
        }
        TransportError::Network {
            method: METHOD_POST,
            url: self.endpoint.clone(),
            detail: err.to_string(),
        }
    }
}

#[async_trait]
impl SubmissionTransport for HttpTransport {
    async fn submit(&self, payload: &EssayPayload) -> Result<Value, TransportError> {
        tracing::debug!(endpoint = %self.endpoint, "Submitting essay");

        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|err| self.classify(err))?;

        match serde_json::from_slice::<Value>(&body) {
            Ok(value) if value.is_object() => Ok(value),
            _ if !status.is_success() => Err(TransportError::Status {
                method: METHOD_POST,
                url: self.endpoint.clone(),
                status: status.as_u16(),
            }),
            _ => Err(TransportError::Decode {
                method: METHOD_POST,
                url: self.endpoint.clone(),
                status: status.as_u16(),
            }),
        }
    }
}
