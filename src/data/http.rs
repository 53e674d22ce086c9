//! Outbound JSON client shared by the upstream sources
//!
//! Wraps a `reqwest::Client` with a request timeout and maps every way an
//! upstream can fail into an [`UpstreamError`].

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

/// Default timeout applied to every upstream request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reasons an upstream source is unavailable
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection or transport failure
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The request did not complete within the configured timeout
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// The upstream answered with a non-success status
    #[error("Upstream {url} returned status {status}")]
    Status { url: String, status: StatusCode },

    /// The body was not valid JSON or did not match the record shape
    #[error("Failed to parse upstream payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Valid JSON, but not in the shape the source is expected to send
    #[error("Unexpected payload shape: {0}")]
    UnexpectedShape(String),

    /// The HTTP client itself could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl UpstreamError {
    fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            UpstreamError::Timeout {
                url: url.to_string(),
            }
        } else {
            UpstreamError::Request(error)
        }
    }
}

/// HTTP client that fetches a JSON document from a URL
#[derive(Debug, Clone)]
pub struct JsonClient {
    client: Client,
}

impl JsonClient {
    /// Creates a client whose requests fail after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::Client)?;
        Ok(Self { client })
    }

    /// Issues `GET url` and decodes the body as JSON
    ///
    /// # Returns
    /// * `Ok(Some(value))` - The decoded JSON document
    /// * `Ok(None)` - The body was empty or the JSON literal `null`
    /// * `Err(UpstreamError)` - Transport failure, timeout, non-2xx status, or invalid JSON
    pub async fn get_json(&self, url: &str) -> Result<Option<Value>, UpstreamError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                url: url.to_string(),
                status,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::from_reqwest(url, e))?;

        parse_body(&text)
    }
}

/// Decodes a response body, treating an empty body or `null` as absent
fn parse_body(text: &str) -> Result<Option<Value>, UpstreamError> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Null => Ok(None),
        value => Ok(Some(value)),
    }
}
