//! Strawberry CRM client
//!
//! Strawberry returns its records as a flat JSON array.

use async_trait::async_trait;
use serde_json::Value;

use super::http::{JsonClient, UpstreamError};
use super::{Record, UpstreamSource};

/// Default endpoint of the Strawberry CRM
pub const STRAWBERRY_URL: &str = "https://fakebanky.herokuapp.com/fruit/strawberry";

/// Client for fetching product records from the Strawberry CRM
#[derive(Debug, Clone)]
pub struct StrawberryClient {
    http: JsonClient,
    url: String,
}

impl StrawberryClient {
    /// Creates a StrawberryClient pointed at the default endpoint
    pub fn new(http: JsonClient) -> Self {
        Self::with_url(http, STRAWBERRY_URL)
    }

    /// Creates a StrawberryClient pointed at a custom endpoint
    pub fn with_url(http: JsonClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl UpstreamSource for StrawberryClient {
    fn name(&self) -> &str {
        "strawberry"
    }

    async fn fetch(&self) -> Result<Vec<Record>, UpstreamError> {
        tracing::info!(url = %self.url, "Going to fetch new data from Strawberry CRM");
        let payload = self.http.get_json(&self.url).await?;
        let records = decode_records(payload)?;
        tracing::debug!(count = records.len(), "Decoded Strawberry records");
        Ok(records)
    }
}

fn decode_records(payload: Option<Value>) -> Result<Vec<Record>, UpstreamError> {
    match payload {
        None => Ok(Vec::new()),
        Some(value @ Value::Array(_)) => Ok(serde_json::from_value(value)?),
        Some(_) => Err(UpstreamError::UnexpectedShape(
            "expected a flat record array".to_string(),
        )),
    }
}
