//! Banana CRM client
//!
//! Banana wraps its product list in an outer envelope: the payload is a JSON
//! array whose first element is itself the array of records.

use async_trait::async_trait;
use serde_json::Value;

use super::http::{JsonClient, UpstreamError};
use super::{Record, UpstreamSource};

/// Default endpoint of the Banana CRM
pub const BANANA_URL: &str = "https://fakebanky.herokuapp.com/fruit/banana";

/// Client for fetching product records from the Banana CRM
#[derive(Debug, Clone)]
pub struct BananaClient {
    http: JsonClient,
    url: String,
}

impl BananaClient {
    /// Creates a BananaClient pointed at the default endpoint
    pub fn new(http: JsonClient) -> Self {
        Self::with_url(http, BANANA_URL)
    }

    /// Creates a BananaClient pointed at a custom endpoint
    pub fn with_url(http: JsonClient, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl UpstreamSource for BananaClient {
    fn name(&self) -> &str {
        "banana"
    }

    async fn fetch(&self) -> Result<Vec<Record>, UpstreamError> {
        tracing::info!(url = %self.url, "Going to fetch new data from Banana CRM");
        let payload = self.http.get_json(&self.url).await?;
        let records = unwrap_envelope(payload)?;
        tracing::debug!(count = records.len(), "Decoded Banana records");
        Ok(records)
    }
}

/// Extracts the record list from the first element of the envelope
fn unwrap_envelope(payload: Option<Value>) -> Result<Vec<Record>, UpstreamError> {
    let envelope = match payload {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(UpstreamError::UnexpectedShape(format!(
                "expected an envelope array, got {}",
                json_kind(&other)
            )))
        }
    };

    let Some(first) = envelope.into_iter().next() else {
        return Ok(Vec::new());
    };

    if !first.is_array() {
        return Err(UpstreamError::UnexpectedShape(format!(
            "expected a record array inside the envelope, got {}",
            json_kind(&first)
        )));
    }

    Ok(serde_json::from_value(first)?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
