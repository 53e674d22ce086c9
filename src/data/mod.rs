//! Core data model for the RedGreen aggregation service
//!
//! This module contains the product record shared by every upstream source,
//! the RED/GREEN eligibility filter, and the upstream clients that normalize
//! each source's response shape into a plain list of records.

pub mod banana;
pub mod http;
pub mod strawberry;

pub use banana::BananaClient;
pub use http::{JsonClient, UpstreamError};
pub use strawberry::StrawberryClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Product names that make a record eligible for aggregation
pub const ELIGIBLE_PRODUCT_NAMES: [&str; 2] = ["RED", "GREEN"];

/// A product entry as supplied by an upstream source
///
/// Only `productName` is interpreted. Every other field the upstream sends is
/// kept verbatim in `extra` and written back out unchanged when the record is
/// serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Categorical product name, e.g. "RED"
    #[serde(rename = "productName")]
    pub product_name: String,
    /// Remaining upstream fields, treated opaquely
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// Creates a record with no extra fields
    pub fn new(product_name: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            extra: Map::new(),
        }
    }

    /// Adds an opaque upstream field
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Merged, filtered records from every upstream source, in source order
pub type AggregationResult = Vec<Record>;

/// Returns true if the record's product name is exactly "RED" or "GREEN"
///
/// The comparison is case-sensitive and does no trimming.
pub fn is_eligible(record: &Record) -> bool {
    ELIGIBLE_PRODUCT_NAMES.contains(&record.product_name.as_str())
}

/// Keeps only eligible records, preserving their order
pub fn filter_eligible(records: Vec<Record>) -> Vec<Record> {
    records.into_iter().filter(is_eligible).collect()
}

/// An upstream HTTP source of product records
///
/// Implementations decode their source's response shape but do not filter;
/// filtering is applied uniformly by the aggregator.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Fetches and decodes every record the source currently offers
    async fn fetch(&self) -> Result<Vec<Record>, UpstreamError>;
}
