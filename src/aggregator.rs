//! Fetch, filter, persist and merge records from every upstream source
//!
//! Sources are processed in the order they were configured. Each source's
//! eligible records are persisted before the next source is looked at, so when
//! a later source fails the earlier ones have already been saved.

use std::sync::Arc;

use thiserror::Error;

use crate::data::{filter_eligible, AggregationResult, Record, UpstreamError, UpstreamSource};
use crate::store::RecordStore;

/// Errors that abort an aggregation
#[derive(Debug, Error)]
pub enum AggregationError {
    /// An upstream source could not be fetched or decoded
    #[error("Upstream source '{source_name}' is unavailable: {error}")]
    UpstreamUnavailable {
        source_name: String,
        #[source]
        error: UpstreamError,
    },
}

/// How upstream requests are issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// One source at a time, stopping at the first failure
    #[default]
    Sequential,
    /// All sources at once; results are still merged in configured order
    Concurrent,
}

/// Merges RED and GREEN records from a fixed list of upstream sources
pub struct Aggregator {
    sources: Vec<Arc<dyn UpstreamSource>>,
    store: Arc<dyn RecordStore>,
    mode: FetchMode,
}

impl Aggregator {
    /// Creates an aggregator that fetches sources sequentially
    pub fn new(sources: Vec<Arc<dyn UpstreamSource>>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            sources,
            store,
            mode: FetchMode::Sequential,
        }
    }

    /// Sets the fetch mode
    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Names of the configured sources, in merge order
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Runs one aggregation over every source
    ///
    /// # Returns
    /// * `Ok(AggregationResult)` - Eligible records of the first source, then the second, and so on
    /// * `Err(AggregationError)` - The first source (in configured order) that failed
    pub async fn aggregate(&self) -> Result<AggregationResult, AggregationError> {
        tracing::info!(sources = self.sources.len(), mode = ?self.mode, "Starting aggregation");

        let mut merged = Vec::new();
        match self.mode {
            FetchMode::Sequential => {
                for source in &self.sources {
                    let fetched = source.fetch().await;
                    merged.extend(self.accept(source.as_ref(), fetched).await?);
                }
            }
            FetchMode::Concurrent => {
                let fetches = self.sources.iter().map(|source| source.fetch());
                let results = futures::future::join_all(fetches).await;
                for (source, fetched) in self.sources.iter().zip(results) {
                    merged.extend(self.accept(source.as_ref(), fetched).await?);
                }
            }
        }

        tracing::info!(count = merged.len(), "Aggregation finished");
        Ok(merged)
    }

    /// Filters one source's records and persists the survivors
    ///
    /// The store is synchronous, so the save runs on the blocking pool and is
    /// awaited before the next source is accepted.
    async fn accept(
        &self,
        source: &dyn UpstreamSource,
        fetched: Result<Vec<Record>, UpstreamError>,
    ) -> Result<Vec<Record>, AggregationError> {
        let records = fetched.map_err(|error| {
            tracing::error!(source = source.name(), error = %error, "Upstream fetch failed");
            AggregationError::UpstreamUnavailable {
                source_name: source.name().to_string(),
                error,
            }
        })?;

        let fetched_count = records.len();
        let eligible = filter_eligible(records);
        tracing::info!(
            source = source.name(),
            fetched = fetched_count,
            eligible = eligible.len(),
            "Filtered upstream records"
        );

        let store = Arc::clone(&self.store);
        let batch = eligible.clone();
        match tokio::task::spawn_blocking(move || store.save_all(&batch)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(source = source.name(), error = %e, "Failed to persist records");
            }
            Err(e) => {
                tracing::warn!(source = source.name(), error = %e, "Persistence task failed");
            }
        }

        Ok(eligible)
    }
}
