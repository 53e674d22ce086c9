//! Aggregation service
//!
//! Ties the cache, the aggregator and the rate tracker together around the
//! single cache key the aggregation is memoized under.

use std::sync::Arc;

use crate::aggregator::{AggregationError, Aggregator};
use crate::cache::CacheManager;
use crate::data::AggregationResult;
use crate::rate::{Clock, RateCheck, RateTracker, SystemClock};

/// Cache key the aggregation result is stored under
pub const AGGREGATION_CACHE_KEY: &str = "dataAggregation";

/// Cached, rate-limited view over an [`Aggregator`]
pub struct AggregationService {
    cache: Arc<CacheManager<AggregationResult>>,
    aggregator: Aggregator,
    tracker: RateTracker,
}

impl AggregationService {
    /// Creates a service using the system clock
    pub fn new(aggregator: Aggregator, rate_limit_minutes: i64) -> Self {
        Self::with_clock(aggregator, rate_limit_minutes, Arc::new(SystemClock))
    }

    /// Creates a service with a custom clock for the rate tracker
    pub fn with_clock(
        aggregator: Aggregator,
        rate_limit_minutes: i64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(CacheManager::new());
        let tracker = RateTracker::new(
            rate_limit_minutes,
            Arc::clone(&cache),
            AGGREGATION_CACHE_KEY,
            clock,
        );
        Self {
            cache,
            aggregator,
            tracker,
        }
    }

    /// Returns the cached aggregation, aggregating on a miss
    ///
    /// A failed aggregation leaves the cache empty.
    pub async fn on_demand_aggregation(&self) -> Result<Arc<AggregationResult>, AggregationError> {
        self.cache
            .get_or_compute(AGGREGATION_CACHE_KEY, || self.aggregator.aggregate())
            .await
    }

    /// Unconditionally drops the cached aggregation
    pub fn rate_limit_eviction(&self) -> bool {
        let evicted = self.cache.evict(AGGREGATION_CACHE_KEY);
        tracing::info!(evicted, "Aggregation cache evicted");
        evicted
    }

    /// Runs the rate tracker's eviction check
    pub fn check_and_maybe_evict(&self) -> RateCheck {
        self.tracker.check_and_maybe_evict()
    }

    /// Returns true if an aggregation is currently cached
    pub fn is_cached(&self) -> bool {
        self.cache.contains(AGGREGATION_CACHE_KEY)
    }

    /// The rate tracker guarding the cached aggregation
    pub fn tracker(&self) -> &RateTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::tests::{FakeSource, RecordingStore};
    use crate::rate::tests::ManualClock;
    use chrono::Duration;

    struct Fixture {
        service: AggregationService,
        banana: Arc<FakeSource>,
        strawberry: Arc<FakeSource>,
        clock: Arc<ManualClock>,
    }

    fn fixture(rate_limit: i64) -> Fixture {
        let banana = FakeSource::ok("banana", &["RED", "BLUE"]);
        let strawberry = FakeSource::ok("strawberry", &["GREEN", "YELLOW"]);
        let aggregator = Aggregator::new(
            vec![banana.clone(), strawberry.clone()],
            Arc::new(RecordingStore::default()),
        );
        let clock = ManualClock::new();
        let service = AggregationService::with_clock(aggregator, rate_limit, clock.clone());
        Fixture {
            service,
            banana,
            strawberry,
            clock,
        }
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let f = fixture(5);

        let first = f.service.on_demand_aggregation().await.unwrap();
        let second = f.service.on_demand_aggregation().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(f.banana.call_count(), 1);
        assert_eq!(f.strawberry.call_count(), 1);
    }

    #[tokio::test]
    async fn test_eviction_forces_both_sources_to_be_refetched() {
        let f = fixture(5);

        f.service.on_demand_aggregation().await.unwrap();
        assert!(f.service.rate_limit_eviction());
        f.service.on_demand_aggregation().await.unwrap();

        assert_eq!(f.banana.call_count(), 2);
        assert_eq!(f.strawberry.call_count(), 2);
    }

    #[tokio::test]
    async fn test_result_contains_only_eligible_records_in_order() {
        let f = fixture(5);

        let result = f.service.on_demand_aggregation().await.unwrap();

        let names: Vec<_> = result.iter().map(|r| r.product_name.as_str()).collect();
        assert_eq!(names, vec!["RED", "GREEN"]);
    }

    #[tokio::test]
    async fn test_rate_check_below_limit_keeps_cache() {
        let f = fixture(5);
        f.service.on_demand_aggregation().await.unwrap();

        f.clock.advance(Duration::minutes(2));
        let check = f.service.check_and_maybe_evict();

        assert!(!check.evicted);
        assert!(f.service.is_cached());
        assert_eq!(f.service.tracker().last_aggregation_time(), f.clock.now());
    }

    #[tokio::test]
    async fn test_rate_check_at_limit_evicts_cache() {
        let f = fixture(5);
        f.service.on_demand_aggregation().await.unwrap();

        f.clock.advance(Duration::minutes(5));
        let check = f.service.check_and_maybe_evict();

        assert!(check.evicted);
        assert!(!f.service.is_cached());

        f.service.on_demand_aggregation().await.unwrap();
        assert_eq!(f.banana.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_aggregation_is_not_cached() {
        let banana = FakeSource::failing("banana");
        let strawberry = FakeSource::ok("strawberry", &["GREEN"]);
        let aggregator = Aggregator::new(
            vec![banana.clone(), strawberry],
            Arc::new(RecordingStore::default()),
        );
        let service = AggregationService::new(aggregator, 5);

        assert!(service.on_demand_aggregation().await.is_err());
        assert!(!service.is_cached());

        assert!(service.on_demand_aggregation().await.is_err());
        assert_eq!(banana.call_count(), 2, "failures are retried on every read");
    }
}
