//! Rate-limited cache eviction
//!
//! The tracker remembers when it was last checked. A check that comes at least
//! `rate_limit` whole minutes after the previous one evicts the aggregation
//! cache. Every check, evicting or not, moves the timestamp to now.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::CacheManager;
use crate::data::AggregationResult;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Outcome of one rate check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateCheck {
    /// Whole minutes since the previous check, truncated
    pub elapsed_minutes: i64,
    /// Whether the cache entry was evicted
    pub evicted: bool,
}

/// Evicts a cache key when enough time has passed between checks
pub struct RateTracker {
    last_aggregation_time: Mutex<DateTime<Utc>>,
    rate_limit_minutes: i64,
    cache: Arc<CacheManager<AggregationResult>>,
    cache_key: String,
    clock: Arc<dyn Clock>,
}

impl RateTracker {
    /// Creates a tracker whose timestamp starts at the clock's current time
    ///
    /// A `rate_limit_minutes` of zero or less makes every check evict.
    pub fn new(
        rate_limit_minutes: i64,
        cache: Arc<CacheManager<AggregationResult>>,
        cache_key: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            last_aggregation_time: Mutex::new(clock.now()),
            rate_limit_minutes,
            cache,
            cache_key: cache_key.into(),
            clock,
        }
    }

    /// The configured rate limit in minutes
    pub fn rate_limit_minutes(&self) -> i64 {
        self.rate_limit_minutes
    }

    /// When the tracker was last checked
    pub fn last_aggregation_time(&self) -> DateTime<Utc> {
        *self.last_aggregation_time.lock()
    }

    /// Evicts the cache if the rate limit has been reached, then records now
    ///
    /// The whole sequence runs under one lock, so overlapping calls are
    /// serialized. If the clock has gone backwards the check never evicts.
    pub fn check_and_maybe_evict(&self) -> RateCheck {
        let mut last = self.last_aggregation_time.lock();
        let previous = *last;
        let now = self.clock.now();
        let elapsed = now.signed_duration_since(previous);
        let elapsed_minutes = elapsed.num_minutes();

        let evicted = if elapsed < chrono::Duration::zero() {
            tracing::warn!(
                last = %previous,
                now = %now,
                "Clock moved backwards, skipping eviction"
            );
            false
        } else if elapsed_minutes >= self.rate_limit_minutes {
            self.cache.evict(&self.cache_key);
            true
        } else {
            false
        };

        tracing::info!(
            elapsed_minutes,
            rate_limit = self.rate_limit_minutes,
            evicted,
            "Rate limit check"
        );

        *last = now;
        RateCheck {
            elapsed_minutes,
            evicted,
        }
    }
}
