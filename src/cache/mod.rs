//! Cache module for memoizing aggregation results
//!
//! This module provides an in-process cache manager that keeps a computed value
//! under a key until it is explicitly evicted. There is no time-based expiry;
//! eviction is driven by the rate tracker.

mod manager;

pub use manager::{CacheManager, CachedData};
