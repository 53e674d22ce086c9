//! RedGreen Aggregation Service Library
//!
//! Fetches product records from the Banana and Strawberry CRMs, keeps the RED
//! and GREEN ones, persists them, and serves the merged list from a cache that
//! a rate tracker evicts.

pub mod aggregator;
pub mod cache;
pub mod cli;
pub mod data;
pub mod logging;
pub mod rate;
pub mod refresh;
pub mod server;
pub mod service;
pub mod store;
