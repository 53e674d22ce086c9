//! HTTP surface of the aggregation service

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use thiserror::Error;

use crate::aggregator::AggregationError;
use crate::data::Record;
use crate::rate::RateCheck;
use crate::service::AggregationService;

/// Path of the aggregated read endpoint
pub const AGGREGATION_PATH: &str = "/myAggregatedHub";

/// Path of the rate-limited eviction endpoint
pub const EVICTION_PATH: &str = "/myAggregatedHub/eviction";

/// Shared state accessible from Axum handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AggregationService>,
    /// Run the rate check before each read
    pub check_on_read: bool,
    pub start_time: Instant,
}

impl AppState {
    /// Creates state whose uptime is counted from now
    pub fn new(service: Arc<AggregationService>, check_on_read: bool) -> Self {
        Self {
            service,
            check_on_read,
            start_time: Instant::now(),
        }
    }
}

/// Errors returned to HTTP callers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("aggregation failed")]
    Aggregation(#[from] AggregationError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Aggregation(ref source) = self;
        tracing::error!(error = %source, "Aggregation request failed");

        // The cause stays in the log; callers only learn that it failed
        let body = ErrorBody {
            error: self.to_string(),
        };
        (StatusCode::BAD_GATEWAY, Json(body)).into_response()
    }
}

/// Health check response body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running
    pub status: String,
    /// Seconds since the server started
    pub uptime_secs: u64,
    /// Whether an aggregation is currently cached
    pub cached: bool,
}

/// Build the Axum router with all routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(AGGREGATION_PATH, get(aggregation_handler))
        .route(EVICTION_PATH, post(eviction_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// GET /myAggregatedHub
async fn aggregation_handler(State(state): State<AppState>) -> Result<Json<Vec<Record>>, ApiError> {
    if state.check_on_read {
        state.service.check_and_maybe_evict();
    }

    let result = state.service.on_demand_aggregation().await?;
    Ok(Json(result.to_vec()))
}

/// POST /myAggregatedHub/eviction
async fn eviction_handler(State(state): State<AppState>) -> Json<RateCheck> {
    Json(state.service.check_and_maybe_evict())
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        cached: state.service.is_cached(),
    })
}
