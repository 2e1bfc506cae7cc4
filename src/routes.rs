use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    cache::{CacheStore, WeatherQuery, CACHE_TTL_SECS},
    config::Config,
    rate_limit::{throttle, Quota, RateLimiter},
    upstream::{UpstreamClient, UpstreamError},
};

/// The weather endpoint's own limit, tighter than the process-wide default.
const WEATHER_QUOTA: Quota = Quota::per_minute(5);

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<dyn CacheStore>,
    pub upstream: Arc<UpstreamClient>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherParams {
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

/// Failures surfaced to the client as a JSON error body. Upstream errors keep
/// their own message but always map to a 500; the proxy's 429 comes from the
/// rate limiter, never from here.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Location is required")]
    MissingLocation,
    #[error("API_KEY not set")]
    ApiKeyNotSet,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingLocation => StatusCode::BAD_REQUEST,
            ApiError::ApiKeyNotSet | ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Weather endpoint: serves the cached payload when fresh, otherwise fetches
/// from upstream and write-through caches the result.
pub async fn get_weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherParams>,
) -> Result<Json<Value>, ApiError> {
    let location = match params.location {
        Some(location) if !location.is_empty() => location,
        _ => return Err(ApiError::MissingLocation),
    };
    let api_key = state.config.api_key.clone().ok_or(ApiError::ApiKeyNotSet)?;

    let query = WeatherQuery {
        location,
        start_date: params.start_date,
        end_date: params.end_date,
    };
    let key = query.cache_key();

    // An unreachable store degrades to a cache miss.
    match state.cache.get(&key).await {
        Ok(Some(cached)) => match serde_json::from_str::<Value>(&cached) {
            Ok(payload) => {
                tracing::debug!(%key, "cache hit");
                return Ok(Json(payload));
            }
            Err(e) => tracing::warn!(%key, "discarding undecodable cache entry: {}", e),
        },
        Ok(None) => tracing::debug!(%key, "cache miss"),
        Err(e) => tracing::warn!(%key, "cache read failed, treating as miss: {}", e),
    }

    let payload = state.upstream.fetch(&query, &api_key).await?;

    // A failed write must not cost the client the payload we already have.
    if let Err(e) = state
        .cache
        .set(&key, &payload.to_string(), CACHE_TTL_SECS)
        .await
    {
        tracing::warn!(%key, "cache write failed: {}", e);
    }

    Ok(Json(payload))
}

// Create the router. The weather endpoint's own quota replaces the
// process-wide default; routes without an explicit quota get the default.
pub fn create_router(state: AppState) -> Router {
    let weather_limiter = Arc::new(RateLimiter::new(WEATHER_QUOTA));
    let default_limiter = Arc::new(RateLimiter::new(state.config.default_rate_limit));

    Router::new()
        .route("/weather", get(get_weather))
        .route_layer(middleware::from_fn_with_state(weather_limiter, throttle))
        .merge(
            Router::new()
                .route("/health", get(health))
                .route_layer(middleware::from_fn_with_state(default_limiter, throttle)),
        )
        .with_state(state)
}
