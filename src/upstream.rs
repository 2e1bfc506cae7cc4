//! Client for the Visual Crossing timeline weather API.
//!
//! Builds the upstream request URL, performs the fetch, and translates
//! failure statuses into typed errors. No retries and no caching here;
//! caching is the cache store's job.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::cache::WeatherQuery;

pub const DEFAULT_BASE_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";

/// Typed upstream failure. Every variant keeps the original status code and
/// response body for logging; the display text is what reaches the client.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Bad Request: Invalid parameters.")]
    InvalidParameters { status: StatusCode, body: String },
    #[error("Unauthorized: Invalid or missing API key.")]
    Unauthorized { status: StatusCode, body: String },
    #[error("Not Found: Endpoint or resource does not exist.")]
    NotFound { status: StatusCode, body: String },
    #[error("Too Many Requests: Rate limit exceeded.")]
    RateLimited { status: StatusCode, body: String },
    #[error("Internal Server Error: Problem with the external service.")]
    UpstreamFailure { status: StatusCode, body: String },
    #[error("HTTP error {status}")]
    GenericHttp { status: StatusCode, body: String },
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

pub struct UpstreamClient {
    client: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .user_agent("WeatherProxy/1.0")
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Builds the timeline URL for a query. The location is placed in the
    /// path as supplied; callers are responsible for values safe for URL
    /// path placement.
    pub fn build_url(&self, query: &WeatherQuery, api_key: &str) -> String {
        let params = format!(
            "?key={}&unitGroup=metric&include=days&contentType=json",
            api_key
        );
        match (query.start_date.as_deref(), query.end_date.as_deref()) {
            (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => format!(
                "{}/{}/{}/{}{}",
                self.base_url, query.location, start, end, params
            ),
            // A lone or empty date degrades to the no-range form.
            _ => format!("{}/{}{}", self.base_url, query.location, params),
        }
    }

    /// Fetches the weather payload for a query. The body of a 2xx response is
    /// parsed as JSON and passed through uninterpreted.
    pub async fn fetch(&self, query: &WeatherQuery, api_key: &str) -> Result<Value, UpstreamError> {
        let url = self.build_url(query, api_key);
        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::BAD_REQUEST => UpstreamError::InvalidParameters { status, body },
            StatusCode::UNAUTHORIZED => UpstreamError::Unauthorized { status, body },
            StatusCode::NOT_FOUND => UpstreamError::NotFound { status, body },
            StatusCode::TOO_MANY_REQUESTS => UpstreamError::RateLimited { status, body },
            s if s.is_server_error() => UpstreamError::UpstreamFailure { status, body },
            _ => UpstreamError::GenericHttp { status, body },
        })
    }
}
