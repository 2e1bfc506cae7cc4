use std::env;

use crate::rate_limit::Quota;

#[derive(Clone, Debug)]
pub struct Config {
    /// Upstream API key. Its absence is surfaced per-request as a 500 rather
    /// than failing startup, matching the deployed behavior.
    pub api_key: Option<String>,
    pub redis_url: String,
    pub default_rate_limit: Quota,
}

impl Config {
    pub fn from_env() -> Self {
        let default_rate_limit = match env::var("DEFAULT_RATE_LIMIT") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(
                    "DEFAULT_RATE_LIMIT unusable ({}), falling back to {}",
                    e,
                    Quota::default()
                );
                Quota::default()
            }),
            Err(_) => Quota::default(),
        };

        Config {
            api_key: env::var("API_KEY").ok(),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379/0".to_string()),
            default_rate_limit,
        }
    }
}
