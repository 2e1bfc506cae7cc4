//! Cache key derivation and the Redis-backed cache store.
//!
//! Keys are namespaced under `weather:` so unrelated uses of the same Redis
//! instance never collide with ours. Entries expire server-side; the proxy
//! never deletes them explicitly.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::BTreeMap;
use thiserror::Error;

/// Fixed TTL for every cache entry. Weather data tolerates staleness on the
/// order of minutes, so there is no per-query override.
pub const CACHE_TTL_SECS: u64 = 600;

const KEY_NAMESPACE: &str = "weather";

/// The semantic parameters of one weather lookup. Identity is the exact
/// tuple of all three fields; a query with no date range is distinct from
/// any query with one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherQuery {
    pub location: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl WeatherQuery {
    /// Derives the cache key for this query.
    ///
    /// The fields are serialized into a canonical JSON object (keys sorted by
    /// name, absent dates as explicit nulls) so that construction order never
    /// affects the result, then digested with md5 and prefixed with the
    /// namespace tag.
    pub fn cache_key(&self) -> String {
        let mut fields: BTreeMap<&str, Option<&str>> = BTreeMap::new();
        fields.insert("location", Some(self.location.as_str()));
        fields.insert("start_date", self.start_date.as_deref());
        fields.insert("end_date", self.end_date.as_deref());

        let canonical =
            serde_json::to_string(&fields).expect("string map always serializes to JSON");
        format!("{}:{:x}", KEY_NAMESPACE, md5::compute(canonical.as_bytes()))
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(#[from] redis::RedisError),
}

/// Key/value store with per-entry expiration, shared across request handlers.
///
/// Trait seam so tests can substitute an in-memory fake for Redis. The store
/// itself serializes concurrent access to a key; two handlers racing to fill
/// the same cold key may both write, last writer wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored payload, or `None` if the key was never set, has
    /// expired, or was evicted.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `payload` under `key`, expiring `ttl_secs` from now. Overwrites
    /// any prior value.
    async fn set(&self, key: &str, payload: &str, ttl_secs: u64) -> Result<(), CacheError>;
}

/// Production cache store backed by Redis.
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    /// Creates a store from a `redis://` URL. Connections are established
    /// lazily per operation, so an unreachable Redis does not fail startup.
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, payload: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(key, payload, ttl_secs).await?;
        Ok(())
    }
}
