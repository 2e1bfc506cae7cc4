//! Per-client request throttling.
//!
//! A fixed-window counter keyed by client IP, applied as axum middleware in
//! front of the weather handler. Quotas use the `"<n> per <period>"` notation
//! from the configuration surface, e.g. `"10 per minute"`.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Period {
    Second,
    Minute,
    Hour,
    Day,
}

impl Period {
    fn duration(self) -> Duration {
        match self {
            Period::Second => Duration::from_secs(1),
            Period::Minute => Duration::from_secs(60),
            Period::Hour => Duration::from_secs(60 * 60),
            Period::Day => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Period::Second => "second",
            Period::Minute => "minute",
            Period::Hour => "hour",
            Period::Day => "day",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid rate limit quota: {0:?}")]
pub struct QuotaParseError(String);

/// A request budget, e.g. 5 requests per minute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quota {
    pub max_requests: u32,
    pub period: Period,
}

impl Quota {
    pub const fn new(max_requests: u32, period: Period) -> Self {
        Self {
            max_requests,
            period,
        }
    }

    pub const fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Period::Minute)
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self::per_minute(10)
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per {}", self.max_requests, self.period)
    }
}

impl FromStr for Quota {
    type Err = QuotaParseError;

    /// Parses `"<n> per <period>"`, where the period is `second`, `minute`,
    /// `hour`, or `day` (plural accepted).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || QuotaParseError(s.to_string());
        let mut parts = s.split_whitespace();

        let max_requests: u32 = parts
            .next()
            .and_then(|n| n.parse().ok())
            .filter(|&n| n > 0)
            .ok_or_else(err)?;
        if parts.next() != Some("per") {
            return Err(err());
        }
        let period = match parts.next() {
            Some("second" | "seconds") => Period::Second,
            Some("minute" | "minutes") => Period::Minute,
            Some("hour" | "hours") => Period::Hour,
            Some("day" | "days") => Period::Day,
            _ => return Err(err()),
        };
        if parts.next().is_some() {
            return Err(err());
        }

        Ok(Quota::new(max_requests, period))
    }
}

struct Window {
    started: Instant,
    count: u32,
}

struct Windows {
    map: HashMap<IpAddr, Window>,
    last_pruned: Instant,
}

/// Fixed-window counter per client IP. Counters for a window are reset when
/// the first request after its end arrives; entries for clients whose window
/// has ended are pruned at most once per period, so idle clients do not
/// accumulate in the map.
pub struct RateLimiter {
    quota: Quota,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(quota: Quota) -> Self {
        Self {
            quota,
            windows: Mutex::new(Windows {
                map: HashMap::new(),
                last_pruned: Instant::now(),
            }),
        }
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    /// Returns whether the client may proceed, counting this request against
    /// its current window.
    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        let period = self.quota.period.duration();
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");

        if now.duration_since(windows.last_pruned) >= period {
            windows
                .map
                .retain(|_, window| now.duration_since(window.started) < period);
            windows.last_pruned = now;
        }

        let window = windows.map.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(window.started) >= period {
            window.started = now;
            window.count = 0;
        }

        if window.count < self.quota.max_requests {
            window.count += 1;
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows.lock().unwrap().map.len()
    }
}

/// Middleware that rejects over-quota clients with a 429 before the handler
/// runs. Client identity is the connection's remote IP.
pub async fn throttle(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if limiter.check(addr.ip()) {
        next.run(request).await
    } else {
        tracing::debug!(client = %addr.ip(), quota = %limiter.quota(), "rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": format!("Rate limit exceeded: {}", limiter.quota()) })),
        )
            .into_response()
    }
}
