/// Per-client rate limiting
///
/// Each [`RateLimiter`] keeps one token bucket per client IP in memory.
/// Buckets start full, refill continuously at `capacity / window`, and a
/// request costs one token.
///
/// Two limiters are wired in by the router:
///
/// - **auth**: `signup`/`signin`, 50 requests per 15 minutes. Requests that
///   succeed give their token back, so only failed attempts count.
/// - **api**: `/api/tasks/*`, 100 requests per 15 minutes.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: bucket capacity
/// - `X-RateLimit-Remaining`: whole tokens left
/// - `Retry-After`: seconds to wait (429 responses only)
///
/// # Client key
///
/// The socket peer address, unless the limiter trusts a reverse proxy, in
/// which case the first `X-Forwarded-For` entry takes precedence.
///
/// # Example
///
/// ```
/// use taskflow_api::middleware::rate_limit::RateLimiter;
/// use std::time::Duration;
///
/// let limiter = RateLimiter::new("login", 2, Duration::from_secs(60));
/// assert!(limiter.check("10.0.0.1").is_ok());
/// assert!(limiter.check("10.0.0.1").is_ok());
/// assert!(limiter.check("10.0.0.1").is_err());
/// assert!(limiter.check("10.0.0.2").is_ok());
/// ```

use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Window shared by both limiters
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Requests per window on `signup`/`signin`
pub const AUTH_REQUESTS_PER_WINDOW: u32 = 50;

/// Requests per window on `/api/tasks`
pub const API_REQUESTS_PER_WINDOW: u32 = 100;

const AUTH_MESSAGE: &str = "Too many authentication requests, please try again later.";
const API_MESSAGE: &str = "Too many requests from this IP, please try again later.";

/// Buckets untouched for this long are dropped during cleanup
const IDLE_BUCKET_TTL: Duration = Duration::from_secs(60 * 60);

/// Cleanup runs after this many new buckets
const CLEANUP_EVERY: u64 = 1024;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        TokenBucket {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    fn refill(&mut self, rate: f64, capacity: u32, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(capacity as f64);
        self.last_refill = now;
    }

    fn try_consume(&mut self, count: f64) -> bool {
        if self.tokens >= count {
            self.tokens -= count;
            true
        } else {
            false
        }
    }

    fn seconds_until_available(&self, count: f64, rate: f64) -> u64 {
        let deficit = count - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }
}

/// Outcome of an allowed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
}

/// Rejection details
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after: u64,
}

/// In-memory token bucket limiter keyed by client
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    capacity: u32,
    refill_rate: f64,
    message: &'static str,
    refund_successful: bool,
    trust_proxy: bool,
    buckets: DashMap<String, TokenBucket>,
    created: std::sync::atomic::AtomicU64,
}

impl RateLimiter {
    /// Creates a limiter allowing `capacity` requests per `window`
    pub fn new(name: &'static str, capacity: u32, window: Duration) -> Self {
        let capacity = capacity.max(1);
        let window = window.as_secs_f64().max(1.0);

        Self {
            name,
            capacity,
            refill_rate: capacity as f64 / window,
            message: API_MESSAGE,
            refund_successful: false,
            trust_proxy: false,
            buckets: DashMap::new(),
            created: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Limiter for `signup`/`signin`
    pub fn auth() -> Self {
        Self::new("auth", AUTH_REQUESTS_PER_WINDOW, RATE_LIMIT_WINDOW)
            .with_message(AUTH_MESSAGE)
            .refund_successful(true)
    }

    /// Limiter for the task API
    pub fn api() -> Self {
        Self::new("api", API_REQUESTS_PER_WINDOW, RATE_LIMIT_WINDOW)
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = message;
        self
    }

    /// Give the token back when the response status is below 400
    pub fn refund_successful(mut self, enabled: bool) -> Self {
        self.refund_successful = enabled;
        self
    }

    /// Key clients by `X-Forwarded-For` when present
    ///
    /// Only enable behind a proxy that overwrites the header; otherwise
    /// any client can pick its own bucket.
    pub fn trust_proxy(mut self, enabled: bool) -> Self {
        self.trust_proxy = enabled;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Takes one token from the bucket of `key`
    pub fn check(&self, key: &str) -> Result<RateLimitStatus, RateLimited> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<RateLimitStatus, RateLimited> {
        let mut inserted = false;
        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| {
            inserted = true;
            TokenBucket::new(self.capacity, now)
        });

        bucket.refill(self.refill_rate, self.capacity, now);

        let result = if bucket.try_consume(1.0) {
            Ok(RateLimitStatus {
                limit: self.capacity,
                remaining: bucket.tokens.floor() as u32,
            })
        } else {
            Err(RateLimited {
                retry_after: bucket.seconds_until_available(1.0, self.refill_rate).max(1),
            })
        };
        drop(bucket);

        if inserted {
            let created = self
                .created
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
                + 1;
            if created % CLEANUP_EVERY == 0 {
                self.purge_idle(now);
            }
        }

        result
    }

    /// Returns one token to the bucket of `key`
    pub fn refund(&self, key: &str) {
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            bucket.tokens = (bucket.tokens + 1.0).min(self.capacity as f64);
        }
    }

    /// Drops buckets that have been idle long enough to be full again
    pub fn purge_idle(&self, now: Instant) {
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < IDLE_BUCKET_TTL);
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    fn rejection(&self, limited: RateLimited) -> ApiError {
        ApiError::RateLimitExceeded {
            retry_after: limited.retry_after,
            message: self.message.to_string(),
        }
    }
}

/// Client address used as the bucket key
///
/// With `trust_proxy` the first `X-Forwarded-For` entry wins. The socket
/// peer address is used otherwise, and `unknown` when neither is available.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = || {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    trust_proxy
        .then(forwarded)
        .flatten()
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware
///
/// Mount with `axum::middleware::from_fn_with_state(limiter, rate_limit_layer)`.
///
/// # Errors
///
/// - 429 Too Many Requests: the client's bucket is empty
pub async fn rate_limit_layer(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_ip(request.headers(), peer, limiter.trust_proxy);

    let status = limiter.check(&key).map_err(|limited| {
        tracing::warn!(
            limiter = limiter.name(),
            client = %key,
            retry_after = limited.retry_after,
            tracked_clients = limiter.tracked_clients(),
            "Rate limit exceeded"
        );
        limiter.rejection(limited)
    })?;

    let mut response = next.run(request).await;

    let remaining = if limiter.refund_successful && response.status().as_u16() < 400 {
        limiter.refund(&key);
        status.remaining.saturating_add(1).min(status.limit)
    } else {
        status.remaining
    };

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(status.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));

    Ok(response)
}
