//! Per-client rate limiting for the detection endpoints.
//!
//! Token bucket per client key with in-memory storage. Buckets are created
//! lazily under a single lock and refill over time.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::AppState;
use crate::services::error::ApiError;

/// Rate limiter configuration
pub struct RateLimitConfig {
    /// Maximum tokens (burst capacity)
    pub max_tokens: u32,
    /// Tokens added per second
    pub refill_rate: f64,
}

struct ClientBucket {
    tokens: f64,
    last_update: Instant,
}

/// Per-client rate limiter using the token bucket algorithm.
pub struct ClientRateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<String, ClientBucket>>,
}

impl ClientRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Check if a request is allowed for the given client key.
    /// Returns true if allowed, false if rate limited.
    pub fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        let now = Instant::now();

        let bucket = buckets.entry(key.to_string()).or_insert_with(|| ClientBucket {
            tokens: self.config.max_tokens as f64,
            last_update: now,
        });

        // Refill tokens based on time elapsed
        let elapsed = now.duration_since(bucket.last_update);
        let refill = elapsed.as_secs_f64() * self.config.refill_rate;
        bucket.tokens = (bucket.tokens + refill).min(self.config.max_tokens as f64);
        bucket.last_update = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets for clients that haven't made requests in a while.
    /// Call periodically to prevent unbounded memory growth.
    #[allow(dead_code)]
    pub fn cleanup(&self, max_age: Duration) {
        let mut buckets = self.buckets.lock().unwrap();
        let now = Instant::now();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
    }
}

/// Axum middleware gating a request on the caller's token bucket.
pub async fn middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(req.headers(), &addr);
    if !state.limiter.check(&key) {
        return ApiError::RateLimited.into_response();
    }
    next.run(req).await
}

/// Client key for rate limiting: forwarded-IP headers first, then the
/// peer address.
fn client_key(headers: &HeaderMap, addr: &SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::to_string)
        .unwrap_or_else(|| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_tokens: u32, refill_rate: f64) -> ClientRateLimiter {
        ClientRateLimiter::new(RateLimitConfig {
            max_tokens,
            refill_rate,
        })
    }

    #[test]
    fn allows_burst_then_denies() {
        let limiter = limiter(3, 0.0);
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(limiter.check("1.2.3.4"));
        assert!(!limiter.check("1.2.3.4"));
    }

    #[test]
    fn buckets_are_independent_per_client() {
        let limiter = limiter(1, 0.0);
        assert!(limiter.check("1.2.3.4"));
        assert!(!limiter.check("1.2.3.4"));
        assert!(limiter.check("5.6.7.8"));
    }

    #[test]
    fn cleanup_drops_idle_buckets() {
        let limiter = limiter(1, 0.0);
        assert!(limiter.check("1.2.3.4"));
        limiter.cleanup(Duration::ZERO);
        // Bucket was recreated full after the sweep.
        assert!(limiter.check("1.2.3.4"));
    }

    #[test]
    fn forwarded_header_takes_precedence() {
        let addr: SocketAddr = "9.9.9.9:1234".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "1.2.3.4".parse().unwrap());
        assert_eq!(client_key(&headers, &addr), "1.2.3.4");

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "5.6.7.8".parse().unwrap());
        assert_eq!(client_key(&headers, &addr), "5.6.7.8");

        assert_eq!(client_key(&HeaderMap::new(), &addr), "9.9.9.9");
    }
}
