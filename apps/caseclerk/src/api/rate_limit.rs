//! # Rate Limiting
//!
//! Per-client GCRA limiters from `governor`, keyed by client address.
//!
//! The burst equals the whole window quota, so a quiet client may spend its
//! quota at once and then regains one request every `window / quota`.

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::Clock;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::SocketAddr;
use std::num::NonZeroU32;

use super::AppState;
use super::config::RateLimitConfig;
use super::error::ApiError;

pub struct RateLimits {
    general: DefaultKeyedRateLimiter<String>,
    auth: DefaultKeyedRateLimiter<String>,
}

impl std::fmt::Debug for RateLimits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimits")
            .field("general_keys", &self.general.len())
            .field("auth_keys", &self.auth.len())
            .finish()
    }
}

impl RateLimits {
    /// Builds both limiters. Zero quotas are raised to one.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            general: keyed(config.requests, config),
            auth: keyed(config.auth_requests, config),
        }
    }

    pub fn check_general(&self, key: &str) -> Result<(), ApiError> {
        check(&self.general, key)
    }

    pub fn check_auth(&self, key: &str) -> Result<(), ApiError> {
        check(&self.auth, key)
    }

    /// Forgets clients whose state has fully replenished.
    pub fn retain_recent(&self) {
        self.general.retain_recent();
        self.auth.retain_recent();
    }
}

fn keyed(requests: u32, config: &RateLimitConfig) -> DefaultKeyedRateLimiter<String> {
    let burst = NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN);
    let period = config.window / burst.get();
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst);
    RateLimiter::keyed(quota)
}

fn check(limiter: &DefaultKeyedRateLimiter<String>, key: &str) -> Result<(), ApiError> {
    limiter.check_key(&key.to_string()).map_err(|not_until| {
        let wait = not_until.wait_time_from(limiter.clock().now());
        ApiError::RateLimited {
            retry_after_secs: wait.as_secs().max(1),
        }
    })
}

/// First `X-Forwarded-For` hop, else the peer address, else `"local"`.
pub fn client_key(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "local".to_string())
}

pub async fn limit_general(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = client_key(&request);
    if let Err(err) = state.limits.check_general(&key) {
        tracing::debug!(client = %key, "general rate limit exceeded");
        return err.into_response();
    }
    next.run(request).await
}

pub async fn limit_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = client_key(&request);
    if let Err(err) = state.limits.check_auth(&key) {
        tracing::info!(client = %key, "auth rate limit exceeded");
        return err.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::time::Duration;

    fn config(requests: u32) -> RateLimitConfig {
        RateLimitConfig {
            requests,
            window: Duration::from_secs(900),
            auth_requests: 2,
        }
    }

    #[test]
    fn quota_is_spent_then_rejected() {
        let limits = RateLimits::new(&config(3));
        for _ in 0..3 {
            assert!(limits.check_general("10.0.0.1").is_ok());
        }
        let err = limits.check_general("10.0.0.1").unwrap_err();
        assert!(matches!(
            err,
            ApiError::RateLimited { retry_after_secs } if (1..=300).contains(&retry_after_secs)
        ));
    }

    #[test]
    fn clients_are_limited_independently() {
        let limits = RateLimits::new(&config(1));
        assert!(limits.check_general("a").is_ok());
        assert!(limits.check_general("a").is_err());
        assert!(limits.check_general("b").is_ok());
    }

    #[test]
    fn auth_quota_is_separate() {
        let limits = RateLimits::new(&config(100));
        assert!(limits.check_auth("a").is_ok());
        assert!(limits.check_auth("a").is_ok());
        assert!(limits.check_auth("a").is_err());
        assert!(limits.check_general("a").is_ok());
    }

    #[test]
    fn client_key_prefers_forwarded_for() {
        let request = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.9");

        let bare = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&bare), "local");
    }
}
