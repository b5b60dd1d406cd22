//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Backend;

/// Signing secret used when none is configured. Fine for local use only.
pub const DEV_JWT_SECRET: &str = "caseclerk-development-secret-change-me";

const MIN_SECRET_LEN: usize = 16;

/// Per-client request quotas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests per window on `/api`.
    pub requests: u32,
    pub window: Duration,
    /// Requests per window on login, register and refresh.
    pub auth_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            window: Duration::from_secs(15 * 60),
            auth_requests: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub jwt_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Loaded at startup and written back on shutdown.
    pub snapshot: Option<(PathBuf, Backend)>,
    /// Fill an empty database with demo records.
    pub seed: bool,
    pub cors_origin: String,
    /// Simulated processing time of the AI endpoints.
    pub ai_latency: Duration,
    pub rate_limit: RateLimitConfig,
    /// Minimum argon2 cost. Only for tests.
    pub fast_password_hashing: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_ttl: Duration::from_secs(60 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            snapshot: None,
            seed: true,
            cors_origin: "http://localhost:3000".to_string(),
            ai_latency: Duration::from_millis(800),
            rate_limit: RateLimitConfig::default(),
            fast_password_hashing: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.rate_limit.requests == 0 || self.rate_limit.auth_requests == 0 {
            return Err("rate limit quotas must be greater than zero".to_string());
        }
        if self.rate_limit.window.is_zero() {
            return Err("rate limit window must be greater than zero".to_string());
        }
        if self.access_ttl.is_zero() || self.refresh_ttl.is_zero() {
            return Err("token lifetimes must be greater than zero".to_string());
        }
        if !self.uses_dev_secret() && self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(format!(
                "jwt secret must be at least {} bytes",
                MIN_SECRET_LEN
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn short_secret_is_rejected() {
        let config = ServerConfig {
            jwt_secret: "short".to_string(),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_quota_is_rejected() {
        let mut config = ServerConfig::default();
        config.rate_limit.auth_requests = 0;
        assert!(config.validate().is_err());
    }
}
