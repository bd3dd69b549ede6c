//! In-process fixed-window rate limiting.
//!
//! Counters live in a `DashMap` keyed by client identifier; windows expire
//! lazily on the next hit for the same key.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

/// Requests allowed per window for the contact form.
pub const CONTACT_LIMIT: u32 = 5;

/// Contact form window (10 minutes).
pub const CONTACT_WINDOW: Duration = Duration::from_secs(600);

/// Fixed-window counter per client.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<String, (Instant, u32)>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: DashMap::new(),
        }
    }

    /// Limiter for `POST /api/contact`.
    pub fn contact() -> Self {
        Self::new(CONTACT_LIMIT, CONTACT_WINDOW)
    }

    /// Count one request from `key`.
    ///
    /// Returns `Err` with the seconds until the window resets when the
    /// client is over its limit.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), u64> {
        let mut entry = self.windows.entry(key.to_string()).or_insert((now, 0));
        let (started, count) = entry.value_mut();

        if now.duration_since(*started) >= self.window {
            *started = now;
            *count = 0;
        }

        if *count >= self.limit {
            let remaining = self.window.saturating_sub(now.duration_since(*started));
            debug!(key = %key, limit = self.limit, "rate limit exceeded");
            return Err(remaining.as_secs().max(1));
        }

        *count += 1;
        Ok(())
    }

    /// Drop windows that have fully elapsed.
    pub fn prune(&self) {
        let now = Instant::now();
        self.windows
            .retain(|_, (started, _)| now.duration_since(*started) < self.window);
    }
}

/// Get the client identifier (IP address) for rate limiting.
pub fn get_client_id(
    addr: Option<std::net::SocketAddr>,
    headers: &axum::http::HeaderMap,
) -> String {
    // Proxied requests: take the first address in the chain.
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(ip) = value.split(',').next()
        && !ip.trim().is_empty()
    {
        return ip.trim().to_string();
    }

    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
    {
        return value.to_string();
    }

    addr.map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn sixth_request_in_window_is_refused() {
        let limiter = RateLimiter::contact();
        let now = Instant::now();
        for _ in 0..CONTACT_LIMIT {
            assert!(limiter.check_at("1.2.3.4", now).is_ok());
        }
        let retry = limiter.check_at("1.2.3.4", now).unwrap_err();
        assert_eq!(retry, 600);

        // Other clients are unaffected.
        assert!(limiter.check_at("5.6.7.8", now).is_ok());
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let start = Instant::now();
        assert!(limiter.check_at("a", start).is_ok());
        assert_eq!(
            limiter.check_at("a", start + Duration::from_secs(4)),
            Err(6)
        );
        assert!(limiter.check_at("a", start + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn client_id_prefers_forwarded_headers() {
        let mut headers = HeaderMap::new();
        let addr = Some("10.0.0.1:5000".parse().unwrap());
        assert_eq!(get_client_id(addr, &headers), "10.0.0.1");

        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.9"));
        assert_eq!(get_client_id(addr, &headers), "192.168.1.9");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.2"),
        );
        assert_eq!(get_client_id(addr, &headers), "203.0.113.7");

        assert_eq!(get_client_id(None, &HeaderMap::new()), "unknown");
    }
}
