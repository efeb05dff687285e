//! Per-IP request rate limiting.
//!
//! A fixed-window counter per client IP: up to `burst` requests in any one
//! second window, refilling at `per_sec` once the window rolls over. Stale
//! entries are swept periodically from `main`.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tokio::sync::Mutex;
use tracing::warn;

struct Window {
    started: Instant,
    used: u32,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
    per_sec: u32,
    burst: u32,
}

impl RateLimiter {
    pub fn new(per_sec: u32, burst: u32) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            per_sec,
            burst,
        }
    }

    /// Record one request from `ip`; returns `false` when over budget.
    pub async fn allow(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let window = windows.entry(ip).or_insert(Window {
            started: now,
            used: 0,
            last_seen: now,
        });

        window.last_seen = now;

        let elapsed = now.duration_since(window.started).as_secs_f64();
        if elapsed >= 1.0 {
            // Roll the window, carrying over unused burst headroom.
            let refill = (elapsed * self.per_sec as f64) as u32;
            window.used = window.used.saturating_sub(refill);
            window.started = now;
        }

        if window.used < self.burst {
            window.used += 1;
            true
        } else {
            false
        }
    }

    /// Drop windows idle for longer than `max_idle_secs`.
    pub async fn purge_stale(&self, max_idle_secs: f64) {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        windows.retain(|_, w| now.duration_since(w.last_seen).as_secs_f64() < max_idle_secs);
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !limiter.allow(addr.ip()).await {
        warn!(ip = %addr.ip(), "rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_then_reject() {
        let limiter = RateLimiter::new(10, 3);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.allow(ip).await);
        }
        assert!(!limiter.allow(ip).await);
    }

    #[tokio::test]
    async fn limits_are_per_ip() {
        let limiter = RateLimiter::new(10, 1);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.allow(a).await);
        assert!(!limiter.allow(a).await);
        assert!(limiter.allow(b).await);
    }

    #[tokio::test]
    async fn purge_drops_idle_windows() {
        let limiter = RateLimiter::new(10, 3);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        limiter.allow(ip).await;

        limiter.purge_stale(0.0).await;
        assert!(limiter.windows.lock().await.is_empty());
    }
}
