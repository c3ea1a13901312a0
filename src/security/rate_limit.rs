//! Fixed-window rate limiting per client.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    response::Response,
};
use chrono::Utc;
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::http::error::ApiError;
use crate::http::request::RequestContext;
use crate::observability::metrics;
use crate::pipeline::{Flow, Stage};

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Hits recorded for one client in its current window.
#[derive(Debug, Clone, Copy)]
struct Window {
    hits: u32,
    resets_at: Instant,
}

impl Window {
    fn starting(now: Instant, length: Duration) -> Self {
        Self {
            hits: 0,
            resets_at: now + length,
        }
    }
}

/// Result of recording one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub hits: u32,
    pub reset_after: Duration,
}

impl Quota {
    pub fn is_exceeded(&self) -> bool {
        self.hits > self.limit
    }

    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.hits)
    }
}

/// Per-client counters with a fixed window that starts on a client's first hit.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    window: Duration,
    max_requests: u32,
    trust_forwarded_for: bool,
    last_sweep: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            window: Duration::from_secs(config.window_secs),
            max_requests: config.max_requests,
            trust_forwarded_for: config.trust_forwarded_for,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Record a hit for `key` at `now`.
    ///
    /// Increment and window check happen under the entry's shard lock, so
    /// concurrent hits from the same client are serialized.
    pub fn hit_at(&self, key: &str, now: Instant) -> Quota {
        self.sweep_expired(now);

        let mut entry = self
            .windows
            .entry(key.to_owned())
            .or_insert_with(|| Window::starting(now, self.window));

        if entry.resets_at <= now {
            *entry = Window::starting(now, self.window);
        }
        entry.hits = entry.hits.saturating_add(1);

        Quota {
            limit: self.max_requests,
            hits: entry.hits,
            reset_after: entry.resets_at.saturating_duration_since(now),
        }
    }

    pub fn hit(&self, key: &str) -> Quota {
        self.hit_at(key, Instant::now())
    }

    /// Number of clients with a live or not-yet-reclaimed window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Drop expired windows, at most once per window length.
    fn sweep_expired(&self, now: Instant) {
        {
            let mut last = match self.last_sweep.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if now.saturating_duration_since(*last) < self.window {
                return;
            }
            *last = now;
        }

        let before = self.windows.len();
        self.windows.retain(|_, w| w.resets_at > now);
        let reclaimed = before.saturating_sub(self.windows.len());
        if reclaimed > 0 {
            tracing::debug!(reclaimed, remaining = self.windows.len(), "Rate limit windows swept");
        }
    }

    fn client_key(&self, request: &Request, ctx: &RequestContext) -> String {
        if self.trust_forwarded_for {
            let forwarded = request
                .headers()
                .get(X_FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(ip) = forwarded {
                return ip.to_owned();
            }
        }
        ctx.client_ip.clone().unwrap_or_else(|| "unknown".to_string())
    }
}

#[async_trait]
impl Stage for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn handle(&self, request: Request, ctx: &mut RequestContext) -> Flow {
        let key = self.client_key(&request, ctx);
        let quota = self.hit(&key);
        ctx.annotations.insert(quota);

        if quota.is_exceeded() {
            tracing::warn!(client = %key, hits = quota.hits, limit = quota.limit, "Rate limit exceeded");
            metrics::record_rate_limited();
            return Flow::Fail(ApiError::TooManyRequests { client: key });
        }

        Flow::Continue(request)
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        let Some(quota) = ctx.annotations.get::<Quota>() else {
            return;
        };
        let reset_secs = quota.reset_after.as_secs() + u64::from(quota.reset_after.subsec_nanos() > 0);
        let reset_epoch = Utc::now().timestamp().max(0) as u64 + reset_secs;

        let headers = response.headers_mut();
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(quota.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(quota.remaining()));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_epoch));
        if quota.is_exceeded() {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(reset_secs));
        }
    }
}
