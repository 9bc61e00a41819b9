//! Rate limiting implementation
//!
//! Two mechanisms cooperate:
//! - a fixed pacing interval between requests, enforced with the governor
//!   crate, so the client stays polite even when quota is ample;
//! - a quota planner that reads the upstream remaining/reset headers and
//!   decides how long to pause before handing control back to the caller.

use chrono::Utc;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;

/// Header carrying the number of requests left in the current window
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining";

/// Header carrying the window reset time, in milliseconds since the epoch
pub const RESET_HEADER: &str = "X-RateLimit-Reset";

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Remaining-quota value below which the client waits for the reset
    pub low_quota_threshold: u64,
    /// Minimum spacing between requests (None disables pacing)
    pub pacing: Option<Duration>,
    /// Wait applied when quota is low but no reset time was sent
    pub fallback_wait: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            low_quota_threshold: 10,
            pacing: Some(Duration::from_secs(1)),
            fallback_wait: Duration::from_secs(10),
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(low_quota_threshold: u64, pacing: Option<Duration>) -> Self {
        Self {
            low_quota_threshold,
            pacing,
            ..Default::default()
        }
    }

    /// Config without self-imposed pacing (quota signals still honored)
    pub fn unpaced() -> Self {
        Self {
            pacing: None,
            ..Default::default()
        }
    }
}

/// Quota information read from a response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaSignal {
    /// Requests left in the window
    pub remaining: Option<u64>,
    /// Window reset time in ms since the epoch
    pub reset_at_ms: Option<i64>,
}

impl QuotaSignal {
    /// Read the signal from response headers; absent or garbled values are None
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        };

        Self {
            remaining: read(REMAINING_HEADER).and_then(|s| s.parse().ok()),
            reset_at_ms: read(RESET_HEADER).and_then(|s| s.parse().ok()),
        }
    }
}

/// What to do after a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleAction {
    /// Quota is ample
    Proceed,
    /// Quota is low: pause for this long before returning
    WaitForReset(Duration),
}

/// Decides pauses from quota signals
#[derive(Debug, Clone)]
pub struct QuotaPlanner {
    config: RateLimiterConfig,
}

impl QuotaPlanner {
    /// Create a planner
    pub fn new(config: RateLimiterConfig) -> Self {
        Self { config }
    }

    /// Plan against the current wall clock
    pub fn plan(&self, signal: QuotaSignal) -> ThrottleAction {
        self.plan_at(signal, Utc::now().timestamp_millis())
    }

    /// Plan against an explicit clock reading (ms since epoch)
    pub fn plan_at(&self, signal: QuotaSignal, now_ms: i64) -> ThrottleAction {
        let Some(remaining) = signal.remaining else {
            return ThrottleAction::Proceed;
        };
        if remaining >= self.config.low_quota_threshold {
            return ThrottleAction::Proceed;
        }

        let wait = match signal.reset_at_ms {
            Some(reset) => Duration::from_millis(reset.saturating_sub(now_ms).max(0) as u64),
            None => self.config.fallback_wait,
        };
        ThrottleAction::WaitForReset(wait)
    }
}

/// Fixed-interval request pacer
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a pacer allowing one request per `interval`.
    ///
    /// Returns None for a zero interval.
    pub fn every(interval: Duration) -> Option<Self> {
        let quota = Quota::with_period(interval)?;
        Some(Self {
            limiter: Arc::new(Governor::direct(quota)),
        })
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}
