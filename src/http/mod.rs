//! HTTP client module
//!
//! Provides the rate-limited client every upstream adapter talks through.
//!
//! # Features
//!
//! - **Single attempt**: non-2xx responses fail with `Error::Upstream`, the
//!   caller decides whether to re-run the sync
//! - **Quota awareness**: reads `X-RateLimit-Remaining` / `X-RateLimit-Reset`
//!   and sleeps through the reset when quota runs low
//! - **Pacing**: a fixed minimum spacing between requests using governor

mod client;
mod rate_limit;

pub use client::{Credentials, HttpClient, HttpClientConfig, HttpClientConfigBuilder, Query};
pub use rate_limit::{
    QuotaPlanner, QuotaSignal, RateLimiter, RateLimiterConfig, ThrottleAction, REMAINING_HEADER,
    RESET_HEADER,
};
