//! Rate-limited HTTP client
//!
//! Issues exactly one request per call, fails on any non-2xx status without
//! retrying, and absorbs upstream rate-limit signals as blocking pauses.

use super::rate_limit::{QuotaPlanner, QuotaSignal, RateLimiter, RateLimiterConfig, ThrottleAction};
use crate::error::{Error, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Credentials attached to every request
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    /// No authentication
    #[default]
    None,
    /// `Authorization: Bearer <token>`
    Bearer {
        /// The bearer token
        token: String,
    },
    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        password: Option<String>,
    },
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Whole-request timeout, or only the connect timeout when
    /// `read_timeout` is set
    pub timeout: Duration,
    /// Maximum idle time between body reads; streamed bodies may then take
    /// arbitrarily long overall
    pub read_timeout: Option<Duration>,
    /// Credentials
    pub credentials: Credentials,
    /// Rate limiter configuration
    pub rate_limit: RateLimiterConfig,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            read_timeout: None,
            credentials: Credentials::None,
            rate_limit: RateLimiterConfig::default(),
            user_agent: format!("hubhud/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Bound idle time between reads instead of the whole request
    pub fn read_timeout(mut self, idle: Duration) -> Self {
        self.config.read_timeout = Some(idle);
        self
    }

    /// Authenticate with a bearer token
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.config.credentials = Credentials::Bearer {
            token: token.into(),
        };
        self
    }

    /// Authenticate with HTTP Basic
    pub fn basic(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.config.credentials = Credentials::Basic {
            username: username.into(),
            password,
        };
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = config;
        self
    }

    /// Disable self-imposed pacing
    pub fn no_pacing(mut self) -> Self {
        self.config.rate_limit.pacing = None;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Query parameters for a single request (ordered for stable URLs)
pub type Query = BTreeMap<String, String>;

/// HTTP client with quota-aware throttling
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    planner: QuotaPlanner,
    pacer: Option<RateLimiter>,
    /// Requests issued since the last quota slowdown
    interval_requests: Arc<AtomicU64>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let builder = Client::builder().user_agent(&config.user_agent);
        let builder = match config.read_timeout {
            Some(idle) => builder.connect_timeout(config.timeout).read_timeout(idle),
            None => builder.timeout(config.timeout),
        };
        let client = builder.build()?;

        let pacer = config.rate_limit.pacing.and_then(RateLimiter::every);

        Ok(Self {
            client,
            planner: QuotaPlanner::new(config.rate_limit.clone()),
            pacer,
            config,
            interval_requests: Arc::new(AtomicU64::new(0)),
        })
    }

    /// GET a path and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &Query) -> Result<T> {
        let response = self.request(Method::GET, path, query, None).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::malformed(format!("{path}: {e}")))
    }

    /// POST a text body and hand back the successful response for streaming
    pub async fn post_text(&self, path: &str, query: &Query, body: String) -> Result<Response> {
        self.request(Method::POST, path, query, Some(body)).await
    }

    /// Issue one request.
    ///
    /// Non-2xx statuses become `Error::Upstream`; nothing is retried. When the
    /// response reports low quota, this sleeps until the reset time before
    /// returning.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &Query,
        body: Option<String>,
    ) -> Result<Response> {
        if let Some(ref pacer) = self.pacer {
            pacer.wait().await;
        }

        let full_url = self.build_url(path);
        let mut req = self.client.request(method.clone(), &full_url);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.body(body);
        }
        req = self.authenticate(req);

        self.interval_requests.fetch_add(1, Ordering::Relaxed);
        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(status.as_u16(), body));
        }

        debug!("{} {} -> {}", method, full_url, status.as_u16());
        self.throttle(QuotaSignal::from_headers(response.headers()))
            .await;
        Ok(response)
    }

    /// Pause according to the quota signal of the last response
    async fn throttle(&self, signal: QuotaSignal) {
        if let ThrottleAction::WaitForReset(wait) = self.planner.plan(signal) {
            let requests = self.interval_requests.swap(0, Ordering::Relaxed);
            info!(
                "slowing down... remaining:{} requests:{} sleep:{:.2}s",
                signal.remaining.unwrap_or_default(),
                requests,
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
        }
    }

    fn authenticate(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.credentials {
            Credentials::None => req,
            Credentials::Bearer { token } => req.bearer_auth(token),
            Credentials::Basic { username, password } => {
                req.basic_auth(username, password.as_ref())
            }
        }
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                if path.is_empty() {
                    format!("{base}/")
                } else {
                    format!("{base}/{path}")
                }
            }
            None => path.to_string(),
        }
    }

    /// Check if self-imposed pacing is enabled
    pub fn is_paced(&self) -> bool {
        self.pacer.is_some()
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.config.timeout)
            .field("is_paced", &self.pacer.is_some())
            .finish_non_exhaustive()
    }
}
