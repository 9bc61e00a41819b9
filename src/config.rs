//! Configuration for hubhud
//!
//! Settings come from an optional YAML file, then environment overrides,
//! then command-line flags. Every section and field has a default, so an
//! empty file (or no file) is a valid configuration.
//!
//! ```yaml
//! database: hud.duckdb
//! chat:
//!   token: "..."            # or GITTER_TOKEN
//!   page_size: 100
//!   low_quota_threshold: 10
//!   pacing_ms: 1000
//! warehouse:
//!   endpoint: https://play.clickhouse.com
//!   user: explorer
//! sync:
//!   batch_size: 100
//!   deadline_secs: 840
//! ```

use crate::engine::SyncConfig;
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::pagination::MAX_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable holding the chat API token
pub const TOKEN_ENV: &str = "GITTER_TOKEN";

/// Environment variable holding the database path
pub const DATABASE_ENV: &str = "HUD_DB";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HubConfig {
    /// DuckDB file events are stored in
    pub database: Option<PathBuf>,

    /// Chat API settings
    pub chat: ChatConfig,

    /// Events warehouse settings
    pub warehouse: WarehouseConfig,

    /// Engine settings
    pub sync: SyncSettings,
}

impl HubConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&yaml)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    /// Apply `GITTER_TOKEN` and `HUD_DB` from the process environment
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_env(|key| std::env::var(key).ok());
        self
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.is_empty()) {
            self.chat.token = Some(token);
        }
        if let Some(db) = lookup(DATABASE_ENV).filter(|d| !d.is_empty()) {
            self.database = Some(PathBuf::from(db));
        }
    }

    /// Check ranges and URLs
    pub fn validate(&self) -> Result<()> {
        self.chat.validate()?;
        self.warehouse.validate()?;
        self.sync.validate()
    }

    /// Database path, required for any command touching the store
    pub fn database_path(&self) -> Result<&Path> {
        self.database
            .as_deref()
            .ok_or_else(|| Error::missing_field(format!("database (or {DATABASE_ENV})")))
    }
}

// ============================================================================
// Chat
// ============================================================================

/// Chat API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatConfig {
    /// API base URL
    pub endpoint: String,

    /// Bearer token
    pub token: Option<String>,

    /// Messages per page (1..=100)
    pub page_size: u32,

    /// Remaining-quota value below which requests pause until reset
    pub low_quota_threshold: u64,

    /// Minimum milliseconds between requests (0 disables pacing)
    pub pacing_ms: u64,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Fetch thread replies
    pub expand_threads: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.gitter.im/v1".to_string(),
            token: None,
            page_size: MAX_PAGE_SIZE,
            low_quota_threshold: 10,
            pacing_ms: 1000,
            timeout_secs: 30,
            expand_threads: false,
        }
    }
}

impl ChatConfig {
    fn validate(&self) -> Result<()> {
        Url::parse(&self.endpoint)?;
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::invalid_value(
                "chat.page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}, got {}", self.page_size),
            ));
        }
        Ok(())
    }

    /// HTTP client settings; fails without a token
    pub fn http_config(&self) -> Result<HttpClientConfig> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| Error::missing_field(format!("chat.token (or {TOKEN_ENV})")))?;
        let pacing = (self.pacing_ms > 0).then(|| Duration::from_millis(self.pacing_ms));

        Ok(HttpClientConfig::builder()
            .base_url(&self.endpoint)
            .bearer(token)
            .timeout(Duration::from_secs(self.timeout_secs))
            .rate_limit(RateLimiterConfig::new(self.low_quota_threshold, pacing))
            .build())
    }
}

// ============================================================================
// Warehouse
// ============================================================================

/// Events warehouse settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarehouseConfig {
    /// HTTP endpoint of the ClickHouse server
    pub endpoint: String,

    /// Basic-auth user
    pub user: String,

    /// Basic-auth password
    pub password: Option<String>,

    /// Server-side database
    pub database: Option<String>,

    /// Events table
    pub table: String,

    /// Rows per server block
    pub block_size: u64,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Longest pause between streamed body reads, in seconds. A result set
    /// may take any amount of time overall.
    pub read_timeout_secs: u64,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://play.clickhouse.com".to_string(),
            user: "explorer".to_string(),
            password: None,
            database: None,
            table: crate::warehouse::DEFAULT_TABLE.to_string(),
            block_size: crate::warehouse::DEFAULT_BLOCK_SIZE,
            connect_timeout_secs: 30,
            read_timeout_secs: 300,
        }
    }
}

impl WarehouseConfig {
    fn validate(&self) -> Result<()> {
        Url::parse(&self.endpoint)?;
        let valid_table = !self.table.is_empty()
            && self
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !valid_table {
            return Err(Error::invalid_value(
                "warehouse.table",
                format!("not a plain table name: {:?}", self.table),
            ));
        }
        if self.block_size == 0 {
            return Err(Error::invalid_value("warehouse.block_size", "must be positive"));
        }
        Ok(())
    }

    /// HTTP client settings; the warehouse is not paced and streamed
    /// results are bounded by read idle time only
    pub fn http_config(&self) -> HttpClientConfig {
        HttpClientConfig::builder()
            .base_url(&self.endpoint)
            .basic(&self.user, self.password.clone())
            .timeout(Duration::from_secs(self.connect_timeout_secs))
            .read_timeout(Duration::from_secs(self.read_timeout_secs))
            .rate_limit(RateLimiterConfig::unpaced())
            .build()
    }
}

// ============================================================================
// Sync
// ============================================================================

/// Engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Chat messages per committed batch
    pub batch_size: usize,

    /// Warehouse events per committed batch
    pub warehouse_batch_size: usize,

    /// Stop fetching after this many seconds
    pub deadline_secs: Option<u64>,

    /// Do not start a fetch with less than this many seconds left
    pub fetch_margin_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            batch_size: crate::engine::DEFAULT_BATCH_SIZE,
            warehouse_batch_size: 1000,
            deadline_secs: None,
            fetch_margin_secs: 0,
        }
    }
}

impl SyncSettings {
    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::invalid_value("sync.batch_size", "must be positive"));
        }
        if self.warehouse_batch_size == 0 {
            return Err(Error::invalid_value(
                "sync.warehouse_batch_size",
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Engine config with the given batch size
    pub fn engine_config(&self, batch_size: usize) -> SyncConfig {
        SyncConfig::new()
            .with_batch_size(batch_size)
            .with_fetch_margin(Duration::from_secs(self.fetch_margin_secs))
    }
}
