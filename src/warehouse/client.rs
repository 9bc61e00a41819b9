//! Events warehouse client
//!
//! Talks to a ClickHouse HTTP endpoint. Results are requested as
//! `JSONCompactEachRowWithNamesAndTypes` and decoded line by line while the
//! body streams in, so arbitrarily large result sets never sit in memory.

use super::models::{schema_diff, GithubEvent, COLUMNS};
use crate::error::{Error, Result};
use crate::http::{HttpClient, Query};
use crate::pagination::EventSource;
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Default table holding repository activity
pub const DEFAULT_TABLE: &str = "github_events";

/// Rows per server-side block
pub const DEFAULT_BLOCK_SIZE: u64 = 10_000;

const PARAM_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Query
// ============================================================================

/// Result ordering by `created_at`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Server order
    #[default]
    Unordered,
    Ascending,
    Descending,
}

/// Filters for one events query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Inclusive lower bound on `created_at`
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub end: Option<DateTime<Utc>>,
    /// Maximum rows
    pub limit: Option<u64>,
    pub order: SortOrder,
}

impl EventQuery {
    /// Oldest-first query
    pub fn ascending() -> Self {
        Self {
            order: SortOrder::Ascending,
            ..Self::default()
        }
    }

    /// Only events at or after `start`
    #[must_use]
    pub fn since(mut self, start: Option<DateTime<Utc>>) -> Self {
        self.start = start;
        self
    }

    /// Only events strictly before `end`
    #[must_use]
    pub fn until(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    /// Cap the number of rows
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Order rows by `created_at`
    #[must_use]
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }
}

// ============================================================================
// Client
// ============================================================================

/// Query builder and executor for the events table
#[derive(Debug, Clone)]
pub struct WarehouseClient {
    http: HttpClient,
    table: String,
    database: Option<String>,
    block_size: u64,
}

impl WarehouseClient {
    /// Client for `github_events` over a configured HTTP client
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            table: DEFAULT_TABLE.to_string(),
            database: None,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Read from another table
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Select the server-side database
    #[must_use]
    pub fn with_database(mut self, database: Option<String>) -> Self {
        self.database = database;
        self
    }

    /// Rows per server block
    #[must_use]
    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// SQL text and URL parameters for a project's events.
    ///
    /// Values travel as server-side query parameters, never spliced into SQL.
    pub fn build_query(&self, project: &str, query: &EventQuery) -> (String, Query) {
        let mut params = Query::new();
        params.insert("param_project".into(), project.to_string());
        params.insert("max_block_size".into(), self.block_size.to_string());
        params.insert("output_format_json_quote_64bit_integers".into(), "0".into());
        if let Some(database) = &self.database {
            params.insert("database".into(), database.clone());
        }

        let mut sql = format!(
            "SELECT * FROM {} WHERE repo_name = {{project:String}}",
            self.table
        );
        if let Some(start) = query.start {
            sql.push_str(" AND created_at >= {start:DateTime}");
            params.insert(
                "param_start".into(),
                start.format(PARAM_TIME_FORMAT).to_string(),
            );
        }
        if let Some(end) = query.end {
            sql.push_str(" AND created_at < {end:DateTime}");
            params.insert("param_end".into(), end.format(PARAM_TIME_FORMAT).to_string());
        }
        match query.order {
            SortOrder::Unordered => {}
            SortOrder::Ascending => sql.push_str(" ORDER BY created_at ASC"),
            SortOrder::Descending => sql.push_str(" ORDER BY created_at DESC"),
        }
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT {limit:UInt64}");
            params.insert("param_limit".into(), limit.to_string());
        }
        sql.push_str(" FORMAT JSONCompactEachRowWithNamesAndTypes");

        (sql, params)
    }

    /// Lazily run a query; nothing is sent until the stream is polled
    pub fn query_events(&self, project: &str, query: &EventQuery) -> WarehouseEventStream {
        let (sql, params) = self.build_query(project, query);
        debug!("warehouse query for {project}: {sql}");
        WarehouseEventStream {
            http: self.http.clone(),
            sql,
            params,
            rename: None,
            response: None,
            finished: false,
            buffer: BytesMut::new(),
            columns: None,
            types_seen: false,
            chunks_read: 0,
            rows_read: 0,
        }
    }
}

// ============================================================================
// Stream
// ============================================================================

/// Events decoded from a streaming query response
pub struct WarehouseEventStream {
    http: HttpClient,
    sql: String,
    params: Query,
    rename: Option<String>,
    response: Option<Response>,
    finished: bool,
    buffer: BytesMut,
    columns: Option<Vec<String>>,
    types_seen: bool,
    chunks_read: usize,
    rows_read: usize,
}

impl WarehouseEventStream {
    /// Store every event under `repo_name` instead of the upstream name
    #[must_use]
    pub fn renamed(mut self, repo_name: impl Into<String>) -> Self {
        self.rename = Some(repo_name.into());
        self
    }

    /// Rows decoded so far
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Next event, checking the column header before the first row
    pub async fn next(&mut self) -> Result<Option<GithubEvent>> {
        loop {
            if let Some(line) = self.take_line() {
                if line.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                if let Some(event) = self.decode_line(&line)? {
                    return Ok(Some(event));
                }
                continue;
            }
            if self.finished {
                debug!("warehouse stream ended after {} rows", self.rows_read());
                return Ok(None);
            }
            self.fill().await?;
        }
    }

    fn decode_line(&mut self, line: &[u8]) -> Result<Option<GithubEvent>> {
        let Some(columns) = &self.columns else {
            let names: Vec<String> = parse_line(line, "column names")?;
            if let Some(diff) = schema_diff(&COLUMNS, &names) {
                return Err(Error::SchemaMismatch { diff });
            }
            self.columns = Some(names);
            return Ok(None);
        };

        if !self.types_seen {
            let _types: Vec<String> = parse_line(line, "column types")?;
            self.types_seen = true;
            return Ok(None);
        }

        let row: Vec<Value> = parse_line(line, "row")?;
        let mut event = GithubEvent::from_row(columns, row)?;
        if let Some(name) = &self.rename {
            event.repo_name.clone_from(name);
        }
        self.rows_read += 1;
        if self.rows_read % 1000 == 0 {
            debug!("decoded {} warehouse rows", self.rows_read);
        }
        Ok(Some(event))
    }

    fn take_line(&mut self) -> Option<BytesMut> {
        let end = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line = self.buffer.split_to(end + 1);
        line.truncate(end);
        Some(line)
    }

    async fn fill(&mut self) -> Result<()> {
        if self.response.is_none() {
            let response = self
                .http
                .post_text("/", &self.params, self.sql.clone())
                .await?;
            self.response = Some(response);
        }
        let Some(response) = self.response.as_mut() else {
            return Ok(());
        };

        match response.chunk().await? {
            Some(chunk) => {
                self.buffer.extend_from_slice(&chunk);
                self.chunks_read += 1;
            }
            None => {
                self.finished = true;
                self.response = None;
                if !self.buffer.is_empty() {
                    self.buffer.extend_from_slice(b"\n");
                }
            }
        }
        Ok(())
    }
}

fn parse_line<T: serde::de::DeserializeOwned>(line: &[u8], what: &str) -> Result<T> {
    serde_json::from_slice(line).map_err(|e| {
        let preview: String = String::from_utf8_lossy(line).chars().take(120).collect();
        Error::malformed(format!("warehouse {what}: {e}: {preview}"))
    })
}

#[async_trait]
impl EventSource for WarehouseEventStream {
    type Event = GithubEvent;

    async fn next_event(&mut self) -> Result<Option<GithubEvent>> {
        self.next().await
    }

    fn at_fetch_boundary(&self) -> bool {
        !self.finished && !self.buffer.contains(&b'\n')
    }

    fn pages_fetched(&self) -> usize {
        self.chunks_read
    }
}

impl std::fmt::Debug for WarehouseEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseEventStream")
            .field("rename", &self.rename)
            .field("finished", &self.finished)
            .field("rows_read", &self.rows_read)
            .finish_non_exhaustive()
    }
}
