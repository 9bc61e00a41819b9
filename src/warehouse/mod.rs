//! Repository activity from the events warehouse
//!
//! - `GithubEvent` - one typed row of the `github_events` table
//! - `WarehouseClient` - parameterized queries over the ClickHouse HTTP
//!   interface, decoded as the body streams in
//! - `WarehouseConnector` - forward-only sync from the stored watermark
//!
//! The column header is compared with the expected layout before any row
//! is decoded; a difference fails with `Error::SchemaMismatch`.

mod client;
mod connector;
mod models;

pub use client::{
    EventQuery, SortOrder, WarehouseClient, WarehouseEventStream, DEFAULT_BLOCK_SIZE,
    DEFAULT_TABLE,
};
pub use connector::WarehouseConnector;
pub use models::{schema_diff, GithubEvent, COLUMNS};

#[cfg(test)]
pub(crate) mod fixtures;
